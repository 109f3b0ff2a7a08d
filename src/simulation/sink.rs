use std::{
    fs::{create_dir_all, File},
    path::{Path, PathBuf},
};

use super::{FrameRecord, MomentSeries};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("cannot create output directory {1}")]
    Directory(#[source] std::io::Error, PathBuf),
    #[error("cannot create output file {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot pickle simulation outputs into {1}")]
    Pickle(#[source] serde_pickle::Error, PathBuf),
}

/// Receiver of the simulation outputs
///
/// Frames are emitted in order, then the moment series once the last frame is done.
pub trait FrameSink {
    fn emit(&mut self, frame: &FrameRecord) -> Result<(), SinkError>;
    fn finalize(&mut self, _series: &MomentSeries) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Discards the frames
impl FrameSink for () {
    fn emit(&mut self, _frame: &FrameRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Collects the frames in memory
impl FrameSink for Vec<FrameRecord> {
    fn emit(&mut self, frame: &FrameRecord) -> Result<(), SinkError> {
        self.push(frame.clone());
        Ok(())
    }
}

/// Pickle files writer
///
/// The moment series is written to `<prefix>moments.pkl` and, if requested,
/// each frame to `<prefix>frame_NNNNNN.pkl`
#[derive(Debug, Clone)]
pub struct PickleSink {
    prefix: String,
    save_frames: bool,
}
impl PickleSink {
    /// Creates a new writer, creating the output directory if needed
    pub fn new<S: Into<String>>(prefix: S) -> Result<Self, SinkError> {
        let prefix: String = prefix.into();
        if let Some(dir) = Path::new(&prefix).parent() {
            if !dir.as_os_str().is_empty() {
                create_dir_all(dir).map_err(|e| SinkError::Directory(e, dir.to_path_buf()))?;
            }
        }
        Ok(Self {
            prefix,
            save_frames: false,
        })
    }
    /// Writes the frames too
    pub fn save_frames(self, save_frames: bool) -> Self {
        Self {
            save_frames,
            ..self
        }
    }
    /// Path of the file `<prefix><name>`
    pub fn path(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.prefix, name))
    }
    fn write<T: serde::Serialize>(&self, path: PathBuf, data: &T) -> Result<(), SinkError> {
        let mut file = File::create(&path).map_err(|e| SinkError::Create(e, path.clone()))?;
        serde_pickle::to_writer(&mut file, data, Default::default())
            .map_err(|e| SinkError::Pickle(e, path))
    }
}
impl FrameSink for PickleSink {
    fn emit(&mut self, frame: &FrameRecord) -> Result<(), SinkError> {
        if self.save_frames {
            self.write(self.path(&format!("frame_{:06}.pkl", frame.frame)), frame)?;
        }
        Ok(())
    }
    fn finalize(&mut self, series: &MomentSeries) -> Result<(), SinkError> {
        let path = self.path("moments.pkl");
        self.write(path.clone(), series)?;
        log::info!("moments saved to {:?}", path);
        Ok(())
    }
}
