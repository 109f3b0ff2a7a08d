//! Fourier versus geometric optics simulation
//!
//! Each frame, the optical aberrations are updated and the phase screen stack
//! is captured over one exposure; the exposure is rendered with both the
//! [FourierRenderer] and the [GeometricRenderer] and the moments of both PSFs
//! are computed.
//!
//! The phase screen stack is advanced by a single producer: the exposures of a
//! batch of frames are captured in time order, then the frames of the batch are
//! rendered in parallel.

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

use crate::{
    AberrationTrajectory, Builder, Exposure, FourierRenderer, FromBuilder, GeometricRenderer,
    MomentRecord, OpticalScreen, PhaseScreenStack, PsfImage, PsfRenderer, RandomStream, Result,
};

mod builder;
mod sink;
pub use builder::{ConfigError, SimulationBuilder};
pub use sink::{FrameSink, PickleSink, SinkError};

/// Outputs of a frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub frame: usize,
    /// exposure start time in seconds
    pub t0: f64,
    /// Zernike coefficients from tip (j=2) in wave
    pub aberrations: Vec<f64>,
    pub fourier: PsfImage,
    pub geometric: PsfImage,
    pub fourier_moments: MomentRecord,
    pub geometric_moments: MomentRecord,
}

/// PSF moments of all the frames
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MomentSeries {
    pub fourier: Vec<MomentRecord>,
    pub geometric: Vec<MomentRecord>,
}
impl MomentSeries {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            fourier: Vec::with_capacity(n),
            geometric: Vec::with_capacity(n),
        }
    }
    pub fn push(&mut self, frame: &FrameRecord) {
        self.fourier.push(frame.fourier_moments);
        self.geometric.push(frame.geometric_moments);
    }
    /// Number of frames
    pub fn len(&self) -> usize {
        self.fourier.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fourier.is_empty()
    }
    /// Iterator over the pairs of Fourier and geometric moments
    pub fn iter(&self) -> impl Iterator<Item = (&MomentRecord, &MomentRecord)> {
        self.fourier.iter().zip(&self.geometric)
    }
}

/// A frame ready to be rendered
struct FrameJob {
    frame: usize,
    aberrations: Vec<f64>,
    exposure: Exposure,
    photons: RandomStream,
}

/// Fourier versus geometric optics simulation
pub struct Simulation {
    builder: SimulationBuilder,
    rng: RandomStream,
    trajectory: AberrationTrajectory,
    stack: PhaseScreenStack,
    fourier: FourierRenderer,
    geometric: GeometricRenderer,
    exptime: f64,
    batch_size: usize,
}
impl FromBuilder for Simulation {
    type ComponentBuilder = SimulationBuilder;
}
impl Simulation {
    /// Parameters of the simulation
    pub fn config(&self) -> &SimulationBuilder {
        &self.builder
    }
    pub fn trajectory(&self) -> &AberrationTrajectory {
        &self.trajectory
    }
    pub fn stack(&self) -> &PhaseScreenStack {
        &self.stack
    }
    pub fn fourier(&self) -> &FourierRenderer {
        &self.fourier
    }
    pub fn geometric(&self) -> &GeometricRenderer {
        &self.geometric
    }
    /// Number of frames
    pub fn n_frame(&self) -> usize {
        self.trajectory.n_frame()
    }
    /// Optical aberrations screen of frame `i`
    fn optics(&self, i: usize) -> Result<Option<OpticalScreen>> {
        if self.trajectory.n_mode() == 0 {
            return Ok(None);
        }
        let pupil = &self.builder.pupil;
        OpticalScreen::builder()
            .diameter(pupil.diameter)
            .obscuration(pupil.obscuration)
            .lam_0(self.builder.lam_0)
            .aberrations(self.trajectory.frame(i))
            .build()
            .map(Some)
    }
    /// Captures the exposures of the frames in `frames`, advancing the stack
    fn produce(&mut self, frames: std::ops::Range<usize>) -> Result<Vec<FrameJob>> {
        frames
            .map(|frame| {
                let optics = self.optics(frame)?;
                self.stack.set_optics(optics);
                let exposure = self.stack.exposure(self.exptime)?;
                Ok(FrameJob {
                    frame,
                    aberrations: self.trajectory.frame(frame),
                    exposure,
                    photons: self.rng.fork(),
                })
            })
            .collect()
    }
    /// Renders a frame with both renderers
    fn render(&self, job: FrameJob) -> Result<FrameRecord> {
        let FrameJob {
            frame,
            aberrations,
            exposure,
            mut photons,
        } = job;
        let mut fourier_rng = photons.clone();
        let (fourier, geometric) = rayon::join(
            || self.fourier.render(&exposure, &mut fourier_rng),
            || self.geometric.render(&exposure, &mut photons),
        );
        let (fourier, geometric) = (fourier?, geometric?);
        let fourier_moments = MomentRecord::new(frame, &fourier)?;
        let geometric_moments = MomentRecord::new(frame, &geometric)?;
        log::debug!(
            "frame #{:4} (t0={:.3}s): rsqr Fourier {:?} vs geometric {:?}",
            frame,
            exposure.t0(),
            fourier_moments.rsqr(),
            geometric_moments.rsqr()
        );
        Ok(FrameRecord {
            frame,
            t0: exposure.t0(),
            aberrations,
            fourier,
            geometric,
            fourier_moments,
            geometric_moments,
        })
    }
    /// Runs the simulation and returns the moments of all the frames
    pub fn run(&mut self, pb: Option<ProgressBar>) -> Result<MomentSeries> {
        self.run_with(&mut (), pb)
    }
    /// Runs the simulation, sending each frame to `sink`
    pub fn run_with<S: FrameSink>(
        &mut self,
        sink: &mut S,
        pb: Option<ProgressBar>,
    ) -> Result<MomentSeries> {
        let now = Instant::now();
        let n_frame = self.n_frame();
        let mut series = MomentSeries::with_capacity(n_frame);
        for start in (0..n_frame).step_by(self.batch_size) {
            let jobs = self.produce(start..(start + self.batch_size).min(n_frame))?;
            let records = jobs
                .into_par_iter()
                .map(|job| self.render(job))
                .collect::<Result<Vec<FrameRecord>>>()?;
            for record in records {
                sink.emit(&record)?;
                series.push(&record);
                if let Some(pb) = pb.as_ref() {
                    pb.inc(1)
                }
            }
        }
        sink.finalize(&series)?;
        if let Some(pb) = pb {
            pb.finish()
        }
        log::info!(
            "{} frames rendered in {:.3}s",
            n_frame,
            now.elapsed().as_secs_f64()
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches() -> anyhow::Result<()> {
        let run = |batch_size: usize| -> anyhow::Result<MomentSeries> {
            let mut sim = Simulation::builder()
                .n_frame(5)
                .jmax(4)
                .sigma(0.5)
                .image(32, 1.)
                .n_photons(2000)
                .batch_size(batch_size)
                .build()?;
            Ok(sim.run(None)?)
        };
        let a = run(1)?;
        let b = run(3)?;
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn diffraction_limited() -> anyhow::Result<()> {
        let mut sim = Simulation::builder()
            .n_frame(2)
            .sigma(0.)
            .n_layer(0)
            .image(32, 1.)
            .n_photons(1000)
            .build()?;
        let series = sim.run(None)?;
        assert_eq!(series.len(), 2);
        for (fourier, geometric) in series.iter() {
            assert!(fourier.rsqr().is_some_and(|r| r > 0.));
            assert!(geometric.moments.is_none());
        }
        Ok(())
    }

    #[test]
    fn frames_in_order() -> anyhow::Result<()> {
        let mut sim = Simulation::builder()
            .n_frame(4)
            .jmax(5)
            .sigma(0.5)
            .image(32, 1.)
            .n_photons(1000)
            .batch_size(2)
            .build()?;
        let mut frames: Vec<FrameRecord> = vec![];
        let series = sim.run_with(&mut frames, None)?;
        assert_eq!(series.len(), 4);
        frames.iter().enumerate().for_each(|(i, f)| {
            assert_eq!(f.frame, i);
            assert!((f.t0 - 0.025 * i as f64).abs() < 1e-12);
            assert_eq!(f.aberrations, sim.trajectory().frame(i));
        });
        Ok(())
    }
}
