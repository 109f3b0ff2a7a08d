//! Unweighted image moments

use serde::Serialize;

use crate::PsfImage;

#[derive(Debug, thiserror::Error)]
pub enum MomentsError {
    #[error("the image flux is not a positive number: {0}")]
    ZeroFlux(f64),
    #[error("the image second moments are zero")]
    ZeroSize,
}

/// Unweighted moments of an image
///
/// The moments are given in pixels, with the origin at the pixel `(N/2,N/2)`.
/// `x` is the column index and `y` the row index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Moments {
    pub i0: f64,
    pub ix: f64,
    pub iy: f64,
    pub ixx: f64,
    pub iyy: f64,
    pub ixy: f64,
    pub e1: f64,
    pub e2: f64,
    pub rsqr: f64,
}
impl Moments {
    /// Computes the moments of a PSF image
    pub fn new(image: &PsfImage) -> Result<Self, MomentsError> {
        Self::from_data(image.data(), image.nx(), image.ny())
    }
    /// Computes the moments of a `ny x nx` row-major image
    pub fn from_data(data: &[f64], nx: usize, ny: usize) -> Result<Self, MomentsError> {
        let (cx, cy) = ((nx / 2) as f64, (ny / 2) as f64);
        let pixels = || {
            data.iter().enumerate().map(move |(k, &v)| {
                let (i, j) = (k % nx, k / nx);
                (i as f64 - cx, j as f64 - cy, v)
            })
        };
        let i0: f64 = data.iter().sum();
        if !(i0.is_finite() && i0 != 0.) {
            return Err(MomentsError::ZeroFlux(i0));
        }
        let (sx, sy) = pixels().fold((0., 0.), |(sx, sy), (x, y, v)| (sx + x * v, sy + y * v));
        let (ix, iy) = (sx / i0, sy / i0);
        let (sxx, syy, sxy) = pixels().fold((0., 0., 0.), |(sxx, syy, sxy), (x, y, v)| {
            let (dx, dy) = (x - ix, y - iy);
            (sxx + dx * dx * v, syy + dy * dy * v, sxy + dx * dy * v)
        });
        let (ixx, iyy, ixy) = (sxx / i0, syy / i0, sxy / i0);
        let rsqr = ixx + iyy;
        if rsqr == 0. {
            return Err(MomentsError::ZeroSize);
        }
        Ok(Self {
            i0,
            ix,
            iy,
            ixx,
            iyy,
            ixy,
            e1: (ixx - iyy) / rsqr,
            e2: 2. * ixy / rsqr,
            rsqr,
        })
    }
}

/// Moments of the PSF of a frame
///
/// A PSF concentrated into a single pixel (e.g. the geometric optics PSF of an
/// aberration free pupil) has no ellipticity: its moments are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MomentRecord {
    pub frame: usize,
    /// exposure start time in seconds
    pub t0: f64,
    #[serde(flatten)]
    pub moments: Option<Moments>,
}
impl MomentRecord {
    pub fn new(frame: usize, image: &PsfImage) -> Result<Self, MomentsError> {
        let moments = match Moments::new(image) {
            Ok(moments) => Some(moments),
            Err(MomentsError::ZeroSize) => {
                log::warn!("frame #{frame}: point-like PSF, moments undefined");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            frame,
            t0: image.t0(),
            moments,
        })
    }
    /// Size `Ixx+Iyy` in pixel^2, `None` for a point-like PSF
    pub fn rsqr(&self) -> Option<f64> {
        self.moments.map(|m| m.rsqr)
    }
}
