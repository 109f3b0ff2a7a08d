//! PSF images and renderers
//!
//! A [PsfRenderer] turns an [Exposure] of a phase screen stack into a [PsfImage].
//! Two renderers are available: [FourierRenderer] (diffraction integral) and
//! [GeometricRenderer] (photon shooting).

use serde::{Deserialize, Serialize};
use skyangle::Conversion;

use crate::{Aperture, Exposure, RandomStream};

mod bounds;
mod fourier;
mod geometric;
pub use bounds::Bounds;
pub use fourier::FourierRenderer;
pub use geometric::GeometricRenderer;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Fourier and geometric apertures do not describe the same pupil: {0} vs {1}")]
    GeometryMismatch(String, String),
    #[error("cannot render an exposure without snapshot")]
    EmptyExposure,
    #[error("invalid image grid: {0}x{1} pixels of {2}arcsec")]
    Grid(usize, usize, f64),
    #[error("the wavelength must be positive, found {0}nm")]
    Wavelength(f64),
    #[error("the number of photons must be at least 1")]
    NoPhoton,
    #[error("the aperture does not let any light through: {0}")]
    Dark(String),
    #[error("the Fourier PSF flux is not a positive number: {0}")]
    Flux(f64),
}

/// Checks that two apertures sample the same pupil
pub fn check_apertures(fourier: &Aperture, geometric: &Aperture) -> Result<(), RenderError> {
    if fourier.geometry() != geometric.geometry() {
        return Err(RenderError::GeometryMismatch(
            fourier.geometry().to_string(),
            geometric.geometry().to_string(),
        ));
    }
    Ok(())
}

/// Output image sampling
///
/// `nx` columns and `ny` rows of `scale` arcsec pixels.
/// The center of the pixel `(i,j)` (column, row) is at `((i-nx/2) scale, (j-ny/2) scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGrid {
    pub nx: usize,
    pub ny: usize,
    pub scale: f64,
}
impl ImageGrid {
    /// Square grid of `n x n` pixels of `scale` arcsec
    pub fn square(n: usize, scale: f64) -> Self {
        Self {
            nx: n,
            ny: n,
            scale,
        }
    }
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.nx == 0 || self.ny == 0 || !(self.scale > 0.) {
            return Err(RenderError::Grid(self.nx, self.ny, self.scale));
        }
        Ok(())
    }
    /// Largest image extent in radians
    pub fn field(&self) -> f64 {
        (self.nx.max(self.ny) as f64 * self.scale).from_arcsec()
    }
    /// Angular coordinates of the center of the pixel `(i,j)` in arcsec
    pub fn pixel_center(&self, i: usize, j: usize) -> (f64, f64) {
        (
            (i as f64 - (self.nx / 2) as f64) * self.scale,
            (j as f64 - (self.ny / 2) as f64) * self.scale,
        )
    }
    /// Pixel `(i,j)` receiving the light coming from the direction `(x,y)` in arcsec
    pub fn pixel(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let i = (x / self.scale + (self.nx / 2) as f64 + 0.5).floor();
        let j = (y / self.scale + (self.ny / 2) as f64 + 0.5).floor();
        if i < 0. || j < 0. || i >= self.nx as f64 || j >= self.ny as f64 {
            None
        } else {
            Some((i as usize, j as usize))
        }
    }
}

/// PSF image
///
/// Row-major `ny x nx` intensities, rows are y
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PsfImage {
    data: Vec<f64>,
    grid: ImageGrid,
    bounds: Bounds,
    t0: f64,
}
impl PsfImage {
    /// Creates a new image on `grid` from an exposure starting at `t0`
    pub fn new(data: Vec<f64>, grid: ImageGrid, t0: f64) -> Self {
        assert_eq!(
            data.len(),
            grid.nx * grid.ny,
            "PSF image data does not match a {}x{} grid",
            grid.nx,
            grid.ny
        );
        Self {
            data,
            bounds: Bounds::from_shape(grid.nx, grid.ny),
            grid,
            t0,
        }
    }
    /// Number of columns
    pub fn nx(&self) -> usize {
        self.grid.nx
    }
    /// Number of rows
    pub fn ny(&self) -> usize {
        self.grid.ny
    }
    /// Pixel scale in arcsec
    pub fn scale(&self) -> f64 {
        self.grid.scale
    }
    pub fn grid(&self) -> &ImageGrid {
        &self.grid
    }
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
    /// Start time of the exposure in seconds
    pub fn t0(&self) -> f64 {
        self.t0
    }
    pub fn data(&self) -> &[f64] {
        &self.data
    }
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }
    /// Intensity of the pixel in column `i` and row `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[j * self.grid.nx + i]
    }
    /// Total intensity
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// PSF rendering interface
pub trait PsfRenderer {
    /// Renders the PSF integrated over the snapshots of the exposure
    fn render(&self, exposure: &Exposure, rng: &mut RandomStream) -> Result<PsfImage, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_pixels() {
        let grid = ImageGrid::square(4, 0.5);
        assert_eq!(grid.pixel_center(2, 2), (0., 0.));
        assert_eq!(grid.pixel_center(0, 3), (-1., 0.5));
        assert_eq!(grid.pixel(0., 0.), Some((2, 2)));
        assert_eq!(grid.pixel(0.24, -0.26), Some((2, 1)));
        assert_eq!(grid.pixel(-1.2, 0.7), Some((0, 3)));
        assert_eq!(grid.pixel(-1.3, 0.), None);
        assert_eq!(grid.pixel(0., 0.76), None);
        assert!(ImageGrid::square(0, 0.1).validate().is_err());
        assert!(ImageGrid::square(8, 0.).validate().is_err());
    }

    #[test]
    fn image() {
        let image = PsfImage::new(vec![0.25; 8], ImageGrid { nx: 4, ny: 2, scale: 0.1 }, 0.5);
        assert_eq!(image.bounds(), Bounds::new(1, 4, 1, 2));
        assert_eq!(image.sum(), 2.);
        assert_eq!(image.t0(), 0.5);
    }

    #[test]
    fn aperture_geometries() -> anyhow::Result<()> {
        let pupil = crate::PupilGeometry::default();
        let fourier = |geometry| Aperture::fourier(geometry, 700., 1f64.from_arcsec(), 1., 1.);
        let geometric = Aperture::geometric(pupil.clone(), 1.)?;
        check_apertures(&fourier(pupil.clone())?, &geometric)?;

        let obscured = crate::PupilGeometry {
            obscuration: 0.3,
            ..pupil.clone()
        };
        let err = check_apertures(&fourier(obscured)?, &geometric).unwrap_err();
        assert!(matches!(err, RenderError::GeometryMismatch(..)), "{err}");

        let struts = crate::PupilGeometry {
            n_strut: 4,
            ..pupil.clone()
        };
        let err = check_apertures(&geometric, &Aperture::geometric(struts, 1.)?).unwrap_err();
        assert!(matches!(err, RenderError::GeometryMismatch(..)), "{err}");
        assert!(matches!(
            crate::PsfError::from(err),
            crate::PsfError::Render(RenderError::GeometryMismatch(..))
        ));
        Ok(())
    }
}
