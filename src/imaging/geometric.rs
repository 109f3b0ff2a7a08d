use skyangle::Conversion;

use super::{ImageGrid, PsfImage, PsfRenderer, RenderError};
use crate::{screen::PhaseScreen, Aperture, Exposure, RandomStream};

/// Geometric optics PSF renderer
///
/// Photons are shot uniformly through the illuminated pupil and deflected by
/// the local slope of the wavefront: the gradient of the optical path difference
/// is the ray angle in radians.
/// The gradients are computed by central differences with the pupil sampling
/// of the [Aperture] as step.
#[derive(Debug, Clone)]
pub struct GeometricRenderer {
    aperture: Aperture,
    grid: ImageGrid,
    n_photons: usize,
    theta: [f64; 2],
}
impl GeometricRenderer {
    /// Creates a renderer shooting `n_photons` onto the image `grid`
    pub fn new(aperture: Aperture, grid: ImageGrid, n_photons: usize) -> Result<Self, RenderError> {
        grid.validate()?;
        if n_photons == 0 {
            return Err(RenderError::NoPhoton);
        }
        if aperture.n_illuminated() == 0 {
            return Err(RenderError::Dark(aperture.to_string()));
        }
        Ok(Self {
            aperture,
            grid,
            n_photons,
            theta: [0.; 2],
        })
    }
    /// Sets the field angle of the source in radians
    pub fn field_angle(self, theta: [f64; 2]) -> Self {
        Self { theta, ..self }
    }
    pub fn aperture(&self) -> &Aperture {
        &self.aperture
    }
    pub fn grid(&self) -> &ImageGrid {
        &self.grid
    }
    pub fn n_photons(&self) -> usize {
        self.n_photons
    }
    /// Field angle in radians
    pub fn theta(&self) -> [f64; 2] {
        self.theta
    }
    /// Uniform random position on the illuminated pupil
    fn pupil_position(&self, rng: &mut RandomStream) -> (f64, f64) {
        let geometry = self.aperture.geometry();
        let d = geometry.diameter;
        loop {
            let x = (rng.uniform() - 0.5) * d;
            let y = (rng.uniform() - 0.5) * d;
            if geometry.is_illuminated(x, y) {
                return (x, y);
            }
        }
    }
}
impl PsfRenderer for GeometricRenderer {
    fn render(&self, exposure: &Exposure, rng: &mut RandomStream) -> Result<PsfImage, RenderError> {
        if exposure.is_empty() {
            return Err(RenderError::EmptyExposure);
        }
        let grid = self.grid;
        let step = self.aperture.scale();
        let flux = 1. / self.n_photons as f64;
        let n_snapshot = exposure.len();
        let mut data = vec![0f64; grid.nx * grid.ny];
        let mut n_lost = 0usize;
        for (k, snapshot) in exposure.snapshots().iter().enumerate() {
            let n = self.n_photons / n_snapshot + usize::from(k < self.n_photons % n_snapshot);
            for _ in 0..n {
                let (x, y) = self.pupil_position(rng);
                let [gx, gy] = snapshot.opd_gradient(x, y, self.theta, step);
                let (tx, ty) = ((gx * 1e-9).to_arcsec(), (gy * 1e-9).to_arcsec());
                match grid.pixel(tx, ty) {
                    Some((i, j)) => data[j * grid.nx + i] += flux,
                    None => n_lost += 1,
                }
            }
        }
        log::debug!(
            "geometric PSF at t0={:.3}s: {} photons in {} snapshot(s), {} outside of the image",
            exposure.t0(),
            self.n_photons,
            n_snapshot,
            n_lost
        );
        Ok(PsfImage::new(data, grid, exposure.t0()))
    }
}
