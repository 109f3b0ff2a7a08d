use rayon::prelude::*;
use rustfft::{num_complex::Complex64, FftDirection};
use skyangle::Conversion;
use std::f64::consts::PI;

use super::{ImageGrid, PsfImage, PsfRenderer, RenderError};
use crate::{fft, screen::PhaseScreen, Aperture, Exposure, RandomStream, Snapshot};

/// Fourier optics PSF renderer
///
/// The PSF is the squared modulus of the Fourier transform of the complex
/// pupil function sampled on the zero-padded [Aperture] grid.
/// The native PSF pixels are rebinned onto the image pixels in proportion to
/// their overlap, so the flux in the image never exceeds 1.
#[derive(Debug, Clone)]
pub struct FourierRenderer {
    aperture: Aperture,
    lam: f64,
    grid: ImageGrid,
    theta: [f64; 2],
}
impl FourierRenderer {
    /// Creates a renderer at the wavelength `lam` (nm) onto the image `grid`
    pub fn new(aperture: Aperture, lam: f64, grid: ImageGrid) -> Result<Self, RenderError> {
        grid.validate()?;
        if !(lam > 0.) {
            return Err(RenderError::Wavelength(lam));
        }
        if aperture.n_illuminated() == 0 {
            return Err(RenderError::Dark(aperture.to_string()));
        }
        let field = lam * 1e-9 / aperture.scale();
        if field < grid.field() {
            log::warn!(
                "the Fourier PSF field ({:.3}arcsec) is smaller than the image ({:.3}arcsec)",
                field.to_arcsec(),
                grid.field().to_arcsec()
            );
        }
        Ok(Self {
            aperture,
            lam,
            grid,
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
    /// Wavelength in nm
    pub fn wavelength(&self) -> f64 {
        self.lam
    }
    pub fn grid(&self) -> &ImageGrid {
        &self.grid
    }
    /// Field angle in radians
    pub fn theta(&self) -> [f64; 2] {
        self.theta
    }
    /// Native PSF pixel scale in arcsec
    pub fn native_scale(&self) -> f64 {
        self.aperture.image_scale(self.lam).to_arcsec()
    }
    /// Instantaneous PSF of a snapshot, unnormalized, zero frequency at `(0,0)`
    fn intensity(&self, snapshot: &Snapshot) -> Vec<f64> {
        let n = self.aperture.npix();
        let k = 2. * PI / self.lam;
        let mut pupil: Vec<Complex64> = self
            .aperture
            .illuminated()
            .par_iter()
            .enumerate()
            .map(|(ij, &lit)| {
                if lit {
                    let x = self.aperture.coordinate(ij % n);
                    let y = self.aperture.coordinate(ij / n);
                    Complex64::from_polar(1., k * snapshot.opd(x, y, self.theta))
                } else {
                    Complex64::new(0., 0.)
                }
            })
            .collect();
        fft::fft2(&mut pupil, n, FftDirection::Forward);
        pupil.into_iter().map(|z| z.norm_sqr()).collect()
    }
}

/// Native pixels `(k, fraction)` covered by each of `n_out` image pixels along one axis
///
/// The image pixel `i` spans `[u(i)-w/2, u(i)+w/2]` and the native pixel `k`
/// spans `[k-1/2, k+1/2]`, both in native pixel units.
fn overlaps(n: usize, n_out: usize, u: impl Fn(usize) -> f64, w: f64) -> Vec<Vec<(usize, f64)>> {
    (0..n_out)
        .map(|i| {
            let lo = u(i) - 0.5 * w + 0.5;
            let hi = lo + w;
            let k0 = lo.floor().max(0.) as usize;
            let k1 = hi.ceil().min(n as f64).max(0.) as usize;
            (k0..k1)
                .filter_map(|k| {
                    let o = hi.min(k as f64 + 1.) - lo.max(k as f64);
                    (o > 0.).then_some((k, o))
                })
                .collect()
        })
        .collect()
}

impl PsfRenderer for FourierRenderer {
    fn render(&self, exposure: &Exposure, _rng: &mut RandomStream) -> Result<PsfImage, RenderError> {
        if exposure.is_empty() {
            return Err(RenderError::EmptyExposure);
        }
        let n = self.aperture.npix();
        let mut psf = vec![0f64; n * n];
        for snapshot in exposure.snapshots() {
            psf.iter_mut()
                .zip(self.intensity(snapshot))
                .for_each(|(p, i)| *p += i);
        }
        let flux: f64 = psf.iter().sum();
        if !(flux.is_finite() && flux > 0.) {
            return Err(RenderError::Flux(flux));
        }
        let psf: Vec<f64> = fft::fftshift2(&psf, n)
            .into_iter()
            .map(|p| p / flux)
            .collect();

        let delta = self.native_scale();
        let c = (n / 2) as f64;
        let grid = self.grid;
        let w = grid.scale / delta;
        let columns = overlaps(n, grid.nx, |i| grid.pixel_center(i, 0).0 / delta + c, w);
        let rows = overlaps(n, grid.ny, |j| grid.pixel_center(0, j).1 / delta + c, w);
        // native rows rebinned along x
        let partial: Vec<Vec<f64>> = psf
            .par_chunks(n)
            .map(|row| {
                columns
                    .iter()
                    .map(|column| column.iter().map(|(k, o)| o * row[*k]).sum::<f64>())
                    .collect()
            })
            .collect();
        let data: Vec<f64> = (0..grid.nx * grid.ny)
            .into_par_iter()
            .map(|ji| {
                let (i, j) = (ji % grid.nx, ji / grid.nx);
                rows[j].iter().map(|(l, o)| o * partial[*l][i]).sum::<f64>()
            })
            .collect();
        log::debug!(
            "Fourier PSF at t0={:.3}s: {} snapshot(s), flux in image {:.4}",
            exposure.t0(),
            exposure.len(),
            data.iter().sum::<f64>()
        );
        Ok(PsfImage::new(data, grid, exposure.t0()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aperture::PupilGeometry, moments::Moments, Builder, FromBuilder, OpticalScreen,
        PhaseScreenStack,
    };

    fn renderer(nx: usize, size: f64) -> anyhow::Result<FourierRenderer> {
        let grid = ImageGrid::square(nx, size / nx as f64);
        let aperture = Aperture::fourier(PupilGeometry::default(), 700., grid.field(), 1., 2.)?;
        Ok(FourierRenderer::new(aperture, 700., grid)?)
    }

    #[test]
    fn diffraction_limited() -> anyhow::Result<()> {
        // odd number of pixels for an image symmetric about its center
        let renderer = renderer(65, 1.)?;
        let exposure = PhaseScreenStack::new(0.025)?.exposure(0.025)?;
        let image = renderer.render(&exposure, &mut RandomStream::new(1))?;
        assert_eq!(image.nx(), 65);
        // ~2% of the flux in the Airy wings outside of the image
        assert!((image.sum() - 1.).abs() < 0.05, "{}", image.sum());
        let peak = image
            .data()
            .iter()
            .enumerate()
            .fold((0, 0f64), |a, (k, &v)| if v > a.1 { (k, v) } else { a });
        assert_eq!(peak.0, 32 * 65 + 32);
        let moments = Moments::new(&image)?;
        assert!(moments.ix.abs() < 1e-6 && moments.iy.abs() < 1e-6);
        assert!(moments.e1.abs() < 1e-6 && moments.e2.abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn rebinned_flux_and_size() -> anyhow::Result<()> {
        let exposure = PhaseScreenStack::new(0.025)?.exposure(0.025)?;
        for nx in [33, 65, 257] {
            let image = renderer(nx, 1.)?.render(&exposure, &mut RandomStream::new(1))?;
            assert!(image.sum() <= 1. + 1e-12, "nx={nx}: {}", image.sum());
            assert!(image.sum() > 0.95, "nx={nx}: {}", image.sum());
        }
        // 1 wave defocus at 500nm, same field and optics on 3 image samplings
        let optics = OpticalScreen::builder().defocus(1.).build()?;
        let exposure = PhaseScreenStack::new(0.025)?
            .with_optics(optics)
            .exposure(0.025)?;
        let aperture = renderer(128, 2.)?.aperture().clone();
        let rsqr = [32, 64, 128]
            .into_iter()
            .map(|nx| -> anyhow::Result<f64> {
                let grid = ImageGrid::square(nx, 2. / nx as f64);
                let image = FourierRenderer::new(aperture.clone(), 700., grid)?
                    .render(&exposure, &mut RandomStream::new(1))?;
                assert!(image.sum() <= 1. + 1e-12);
                Ok(Moments::new(&image)?.rsqr * grid.scale * grid.scale)
            })
            .collect::<anyhow::Result<Vec<f64>>>()?;
        for r in &rsqr {
            assert!((r / rsqr[2] - 1.).abs() < 0.02, "{:?}", rsqr);
        }
        Ok(())
    }

    #[test]
    fn tilt_moves_centroid() -> anyhow::Result<()> {
        let renderer = renderer(128, 2.)?;
        // 0.5 wave tip at 500nm over a 2m radius: 250nm x 2/2m = 2.5e-7 rad
        let optics = OpticalScreen::builder().tip(0.5).build()?;
        let exposure = PhaseScreenStack::new(0.025)?
            .with_optics(optics)
            .exposure(0.025)?;
        let image = renderer.render(&exposure, &mut RandomStream::new(1))?;
        let moments = Moments::new(&image)?;
        let expected = 2.5e-7f64.to_arcsec() / image.scale();
        assert!(
            (moments.ix / expected - 1.).abs() < 0.05,
            "{} vs {}",
            moments.ix,
            expected
        );
        assert!(moments.iy.abs() < 0.05 * expected);
        Ok(())
    }

    #[test]
    fn invalid_wavelength() -> anyhow::Result<()> {
        let renderer = renderer(16, 0.5)?;
        assert!(FourierRenderer::new(renderer.aperture().clone(), 0., *renderer.grid()).is_err());
        Ok(())
    }
}
