//! Telescope pupil
//!
//! The same [PupilGeometry] is sampled twice: finely and zero-padded for the
//! Fourier optics renderer, coarsely for the geometric optics renderer.

use serde::{Deserialize, Serialize};
use skyangle::Conversion;
use std::{f64::consts::PI, fmt::Display};

use crate::{fft::good_fft_size, Builder, ConfigError, FromBuilder, Result};

#[derive(Debug, thiserror::Error)]
pub enum ApertureError {
    #[error("the aperture diameter must be positive, found {0}m")]
    Diameter(f64),
    #[error("the obscuration must be in [0,1[, found {0}")]
    Obscuration(f64),
    #[error("the strut thickness must be in [0,1[, found {0}")]
    StrutThickness(f64),
    #[error("invalid pupil sampling: {0}")]
    Sampling(String),
}

/// Physical description of the telescope pupil
///
/// The struts are thick half-lines starting from the center of the pupil,
/// the first one at `strut_angle` radians counterclockwise from the y axis, the others
/// evenly spaced in angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupilGeometry {
    /// diameter in meters
    pub diameter: f64,
    /// linear fractional obscuration
    pub obscuration: f64,
    pub n_strut: usize,
    /// strut thickness as a fraction of the diameter
    pub strut_thickness: f64,
    /// radians
    pub strut_angle: f64,
}
impl Default for PupilGeometry {
    fn default() -> Self {
        Self {
            diameter: 4.,
            obscuration: 0.,
            n_strut: 0,
            strut_thickness: 0.05,
            strut_angle: 0.,
        }
    }
}
impl Display for PupilGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2}m pupil with {:.2} obscuration",
            self.diameter, self.obscuration
        )?;
        if self.n_strut > 0 {
            write!(
                f,
                " and {} struts ({:.2}m thick, first one at {:.1}deg)",
                self.n_strut,
                self.strut_thickness * self.diameter,
                self.strut_angle.to_degrees()
            )?;
        }
        Ok(())
    }
}
impl PupilGeometry {
    pub fn validate(&self) -> std::result::Result<(), ApertureError> {
        if !(self.diameter > 0.) {
            return Err(ApertureError::Diameter(self.diameter));
        }
        if !(0. ..1.).contains(&self.obscuration) {
            return Err(ApertureError::Obscuration(self.obscuration));
        }
        if self.n_strut > 0 && !(0. ..1.).contains(&self.strut_thickness) {
            return Err(ApertureError::StrutThickness(self.strut_thickness));
        }
        Ok(())
    }
    /// Pupil radius in meters
    pub fn radius(&self) -> f64 {
        0.5 * self.diameter
    }
    /// Returns true if the pupil point `(x,y)` in meters receives light
    pub fn is_illuminated(&self, x: f64, y: f64) -> bool {
        let r = self.radius();
        let rho2 = x * x + y * y;
        if rho2 > r * r || rho2 < (r * self.obscuration).powi(2) {
            return false;
        }
        let half_width = 0.5 * self.strut_thickness * self.diameter;
        (0..self.n_strut).all(|k| {
            let (s, c) = (self.strut_angle + 2. * PI * k as f64 / self.n_strut as f64).sin_cos();
            // coordinates across and along the strut
            let u = x * c + y * s;
            let v = -x * s + y * c;
            u.abs() >= half_width || v < 0.
        })
    }
}

/// Pupil plane sampling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PupilSampling {
    /// Zero-padded sampling resolving a `field` (radians) wide image at the wavelength `lam` (nm)
    Fourier {
        lam: f64,
        field: f64,
        pad_factor: f64,
        oversampling: f64,
    },
    /// Sampling of the phase gradients
    Geometric { oversampling: f64 },
}
impl Default for PupilSampling {
    fn default() -> Self {
        PupilSampling::Geometric { oversampling: 1. }
    }
}

/// Sampled telescope pupil
#[derive(Debug, Clone, PartialEq)]
pub struct Aperture {
    geometry: PupilGeometry,
    sampling: PupilSampling,
    pupil_plane_size: f64,
    npix: usize,
    illuminated: Vec<bool>,
}
impl FromBuilder for Aperture {
    type ComponentBuilder = ApertureBuilder;
}
impl Display for Aperture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sampled with {}x{} pixels of {:.4}m ({:.2}m pupil plane)",
            self.geometry,
            self.npix,
            self.npix,
            self.scale(),
            self.pupil_plane_size
        )
    }
}
impl Aperture {
    /// Fourier optics aperture
    ///
    /// The pupil plane is `2 pad_factor` times the pupil diameter and the pupil
    /// sampling resolves an image `field` radians wide at the wavelength `lam` (nm).
    pub fn fourier(
        geometry: PupilGeometry,
        lam: f64,
        field: f64,
        pad_factor: f64,
        oversampling: f64,
    ) -> Result<Self> {
        Aperture::builder()
            .geometry(geometry)
            .sampling(PupilSampling::Fourier {
                lam,
                field,
                pad_factor,
                oversampling,
            })
            .build()
    }
    /// Geometric optics aperture
    pub fn geometric(geometry: PupilGeometry, oversampling: f64) -> Result<Self> {
        Aperture::builder()
            .geometry(geometry)
            .sampling(PupilSampling::Geometric { oversampling })
            .build()
    }
    pub fn geometry(&self) -> &PupilGeometry {
        &self.geometry
    }
    pub fn sampling(&self) -> &PupilSampling {
        &self.sampling
    }
    /// Size of the pupil plane in meters
    pub fn pupil_plane_size(&self) -> f64 {
        self.pupil_plane_size
    }
    /// Number of pixels across the pupil plane
    pub fn npix(&self) -> usize {
        self.npix
    }
    /// Pupil plane sampling in meters
    pub fn scale(&self) -> f64 {
        self.pupil_plane_size / self.npix as f64
    }
    /// Coordinate in meters of the center of the pupil plane pixel `i`
    pub fn coordinate(&self, i: usize) -> f64 {
        (i as f64 + 0.5 - 0.5 * self.npix as f64) * self.scale()
    }
    /// Illumination mask, row-major
    pub fn illuminated(&self) -> &[bool] {
        &self.illuminated
    }
    /// Number of illuminated pixels
    pub fn n_illuminated(&self) -> usize {
        self.illuminated.iter().filter(|x| **x).count()
    }
    /// Angular pixel scale in radians of the image of the pupil plane at the wavelength `lam` (nm)
    pub fn image_scale(&self, lam: f64) -> f64 {
        lam * 1e-9 / self.pupil_plane_size
    }
}

/// [Aperture] builder
///
/// Default properties:
///  * geometry : [PupilGeometry::default]
///  * sampling : geometric with an oversampling of 1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApertureBuilder {
    pub geometry: PupilGeometry,
    pub sampling: PupilSampling,
}
impl ApertureBuilder {
    /// Set the pupil geometry
    pub fn geometry(self, geometry: PupilGeometry) -> Self {
        Self { geometry, ..self }
    }
    /// Set the diameter in meters
    pub fn diameter(mut self, diameter: f64) -> Self {
        self.geometry.diameter = diameter;
        self
    }
    /// Set the linear fractional obscuration
    pub fn obscuration(mut self, obscuration: f64) -> Self {
        self.geometry.obscuration = obscuration;
        self
    }
    /// Set the struts: number, thickness as a fraction of the diameter and
    /// angle of the first one in degrees
    pub fn struts(mut self, n_strut: usize, thickness: f64, angle: f64) -> Self {
        self.geometry.n_strut = n_strut;
        self.geometry.strut_thickness = thickness;
        self.geometry.strut_angle = angle.to_radians();
        self
    }
    /// Set the pupil plane sampling
    pub fn sampling(self, sampling: PupilSampling) -> Self {
        Self { sampling, ..self }
    }
    fn sizing(&self) -> std::result::Result<(f64, usize), ApertureError> {
        let diameter = self.geometry.diameter;
        match self.sampling {
            PupilSampling::Fourier {
                lam,
                field,
                pad_factor,
                oversampling,
            } => {
                if !(lam > 0. && field > 0. && pad_factor > 0. && oversampling > 0.) {
                    return Err(ApertureError::Sampling(format!(
                        "lam={lam}nm, field={:.3}arcsec, pad_factor={pad_factor}, oversampling={oversampling}",
                        field.to_arcsec()
                    )));
                }
                let size = 2. * diameter * pad_factor;
                let dx = (lam * 1e-9 / field).min(diameter / 32.) / oversampling;
                Ok((size, good_fft_size((size / dx).ceil() as usize)))
            }
            PupilSampling::Geometric { oversampling } => {
                if !(oversampling > 0.) {
                    return Err(ApertureError::Sampling(format!(
                        "oversampling={oversampling}"
                    )));
                }
                Ok((diameter, (32. * oversampling).ceil() as usize))
            }
        }
    }
}
impl Builder for ApertureBuilder {
    type Component = Aperture;
    fn build(self) -> Result<Aperture> {
        self.geometry.validate().map_err(ConfigError::from)?;
        let (pupil_plane_size, npix) = self.sizing().map_err(ConfigError::from)?;
        let mut aperture = Aperture {
            geometry: self.geometry,
            sampling: self.sampling,
            pupil_plane_size,
            npix,
            illuminated: vec![],
        };
        aperture.illuminated = (0..npix * npix)
            .map(|k| {
                let (i, j) = (k / npix, k % npix);
                aperture
                    .geometry
                    .is_illuminated(aperture.coordinate(j), aperture.coordinate(i))
            })
            .collect();
        log::info!("{}", aperture);
        Ok(aperture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourier_sizing() -> anyhow::Result<()> {
        let geometry = PupilGeometry::default();
        let aperture = Aperture::fourier(geometry, 700., 2f64.from_arcsec(), 1., 2.)?;
        assert_eq!(aperture.pupil_plane_size(), 8.);
        // lam/field = 0.0722m, halved by the oversampling: 222 -> 225
        assert_eq!(aperture.npix(), 225);
        assert!((aperture.scale() - 8. / 225.).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn geometric_sizing() -> anyhow::Result<()> {
        let aperture = Aperture::geometric(PupilGeometry::default(), 2.)?;
        assert_eq!(aperture.pupil_plane_size(), 4.);
        assert_eq!(aperture.npix(), 64);
        assert_eq!(aperture.scale(), 1. / 16.);
        Ok(())
    }

    #[test]
    fn illumination() {
        let geometry = PupilGeometry {
            obscuration: 0.3,
            ..Default::default()
        };
        assert!(geometry.is_illuminated(1.5, 0.));
        assert!(!geometry.is_illuminated(0.5, 0.));
        assert!(!geometry.is_illuminated(2.1, 0.));
        let struts = PupilGeometry {
            n_strut: 4,
            strut_thickness: 0.05,
            ..Default::default()
        };
        // first strut along +y, 0.2m wide
        assert!(!struts.is_illuminated(0.05, 1.5));
        assert!(!struts.is_illuminated(0.05, -1.5));
        assert!(!struts.is_illuminated(1.5, 0.05));
        assert!(struts.is_illuminated(0.15, 1.5));
        assert!(struts.is_illuminated(1., 1.));
    }

    #[test]
    fn illuminated_area() -> anyhow::Result<()> {
        let aperture = Aperture::builder()
            .obscuration(0.4)
            .sampling(PupilSampling::Geometric { oversampling: 8. })
            .build()?;
        let area = aperture.n_illuminated() as f64 * aperture.scale().powi(2);
        let expected = PI * 4. * (1. - 0.4 * 0.4);
        assert!((area / expected - 1.).abs() < 0.02, "{area} vs {expected}");
        Ok(())
    }

    #[test]
    fn invalid_aperture() {
        assert!(Aperture::builder().diameter(0.).build().is_err());
        assert!(Aperture::builder().obscuration(1.).build().is_err());
        assert!(Aperture::geometric(PupilGeometry::default(), 0.).is_err());
        assert!(Aperture::fourier(PupilGeometry::default(), 700., 0., 1., 1.).is_err());
    }
}
