//! Optical aberrations phase screen

use serde::{Deserialize, Serialize};

use crate::{
    screen::PhaseScreen,
    zernike::{annular_to_circular, ZernikeSeries},
    Builder, ConfigError, FromBuilder, Result,
};

#[derive(Debug, thiserror::Error)]
pub enum OpticsError {
    #[error("the optical screen diameter must be positive, found {0}m")]
    Diameter(f64),
    #[error("the optical screen obscuration must be in [0,1[, found {0}")]
    Obscuration(f64),
    #[error("the reference wavelength must be positive, found {0}nm")]
    Wavelength(f64),
    #[error("piston (j=1) is not an aberration, Noll index must be > 1, found {0}")]
    NollIndex(usize),
    #[error("failed to orthonormalize {0} Zernike modes over the annulus of obscuration {1}")]
    Annulus(usize, f64),
}

/// Zernike aberrations phase screen
///
/// The aberrations are given in waves at the reference wavelength `lam_0`,
/// starting from tip (j=2).
/// With a central obscuration, the modes are the annular Zernike polynomials,
/// with a unit RMS over the annulus.
/// The screen does not evolve in time.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalScreen {
    diameter: f64,
    obscuration: f64,
    lam_0: f64,
    aberrations: Vec<f64>,
    series: ZernikeSeries,
}
impl FromBuilder for OpticalScreen {
    type ComponentBuilder = OpticalScreenBuilder;
}
impl OpticalScreen {
    pub fn diameter(&self) -> f64 {
        self.diameter
    }
    pub fn obscuration(&self) -> f64 {
        self.obscuration
    }
    /// Reference wavelength in nanometers
    pub fn lam_0(&self) -> f64 {
        self.lam_0
    }
    /// Zernike coefficients from tip (j=2)
    pub fn aberrations(&self) -> &[f64] {
        &self.aberrations
    }
}
impl PhaseScreen for OpticalScreen {
    fn opd(&self, x: f64, y: f64, _theta: [f64; 2]) -> f64 {
        let radius = 0.5 * self.diameter;
        self.lam_0 * self.series.eval(x / radius, y / radius)
    }
}

/// [OpticalScreen] builder
///
/// Default properties:
///  * diameter    : 4m
///  * obscuration : 0
///  * lam_0       : 500nm
///  * aberrations : none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalScreenBuilder {
    pub diameter: f64,
    pub obscuration: f64,
    pub lam_0: f64,
    pub aberrations: Vec<f64>,
}
impl Default for OpticalScreenBuilder {
    fn default() -> Self {
        Self {
            diameter: 4.,
            obscuration: 0.,
            lam_0: 500.,
            aberrations: vec![],
        }
    }
}
impl OpticalScreenBuilder {
    /// Set the diameter of the aperture in meters
    pub fn diameter(self, diameter: f64) -> Self {
        Self { diameter, ..self }
    }
    /// Set the linear fractional obscuration
    pub fn obscuration(self, obscuration: f64) -> Self {
        Self {
            obscuration,
            ..self
        }
    }
    /// Set the reference wavelength in nanometers
    pub fn lam_0(self, lam_0: f64) -> Self {
        Self { lam_0, ..self }
    }
    /// Set the Zernike coefficients starting from tip (j=2)
    pub fn aberrations(self, aberrations: Vec<f64>) -> Self {
        Self {
            aberrations,
            ..self
        }
    }
    /// Set the coefficient of the Zernike mode `j` (Noll index, j>1)
    pub fn zernike(self, j: usize, value: f64) -> std::result::Result<Self, OpticsError> {
        if j < 2 {
            return Err(OpticsError::NollIndex(j));
        }
        Ok(self.mode(j - 2, value))
    }
    fn mode(mut self, k: usize, value: f64) -> Self {
        if self.aberrations.len() <= k {
            self.aberrations.resize(k + 1, 0.);
        }
        self.aberrations[k] = value;
        self
    }
    pub fn tip(self, value: f64) -> Self {
        self.mode(0, value)
    }
    pub fn tilt(self, value: f64) -> Self {
        self.mode(1, value)
    }
    pub fn defocus(self, value: f64) -> Self {
        self.mode(2, value)
    }
    pub fn astig1(self, value: f64) -> Self {
        self.mode(3, value)
    }
    pub fn astig2(self, value: f64) -> Self {
        self.mode(4, value)
    }
    pub fn coma1(self, value: f64) -> Self {
        self.mode(5, value)
    }
    pub fn coma2(self, value: f64) -> Self {
        self.mode(6, value)
    }
    pub fn trefoil1(self, value: f64) -> Self {
        self.mode(7, value)
    }
    pub fn trefoil2(self, value: f64) -> Self {
        self.mode(8, value)
    }
    pub fn spher(self, value: f64) -> Self {
        self.mode(9, value)
    }
}
impl Builder for OpticalScreenBuilder {
    type Component = OpticalScreen;
    fn build(self) -> Result<OpticalScreen> {
        if !(self.diameter > 0.) {
            return Err(ConfigError::from(OpticsError::Diameter(self.diameter)).into());
        }
        if !(0. ..1.).contains(&self.obscuration) {
            return Err(ConfigError::from(OpticsError::Obscuration(self.obscuration)).into());
        }
        if !(self.lam_0 > 0.) {
            return Err(ConfigError::from(OpticsError::Wavelength(self.lam_0)).into());
        }
        let series = if self.obscuration > 0. && !self.aberrations.is_empty() {
            let coefficients = annular_to_circular(&self.aberrations, self.obscuration)
                .ok_or_else(|| {
                    ConfigError::from(OpticsError::Annulus(
                        self.aberrations.len() + 1,
                        self.obscuration,
                    ))
                })?;
            ZernikeSeries::new(1, &coefficients)
        } else {
            ZernikeSeries::new(2, &self.aberrations)
        };
        Ok(OpticalScreen {
            diameter: self.diameter,
            obscuration: self.obscuration,
            lam_0: self.lam_0,
            aberrations: self.aberrations,
            series,
        })
    }
}
