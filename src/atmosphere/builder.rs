use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use crate::{lookup::LookupTableError, ConfigError, LookupTable, PhaseScreenStack, RandomStream};

use super::TurbulentLayer;

/// Reference turbulence profile
///
/// The normalized weights of the turbulence strength at the given altitudes
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TurbulenceProfile {
    /// altitudes in km
    pub altitude: Vec<f64>,
    pub weight: Vec<f64>,
}
/// Default profile: Ellerbroek (2002) Cerro Pachon
///  * altitude : [0.0, 2.58, 5.16, 7.73, 12.89, 15.46] km
///  * weight   : [0.652, 0.172, 0.055, 0.025, 0.074, 0.022]
impl Default for TurbulenceProfile {
    fn default() -> Self {
        Self {
            altitude: vec![0.0, 2.58, 5.16, 7.73, 12.89, 15.46],
            weight: vec![0.652, 0.172, 0.055, 0.025, 0.074, 0.022],
        }
    }
}
impl TurbulenceProfile {
    /// Linear interpolation table of the weights
    pub fn lookup(&self) -> Result<LookupTable, LookupTableError> {
        LookupTable::new(self.altitude.clone(), self.weight.clone())
    }
}

/// [PhaseScreenStack] builder for the atmospheric turbulence
///
/// Default properties:
///  * r0_500       : 20cm
///  * n_layer      : 0
///  * max_speed    : 20m/s
///  * screen_size  : 102.4m
///  * screen_scale : 0.1m
///  * time_step    : 0.025s
///  * L0           : 25m
///  * alpha        : 1 (no boiling)
///  * turbulence profile : [TurbulenceProfile::default]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AtmosphereBuilder {
    pub r0_500: f64,
    pub n_layer: usize,
    pub max_speed: f64,
    pub screen_size: f64,
    pub screen_scale: f64,
    pub time_step: f64,
    pub oscale: f64,
    pub alpha: f64,
    pub turbulence: TurbulenceProfile,
}
impl Default for AtmosphereBuilder {
    fn default() -> Self {
        Self {
            r0_500: 0.2,
            n_layer: 0,
            max_speed: 20.,
            screen_size: 102.4,
            screen_scale: 0.1,
            time_step: 0.025,
            oscale: 25.,
            alpha: 1.,
            turbulence: TurbulenceProfile::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AtmosphereBuilderError {
    #[error("cannot open `AtmosphereBuilder` toml file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create `AtmosphereBuilder` toml file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read `AtmosphereBuilder` toml file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write `AtmosphereBuilder` toml file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize `AtmosphereBuilder` from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize `AtmosphereBuilder` into toml")]
    Save(#[from] toml::ser::Error),
    #[error("r0 must be positive, found {0}m")]
    R0(f64),
    #[error("the maximum wind speed must be positive or zero, found {0}m/s")]
    MaxSpeed(f64),
    #[error("invalid phase screen: {0}m sampled at {1}m")]
    Screen(f64, f64),
    #[error("the outer scale must be positive, found {0}m")]
    OuterScale(f64),
    #[error("the boiling factor must be in ]0,1], found {0}")]
    Alpha(f64),
    #[error("invalid turbulence profile")]
    Profile(#[from] LookupTableError),
}

/// ## Atmosphere builder
impl AtmosphereBuilder {
    /// Load the atmospheric builder from a toml
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, AtmosphereBuilderError> {
        let mut file = File::open(&path)
            .map_err(|e| AtmosphereBuilderError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| AtmosphereBuilderError::Read(e, path.as_ref().to_path_buf()))?;
        let builder: AtmosphereBuilder = toml::from_str(&toml)?;
        Ok(builder)
    }
    /// Save the atmospheric builder to a toml
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), AtmosphereBuilderError> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| AtmosphereBuilderError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# AtmosphereBuilder\n\n{}", toml)
            .map_err(|e| AtmosphereBuilderError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Set r0 value at 500nm in meters
    pub fn r0_500(self, r0_500: f64) -> Self {
        Self { r0_500, ..self }
    }
    /// Set the number of turbulence layers
    pub fn n_layer(self, n_layer: usize) -> Self {
        Self { n_layer, ..self }
    }
    /// Set the maximum wind speed in m/s
    pub fn max_speed(self, max_speed: f64) -> Self {
        Self { max_speed, ..self }
    }
    /// Set the size and the sampling of the phase screens in meters
    pub fn screen(self, screen_size: f64, screen_scale: f64) -> Self {
        Self {
            screen_size,
            screen_scale,
            ..self
        }
    }
    /// Set the time step in seconds
    pub fn time_step(self, time_step: f64) -> Self {
        Self { time_step, ..self }
    }
    /// Set outer scale value in meters
    pub fn oscale(self, oscale: f64) -> Self {
        Self { oscale, ..self }
    }
    /// Set the boiling factor
    pub fn alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }
    /// Set the turbulence profile
    pub fn turbulence_profile(self, turbulence: TurbulenceProfile) -> Self {
        Self { turbulence, ..self }
    }
    /// Layer altitudes in km, evenly spaced from the ground to the highest profile altitude
    pub fn altitudes(&self) -> Vec<f64> {
        let max_alt = self
            .turbulence
            .altitude
            .last()
            .cloned()
            .unwrap_or_default();
        match self.n_layer {
            0 => vec![],
            1 => vec![0.],
            n => (0..n)
                .map(|i| max_alt * i as f64 / (n - 1) as f64)
                .collect(),
        }
    }
    /// Profile weights interpolated at the layer altitudes
    pub fn interpolated_weights(&self) -> Result<Vec<f64>, AtmosphereBuilderError> {
        let table = self.turbulence.lookup()?;
        Ok(self
            .altitudes()
            .into_iter()
            .map(|h| table.interpolate(h))
            .collect())
    }
    /// Layer weights normalized to 1
    pub fn weights(&self) -> Result<Vec<f64>, AtmosphereBuilderError> {
        let w = self.interpolated_weights()?;
        let s: f64 = w.iter().sum();
        Ok(w.into_iter().map(|w| w / s).collect())
    }
    /// Checks the builder parameters
    pub fn validate(&self) -> Result<(), AtmosphereBuilderError> {
        if !(self.r0_500 > 0.) {
            return Err(AtmosphereBuilderError::R0(self.r0_500));
        }
        if !(self.max_speed >= 0.) {
            return Err(AtmosphereBuilderError::MaxSpeed(self.max_speed));
        }
        if !(self.screen_scale > 0. && self.screen_size >= self.screen_scale) {
            return Err(AtmosphereBuilderError::Screen(
                self.screen_size,
                self.screen_scale,
            ));
        }
        if !(self.oscale > 0.) {
            return Err(AtmosphereBuilderError::OuterScale(self.oscale));
        }
        if !(self.alpha > 0. && self.alpha <= 1.) {
            return Err(AtmosphereBuilderError::Alpha(self.alpha));
        }
        self.turbulence.lookup()?;
        Ok(())
    }
    /// Build the turbulence layers into a [PhaseScreenStack]
    ///
    /// The wind speed and direction of each layer are drawn from `rng` first,
    /// then the seeds of the screens of each layer.
    pub fn build(self, rng: &mut RandomStream) -> Result<PhaseScreenStack, ConfigError> {
        let stack = PhaseScreenStack::new(self.time_step)?;
        if self.n_layer == 0 {
            log::info!("No atmospheric turbulence");
            return Ok(stack);
        }
        self.validate()?;
        let weights = self.weights()?;
        let r0: Vec<f64> = weights
            .iter()
            .map(|w| self.r0_500 * w.powf(-3. / 5.))
            .collect();
        let winds: Vec<(f64, f64)> = (0..self.n_layer)
            .map(|_| {
                let speed = rng.uniform() * self.max_speed;
                (speed, rng.angle())
            })
            .collect();
        let layers: Vec<TurbulentLayer> = self
            .altitudes()
            .into_iter()
            .zip(r0)
            .zip(winds)
            .map(|((altitude, r0), wind)| {
                log::info!(
                    "Adding layer at altitude {:5.2}km with r0={:.3}m, wind speed {:5.2}m/s and direction {:6.1}deg",
                    altitude,
                    r0,
                    wind.0,
                    wind.1.to_degrees()
                );
                TurbulentLayer::new(
                    r0,
                    wind,
                    altitude,
                    (self.screen_size, self.screen_scale),
                    self.oscale,
                    self.alpha,
                    self.time_step,
                    rng,
                )
            })
            .collect();
        Ok(stack.with_layers(layers))
    }
}
