use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use skyangle::Conversion;

use super::Simulation;
use crate::{
    aberrations::AberrationsError,
    aperture::ApertureError,
    atmosphere::AtmosphereBuilderError,
    imaging::check_apertures,
    optics::OpticsError,
    screen::ScreenError,
    Aperture, AtmosphereBuilder, Builder, CorrelatedFieldGenerator, FourierRenderer,
    GeometricRenderer, ImageGrid, PupilGeometry, RandomStream, Result,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open `SimulationBuilder` toml file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create `SimulationBuilder` toml file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read `SimulationBuilder` toml file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write `SimulationBuilder` toml file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize `SimulationBuilder` from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize `SimulationBuilder` into toml")]
    Save(#[from] toml::ser::Error),
    #[error("invalid aberrations")]
    Aberrations(#[from] AberrationsError),
    #[error("invalid atmosphere")]
    Atmosphere(#[from] AtmosphereBuilderError),
    #[error("invalid optical screen")]
    Optics(#[from] OpticsError),
    #[error("invalid phase screen stack")]
    Screen(#[from] ScreenError),
    #[error("invalid aperture")]
    Aperture(#[from] ApertureError),
    #[error("the wavelength must be positive, found {0}nm")]
    Wavelength(f64),
    #[error("invalid image: {0} pixels over {1}arcsec")]
    Image(usize, f64),
    #[error("the number of photons must be at least 1")]
    NoPhoton,
    #[error("the batch size must be at least 1")]
    BatchSize,
    #[error("invalid field angle: ({0},{1})arcsec")]
    FieldAngle(f64, f64),
}

/// [Simulation] builder
///
/// Default properties:
///  * seed              : 1
///  * lam               : 700nm
///  * lam_0             : 500nm (aberrations wavelength)
///  * exptime           : the atmosphere time step
///  * nx                : 256 pixels
///  * size              : 0.6arcsec
///  * field_angle       : [0,0]arcsec (on-axis source)
///  * pad_factor        : 1
///  * oversampling      : 1
///  * geom_oversampling : 1
///  * n_photons         : 100000
///  * batch_size        : the number of threads
///  * out               : "output/fft_vs_geom_"
///  * aberrations       : [CorrelatedFieldGenerator::default]
///  * atmosphere        : [AtmosphereBuilder::default] (no turbulence)
///  * pupil             : [PupilGeometry::default] (4m unobscured)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationBuilder {
    pub seed: u64,
    pub lam: f64,
    pub lam_0: f64,
    pub exptime: Option<f64>,
    pub nx: usize,
    pub size: f64,
    #[serde(default)]
    pub field_angle: [f64; 2],
    pub pad_factor: f64,
    pub oversampling: f64,
    pub geom_oversampling: f64,
    pub n_photons: usize,
    pub batch_size: Option<usize>,
    pub out: String,
    pub aberrations: CorrelatedFieldGenerator,
    pub atmosphere: AtmosphereBuilder,
    pub pupil: PupilGeometry,
}
impl Default for SimulationBuilder {
    fn default() -> Self {
        Self {
            seed: 1,
            lam: 700.,
            lam_0: 500.,
            exptime: None,
            nx: 256,
            size: 0.6,
            field_angle: [0.; 2],
            pad_factor: 1.,
            oversampling: 1.,
            geom_oversampling: 1.,
            n_photons: 100_000,
            batch_size: None,
            out: "output/fft_vs_geom_".to_string(),
            aberrations: Default::default(),
            atmosphere: Default::default(),
            pupil: Default::default(),
        }
    }
}

/// ## Simulation builder
impl SimulationBuilder {
    /// Load the simulation builder from a toml
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let mut file =
            File::open(&path).map_err(|e| ConfigError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| ConfigError::Read(e, path.as_ref().to_path_buf()))?;
        let builder: SimulationBuilder = toml::from_str(&toml)?;
        Ok(builder)
    }
    /// Save the simulation builder to a toml
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| ConfigError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# SimulationBuilder\n\n{}", toml)
            .map_err(|e| ConfigError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Set the seed of the random number generator
    pub fn seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
    /// Set the number of frames
    pub fn n_frame(mut self, n: usize) -> Self {
        self.aberrations.n = n;
        self
    }
    /// Set the largest Zernike mode of the aberrations
    pub fn jmax(mut self, jmax: usize) -> Self {
        self.aberrations.jmax = jmax;
        self
    }
    /// Set the correlation length of the aberrations in frames
    pub fn ell(mut self, ell: f64) -> Self {
        self.aberrations.ell = ell;
        self
    }
    /// Set the RMS of the aberrations in wave at `lam_0`
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.aberrations.sigma = sigma;
        self
    }
    /// Set the aberrations generator
    pub fn aberrations(self, aberrations: CorrelatedFieldGenerator) -> Self {
        Self {
            aberrations,
            ..self
        }
    }
    /// Set the atmospheric turbulence
    pub fn atmosphere(self, atmosphere: AtmosphereBuilder) -> Self {
        Self { atmosphere, ..self }
    }
    /// Set the number of turbulence layers
    pub fn n_layer(mut self, n_layer: usize) -> Self {
        self.atmosphere.n_layer = n_layer;
        self
    }
    /// Set the pupil geometry
    pub fn pupil(self, pupil: PupilGeometry) -> Self {
        Self { pupil, ..self }
    }
    /// Set the wavelength in nm
    pub fn lam(self, lam: f64) -> Self {
        Self { lam, ..self }
    }
    /// Set the reference wavelength of the aberrations in nm
    pub fn lam_0(self, lam_0: f64) -> Self {
        Self { lam_0, ..self }
    }
    /// Set the exposure time in seconds
    pub fn exptime(self, exptime: f64) -> Self {
        Self {
            exptime: Some(exptime),
            ..self
        }
    }
    /// Set the image size: `nx x nx` pixels over `size` arcsec
    pub fn image(self, nx: usize, size: f64) -> Self {
        Self { nx, size, ..self }
    }
    /// Set the field angle of the source in arcsec
    pub fn field_angle(self, theta_x: f64, theta_y: f64) -> Self {
        Self {
            field_angle: [theta_x, theta_y],
            ..self
        }
    }
    /// Set the Fourier optics pupil plane padding and oversampling factors
    pub fn fourier_sampling(self, pad_factor: f64, oversampling: f64) -> Self {
        Self {
            pad_factor,
            oversampling,
            ..self
        }
    }
    /// Set the geometric optics pupil plane oversampling factor
    pub fn geom_oversampling(self, geom_oversampling: f64) -> Self {
        Self {
            geom_oversampling,
            ..self
        }
    }
    /// Set the number of photons per frame
    pub fn n_photons(self, n_photons: usize) -> Self {
        Self { n_photons, ..self }
    }
    /// Set the number of frames rendered in parallel
    pub fn batch_size(self, batch_size: usize) -> Self {
        Self {
            batch_size: Some(batch_size),
            ..self
        }
    }
    /// Set the output path prefix
    pub fn out<S: Into<String>>(self, out: S) -> Self {
        Self {
            out: out.into(),
            ..self
        }
    }
    /// Image grid
    pub fn grid(&self) -> ImageGrid {
        ImageGrid::square(self.nx, self.size / self.nx as f64)
    }
    /// Exposure time in seconds
    pub fn exposure_time(&self) -> f64 {
        self.exptime.unwrap_or(self.atmosphere.time_step)
    }
    /// Checks the simulation parameters
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.aberrations.validate()?;
        if self.atmosphere.n_layer > 0 {
            self.atmosphere.validate()?;
        }
        if !(self.atmosphere.time_step > 0.) {
            return Err(ScreenError::TimeStep(self.atmosphere.time_step).into());
        }
        if !(self.exposure_time() > 0.) {
            return Err(ScreenError::ExposureTime(self.exposure_time()).into());
        }
        self.pupil.validate()?;
        if !(self.lam > 0.) {
            return Err(ConfigError::Wavelength(self.lam));
        }
        if !(self.lam_0 > 0.) {
            return Err(OpticsError::Wavelength(self.lam_0).into());
        }
        if self.nx == 0 || !(self.size > 0.) {
            return Err(ConfigError::Image(self.nx, self.size));
        }
        if self.n_photons == 0 {
            return Err(ConfigError::NoPhoton);
        }
        if !self.field_angle.iter().all(|t| t.is_finite()) {
            return Err(ConfigError::FieldAngle(
                self.field_angle[0],
                self.field_angle[1],
            ));
        }
        if self.batch_size == Some(0) {
            return Err(ConfigError::BatchSize);
        }
        Ok(())
    }
}
impl Builder for SimulationBuilder {
    type Component = Simulation;
    fn build(self) -> Result<Simulation> {
        self.validate()?;
        let mut rng = RandomStream::new(self.seed);
        let trajectory = self.aberrations.generate(&mut rng).map_err(ConfigError::from)?;
        let stack = self.atmosphere.clone().build(&mut rng)?;
        let grid = self.grid();
        let fourier_aperture = Aperture::fourier(
            self.pupil.clone(),
            self.lam,
            grid.field(),
            self.pad_factor,
            self.oversampling,
        )?;
        let geometric_aperture = Aperture::geometric(self.pupil.clone(), self.geom_oversampling)?;
        check_apertures(&fourier_aperture, &geometric_aperture)?;
        let theta = self.field_angle.map(|t| t.from_arcsec());
        let fourier = FourierRenderer::new(fourier_aperture, self.lam, grid)?.field_angle(theta);
        let geometric =
            GeometricRenderer::new(geometric_aperture, grid, self.n_photons)?.field_angle(theta);
        let batch_size = self
            .batch_size
            .unwrap_or_else(rayon::current_num_threads)
            .max(1);
        log::info!(
            "Simulation of {} frames ({} Zernike modes, {} turbulence layers) on {}x{} images of {:.4}arcsec pixels",
            trajectory.n_frame(),
            trajectory.n_mode(),
            stack.layers().len(),
            grid.nx,
            grid.ny,
            grid.scale
        );
        Ok(Simulation {
            exptime: self.exposure_time(),
            batch_size,
            builder: self,
            rng,
            trajectory,
            stack,
            fourier,
            geometric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml() -> anyhow::Result<()> {
        let builder = SimulationBuilder::default()
            .seed(7)
            .n_frame(12)
            .n_layer(3)
            .exptime(0.05)
            .field_angle(12., -3.5)
            .pupil(PupilGeometry {
                obscuration: 0.3,
                n_strut: 3,
                ..Default::default()
            });
        let path = std::env::temp_dir().join("phase-psf_simulation.toml");
        builder.save(&path)?;
        let loaded = SimulationBuilder::load(&path)?;
        assert_eq!(builder, loaded);
        Ok(())
    }

    #[test]
    fn invalid_configurations() {
        assert!(SimulationBuilder::default().jmax(0).validate().is_err());
        assert!(SimulationBuilder::default().n_frame(0).validate().is_err());
        assert!(SimulationBuilder::default().lam(0.).validate().is_err());
        assert!(SimulationBuilder::default().image(0, 1.).validate().is_err());
        assert!(SimulationBuilder::default().n_photons(0).validate().is_err());
        assert!(SimulationBuilder::default().batch_size(0).validate().is_err());
        assert!(SimulationBuilder::default()
            .field_angle(f64::NAN, 0.)
            .validate()
            .is_err());
        assert!(SimulationBuilder::default()
            .pupil(PupilGeometry {
                obscuration: 1.2,
                ..Default::default()
            })
            .validate()
            .is_err());
        assert!(SimulationBuilder::default()
            .n_layer(2)
            .atmosphere(AtmosphereBuilder::default().n_layer(2).r0_500(-1.))
            .validate()
            .is_err());
        assert!(SimulationBuilder::default().n_layer(1).validate().is_ok());
        assert!(SimulationBuilder::default().jmax(1).validate().is_ok());
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            SimulationBuilder::load("this/file/does/not/exist.toml"),
            Err(ConfigError::Open(..))
        ));
    }
}
