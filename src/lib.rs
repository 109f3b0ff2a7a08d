//!
//! # Phase screen PSF simulator
//!
//! Synthesizes time-evolving optical PSFs from a stack of frozen-flow atmospheric
//! turbulence layers and a randomly evolving set of Zernike aberrations, and renders
//! each frame twice: with Fourier optics (diffraction integral) and with geometric
//! optics (photon shooting).
//!
//! Elements are created using the builder associated to each element,
//! e.g. a simulation with the default parameters but only 10 frames:
//! ```no_run
//! use phase_psf::{Builder, FromBuilder, Simulation};
//! let mut sim = Simulation::builder().n_frame(10).build().unwrap();
//! let series = sim.run(None).unwrap();
//! println!("{:?}", series.fourier[0]);
//! ```

pub mod aberrations;
pub mod aperture;
pub mod atmosphere;
pub mod error;
pub mod fft;
pub mod imaging;
pub mod lookup;
pub mod moments;
pub mod optics;
pub mod random;
pub mod screen;
pub mod simulation;
pub mod zernike;

#[doc(inline)]
pub use self::aberrations::{AberrationTrajectory, CorrelatedFieldGenerator};
#[doc(inline)]
pub use self::aperture::{Aperture, ApertureBuilder, PupilGeometry};
#[doc(inline)]
pub use self::atmosphere::{AtmosphereBuilder, TurbulentLayer};
#[doc(inline)]
pub use self::error::PsfError;
#[doc(inline)]
pub use self::imaging::{
    Bounds, FourierRenderer, GeometricRenderer, ImageGrid, PsfImage, PsfRenderer, RenderError,
};
#[doc(inline)]
pub use self::lookup::LookupTable;
#[doc(inline)]
pub use self::moments::{MomentRecord, Moments, MomentsError};
#[doc(inline)]
pub use self::optics::OpticalScreen;
#[doc(inline)]
pub use self::random::RandomStream;
#[doc(inline)]
pub use self::screen::{Exposure, PhaseScreen, PhaseScreenStack, Snapshot};
#[doc(inline)]
pub use self::simulation::{
    ConfigError, FrameRecord, FrameSink, MomentSeries, PickleSink, Simulation, SimulationBuilder,
    SinkError,
};

pub type Result<T> = std::result::Result<T, PsfError>;

/// Builder type trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}

/// Gives access to the builder of a component
pub trait FromBuilder {
    type ComponentBuilder: Builder;
    fn builder() -> Self::ComponentBuilder {
        Self::ComponentBuilder::new()
    }
}
