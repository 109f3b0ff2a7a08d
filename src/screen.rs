//! Phase screens and phase screen stack
//!
//! A [PhaseScreenStack] is the only mutable, time-evolving, element of a simulation.
//! It is advanced in time by a single owner that captures immutable [Snapshot]s
//! of the stack; the renderers only ever see the snapshots.

use crate::{
    atmosphere::{FrozenLayer, TurbulentLayer},
    ConfigError, OpticalScreen,
};

#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error("the time step must be positive, found {0}s")]
    TimeStep(f64),
    #[error("the exposure time must be positive, found {0}s")]
    ExposureTime(f64),
}

/// Optical path difference contributor
pub trait PhaseScreen {
    /// Optical path difference in nanometers at the pupil coordinates `(x,y)` in meters
    /// for a source in the direction `theta` (radians)
    fn opd(&self, x: f64, y: f64, theta: [f64; 2]) -> f64;
    /// Gradient of the optical path difference in nm/m, estimated by central
    /// differences separated by `2*step` meters
    fn opd_gradient(&self, x: f64, y: f64, theta: [f64; 2], step: f64) -> [f64; 2] {
        let half = 0.5 / step;
        [
            (self.opd(x + step, y, theta) - self.opd(x - step, y, theta)) * half,
            (self.opd(x, y + step, theta) - self.opd(x, y - step, theta)) * half,
        ]
    }
}

/// Immutable state of a [PhaseScreenStack] at a given time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    time: f64,
    layers: Vec<FrozenLayer>,
    optics: Option<OpticalScreen>,
}
impl Snapshot {
    /// Time of the snapshot in seconds
    pub fn time(&self) -> f64 {
        self.time
    }
    pub fn layers(&self) -> &[FrozenLayer] {
        &self.layers
    }
    pub fn optics(&self) -> Option<&OpticalScreen> {
        self.optics.as_ref()
    }
}
impl PhaseScreen for Snapshot {
    fn opd(&self, x: f64, y: f64, theta: [f64; 2]) -> f64 {
        self.layers
            .iter()
            .map(|layer| layer.opd(x, y, theta))
            .sum::<f64>()
            + self
                .optics
                .as_ref()
                .map_or(0., |optics| optics.opd(x, y, theta))
    }
    fn opd_gradient(&self, x: f64, y: f64, theta: [f64; 2], step: f64) -> [f64; 2] {
        self.layers
            .iter()
            .map(|layer| layer.opd_gradient(x, y, theta, step))
            .chain(
                self.optics
                    .iter()
                    .map(|optics| optics.opd_gradient(x, y, theta, step)),
            )
            .fold([0.; 2], |a, g| [a[0] + g[0], a[1] + g[1]])
    }
}

/// Snapshots of a [PhaseScreenStack] over an exposure
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    t0: f64,
    exptime: f64,
    snapshots: Vec<Snapshot>,
}
impl Exposure {
    /// Start time of the exposure in seconds
    pub fn t0(&self) -> f64 {
        self.t0
    }
    /// Exposure time in seconds
    pub fn exptime(&self) -> f64 {
        self.exptime
    }
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Ordered collection of phase screens
///
/// Turbulent layers come first, followed by the optical screen if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseScreenStack {
    layers: Vec<TurbulentLayer>,
    optics: Option<OpticalScreen>,
    time_step: f64,
    time: f64,
}
impl PhaseScreenStack {
    /// Creates an empty stack advancing by `time_step` seconds
    pub fn new(time_step: f64) -> Result<Self, ConfigError> {
        if !(time_step > 0.) {
            return Err(ScreenError::TimeStep(time_step).into());
        }
        Ok(Self {
            layers: vec![],
            optics: None,
            time_step,
            time: 0.,
        })
    }
    /// Adds turbulent layers to the stack
    pub fn with_layers(mut self, layers: Vec<TurbulentLayer>) -> Self {
        self.layers.extend(layers);
        self
    }
    /// Sets the optical screen
    pub fn with_optics(mut self, optics: OpticalScreen) -> Self {
        self.optics = Some(optics);
        self
    }
    /// Replaces the optical screen
    pub fn set_optics(&mut self, optics: Option<OpticalScreen>) -> &mut Self {
        self.optics = optics;
        self
    }
    pub fn push(&mut self, layer: TurbulentLayer) {
        self.layers.push(layer);
    }
    pub fn layers(&self) -> &[TurbulentLayer] {
        &self.layers
    }
    pub fn optics(&self) -> Option<&OpticalScreen> {
        self.optics.as_ref()
    }
    /// Number of screens
    pub fn len(&self) -> usize {
        self.layers.len() + self.optics.iter().count()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// A stack without turbulent layers does not evolve in time
    pub fn is_static(&self) -> bool {
        self.layers.is_empty()
    }
    pub fn time_step(&self) -> f64 {
        self.time_step
    }
    /// Current time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }
    /// Advances all the screens by one time step
    pub fn advance(&mut self) -> &mut Self {
        self.layers.iter_mut().for_each(|layer| {
            layer.advance();
        });
        self.time += self.time_step;
        self
    }
    /// Advances all the screens by `dt` seconds rounded to a whole number of time steps
    pub fn advance_by(&mut self, dt: f64) -> &mut Self {
        let n_step = (dt / self.time_step).round() as usize;
        for _ in 0..n_step {
            self.advance();
        }
        self
    }
    /// Resets the stack to time 0
    pub fn reset(&mut self) -> &mut Self {
        self.layers.iter_mut().for_each(|layer| {
            layer.reset();
        });
        self.time = 0.;
        self
    }
    /// Captures the current state of the stack
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time: self.time,
            layers: self.layers.iter().map(|layer| layer.freeze()).collect(),
            optics: self.optics.clone(),
        }
    }
    /// Captures the stack over an exposure of `exptime` seconds starting now
    ///
    /// One snapshot is taken per time step (at least one) and the stack is left
    /// at the end of the exposure.
    /// The exposure of a static stack is a single snapshot.
    pub fn exposure(&mut self, exptime: f64) -> Result<Exposure, ConfigError> {
        if !(exptime > 0.) {
            return Err(ScreenError::ExposureTime(exptime).into());
        }
        let t0 = self.time;
        let n_step = ((exptime / self.time_step).round() as usize).max(1);
        let mut snapshots = Vec::with_capacity(n_step);
        for i in 0..n_step {
            if i == 0 || !self.is_static() {
                snapshots.push(self.snapshot());
            }
            self.advance();
        }
        log::debug!(
            "exposure from {:.3}s to {:.3}s: {} snapshot(s)",
            t0,
            self.time,
            snapshots.len()
        );
        Ok(Exposure {
            t0,
            exptime,
            snapshots,
        })
    }
}
impl PhaseScreen for PhaseScreenStack {
    fn opd(&self, x: f64, y: f64, theta: [f64; 2]) -> f64 {
        self.layers
            .iter()
            .map(|layer| layer.opd(x, y, theta))
            .sum::<f64>()
            + self
                .optics
                .as_ref()
                .map_or(0., |optics| optics.opd(x, y, theta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AtmosphereBuilder, Builder, FromBuilder, RandomStream};

    #[test]
    fn static_exposure() -> anyhow::Result<()> {
        let optics = OpticalScreen::builder().defocus(0.2).build()?;
        let mut stack = PhaseScreenStack::new(0.025)?.with_optics(optics);
        assert!(stack.is_static());
        let exposure = stack.exposure(0.1)?;
        assert_eq!(exposure.len(), 1);
        assert_eq!(exposure.t0(), 0.);
        assert!((stack.time() - 0.1).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn turbulent_exposure() -> anyhow::Result<()> {
        let mut rng = RandomStream::new(1234);
        let mut stack = AtmosphereBuilder::default()
            .n_layer(2)
            .screen(10., 0.1)
            .build(&mut rng)?;
        let exposure = stack.exposure(0.1)?;
        assert_eq!(exposure.len(), 4);
        let times: Vec<f64> = exposure.snapshots().iter().map(|s| s.time()).collect();
        times
            .iter()
            .enumerate()
            .for_each(|(i, t)| assert!((t - 0.025 * i as f64).abs() < 1e-12));
        assert!(stack.exposure(0.).is_err());
        Ok(())
    }

    #[test]
    fn snapshots_are_frozen() -> anyhow::Result<()> {
        let mut rng = RandomStream::new(1234);
        let mut stack = AtmosphereBuilder::default()
            .n_layer(1)
            .max_speed(10.)
            .screen(10., 0.1)
            .build(&mut rng)?;
        let snapshot = stack.snapshot();
        let before = snapshot.opd(0.3, 0.2, [0.; 2]);
        assert_eq!(before, stack.opd(0.3, 0.2, [0.; 2]));
        stack.advance_by(0.5);
        assert_eq!(before, snapshot.opd(0.3, 0.2, [0.; 2]));
        stack.reset();
        assert_eq!(stack.snapshot(), snapshot);
        Ok(())
    }

    #[test]
    fn invalid_time_step() {
        assert!(PhaseScreenStack::new(0.).is_err());
    }

    #[test]
    fn stack_opd_is_sum() -> anyhow::Result<()> {
        let mut rng = RandomStream::new(5);
        let optics = OpticalScreen::builder().coma1(0.1).build()?;
        let stack = AtmosphereBuilder::default()
            .n_layer(3)
            .screen(10., 0.1)
            .build(&mut rng)?
            .with_optics(optics.clone());
        let snapshot = stack.snapshot();
        let (x, y) = (0.7, -1.1);
        let sum = snapshot
            .layers()
            .iter()
            .map(|l| l.opd(x, y, [0.; 2]))
            .sum::<f64>()
            + optics.opd(x, y, [0.; 2]);
        assert!((snapshot.opd(x, y, [0.; 2]) - sum).abs() < 1e-9);
        Ok(())
    }
}
