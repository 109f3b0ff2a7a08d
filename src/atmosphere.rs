//! Frozen-flow atmospheric turbulence layers

use std::sync::Arc;

use crate::{screen::PhaseScreen, RandomStream};

mod builder;
mod von_karman;
pub use builder::{AtmosphereBuilder, AtmosphereBuilderError, TurbulenceProfile};
pub use von_karman::VonKarman;

/// Periodic screen sampled bilinearly
#[derive(Debug, Clone, PartialEq)]
struct Grid {
    n_px: usize,
    scale: f64,
    data: Arc<Vec<f64>>,
}
impl Grid {
    fn sample(&self, x: f64, y: f64) -> f64 {
        let n = self.n_px;
        let u = (x / self.scale).rem_euclid(n as f64);
        let v = (y / self.scale).rem_euclid(n as f64);
        let (i0, j0) = (v.floor() as usize % n, u.floor() as usize % n);
        let (i1, j1) = ((i0 + 1) % n, (j0 + 1) % n);
        let (dv, du) = (v - v.floor(), u - u.floor());
        let d = &self.data;
        (1. - dv) * ((1. - du) * d[i0 * n + j0] + du * d[i0 * n + j1])
            + dv * ((1. - du) * d[i1 * n + j0] + du * d[i1 * n + j1])
    }
}

/// Immutable state of a [TurbulentLayer]
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenLayer {
    grid: Grid,
    altitude: f64,
    offset: [f64; 2],
}
impl PhaseScreen for FrozenLayer {
    fn opd(&self, x: f64, y: f64, theta: [f64; 2]) -> f64 {
        self.grid.sample(
            x + self.altitude * theta[0] - self.offset[0],
            y + self.altitude * theta[1] - self.offset[1],
        )
    }
    fn opd_gradient(&self, x: f64, y: f64, theta: [f64; 2], step: f64) -> [f64; 2] {
        // no structure below the screen sampling
        let h = step.max(self.grid.scale);
        let half = 0.5 / h;
        [
            (self.opd(x + h, y, theta) - self.opd(x - h, y, theta)) * half,
            (self.opd(x, y + h, theta) - self.opd(x, y - h, theta)) * half,
        ]
    }
}

/// Frozen-flow turbulence layer
///
/// The von Karman screen of the layer translates rigidly with the wind.
/// If the boiling factor `alpha` is less than 1, the screen also evolves
/// at each time step as `alpha * screen + sqrt(1-alpha^2) * new_screen`.
#[derive(Debug, Clone)]
pub struct TurbulentLayer {
    r0_500: f64,
    wind_speed: f64,
    wind_direction: f64,
    altitude: f64,
    l0: f64,
    alpha: f64,
    time_step: f64,
    initial: Grid,
    grid: Grid,
    offset: [f64; 2],
    time: f64,
    boiling: Option<(VonKarman, RandomStream)>,
}
impl PartialEq for TurbulentLayer {
    fn eq(&self, other: &Self) -> bool {
        self.r0_500 == other.r0_500
            && self.wind_speed == other.wind_speed
            && self.wind_direction == other.wind_direction
            && self.altitude == other.altitude
            && self.l0 == other.l0
            && self.alpha == other.alpha
            && self.time_step == other.time_step
            && self.grid == other.grid
            && self.offset == other.offset
            && self.time == other.time
    }
}
impl TurbulentLayer {
    /// Creates a new layer
    ///
    ///  * `r0_500`: Fried parameter at 500nm in meters
    ///  * `wind`: speed in m/s and direction in radians
    ///  * `altitude`: altitude in km
    ///  * `screen`: screen size and sampling in meters
    ///  * `l0`: outer scale in meters
    ///  * `alpha`: boiling factor (1 for pure frozen flow)
    ///  * `time_step`: time step in seconds
    ///  * `rng`: the screen realisation and the boiling stream are seeded from it
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        r0_500: f64,
        wind: (f64, f64),
        altitude: f64,
        screen: (f64, f64),
        l0: f64,
        alpha: f64,
        time_step: f64,
        rng: &mut RandomStream,
    ) -> Self {
        let (screen_size, screen_scale) = screen;
        let n_px = (screen_size / screen_scale).round() as usize;
        let vk = VonKarman::new(n_px, screen_scale, r0_500, l0);
        let mut screen_rng = rng.fork();
        let boiling_rng = rng.fork();
        let grid = Grid {
            n_px,
            scale: screen_scale,
            data: Arc::new(vk.realization(&mut screen_rng)),
        };
        Self {
            r0_500,
            wind_speed: wind.0,
            wind_direction: wind.1,
            altitude,
            l0,
            alpha,
            time_step,
            initial: grid.clone(),
            grid,
            offset: [0.; 2],
            time: 0.,
            boiling: (alpha < 1.).then_some((vk, boiling_rng)),
        }
    }
    /// Fried parameter at 500nm in meters
    pub fn r0_500(&self) -> f64 {
        self.r0_500
    }
    /// Wind speed in m/s
    pub fn wind_speed(&self) -> f64 {
        self.wind_speed
    }
    /// Wind direction in radians
    pub fn wind_direction(&self) -> f64 {
        self.wind_direction
    }
    /// Wind velocity vector in m/s
    pub fn velocity(&self) -> [f64; 2] {
        let (s, c) = self.wind_direction.sin_cos();
        [self.wind_speed * c, self.wind_speed * s]
    }
    /// Altitude in km
    pub fn altitude(&self) -> f64 {
        self.altitude
    }
    /// Outer scale in meters
    pub fn outer_scale(&self) -> f64 {
        self.l0
    }
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
    /// Screen size in meters
    pub fn screen_size(&self) -> f64 {
        self.grid.n_px as f64 * self.grid.scale
    }
    /// Screen sampling in meters
    pub fn screen_scale(&self) -> f64 {
        self.grid.scale
    }
    pub fn time_step(&self) -> f64 {
        self.time_step
    }
    /// Current time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }
    /// Advances the layer by one time step
    pub fn advance(&mut self) -> &mut Self {
        let [vx, vy] = self.velocity();
        self.offset[0] += vx * self.time_step;
        self.offset[1] += vy * self.time_step;
        if let Some((vk, rng)) = self.boiling.as_mut() {
            let fresh = vk.realization(rng);
            let beta = (1. - self.alpha * self.alpha).sqrt();
            let alpha = self.alpha;
            self.grid.data = Arc::new(
                self.grid
                    .data
                    .iter()
                    .zip(fresh)
                    .map(|(s, f)| alpha * s + beta * f)
                    .collect(),
            );
        }
        self.time += self.time_step;
        self
    }
    /// Advances the layer by `dt` seconds rounded to a whole number of time steps
    pub fn advance_by(&mut self, dt: f64) -> &mut Self {
        let n_step = (dt / self.time_step).round() as usize;
        for _ in 0..n_step {
            self.advance();
        }
        self
    }
    /// Brings the layer back to its initial state
    pub fn reset(&mut self) -> &mut Self {
        self.grid = self.initial.clone();
        self.offset = [0.; 2];
        self.time = 0.;
        if let Some((_, rng)) = self.boiling.as_mut() {
            rng.reset();
        }
        self
    }
    /// Captures the current state of the layer
    pub fn freeze(&self) -> FrozenLayer {
        FrozenLayer {
            grid: self.grid.clone(),
            altitude: self.altitude * 1e3,
            offset: self.offset,
        }
    }
}
impl PhaseScreen for TurbulentLayer {
    fn opd(&self, x: f64, y: f64, theta: [f64; 2]) -> f64 {
        self.freeze().opd(x, y, theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(wind: (f64, f64), altitude: f64, alpha: f64) -> TurbulentLayer {
        TurbulentLayer::new(
            0.2,
            wind,
            altitude,
            (10., 0.05),
            25.,
            alpha,
            0.01,
            &mut RandomStream::new(1234),
        )
    }

    #[test]
    fn frozen_flow() {
        let (vx, t) = (1., 0.05);
        let mut layer = layer((vx, 0.), 0., 1.);
        let x: Vec<f64> = (0..20).map(|i| -1. + 0.1 * i as f64).collect();
        let wf0: Vec<f64> = x.iter().map(|x| layer.opd(*x, 0.3, [0.; 2])).collect();
        layer.advance_by(t);
        assert!((layer.time() - t).abs() < 1e-12);
        let wf1: Vec<f64> = x
            .iter()
            .map(|x| layer.opd(*x + vx * t, 0.3, [0.; 2]))
            .collect();
        wf0.iter()
            .zip(&wf1)
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-6, "{a} vs {b}"));
    }

    #[test]
    fn field_angle() {
        // a layer at 1km seen at an angle is the same layer shifted by 1km x theta
        let layer = layer((0., 0.), 1., 1.);
        let theta = 1e-4;
        let a = layer.opd(0.2, -0.4, [theta, 0.]);
        let b = layer.opd(0.2 + 1e3 * theta, -0.4, [0.; 2]);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn reset() {
        let mut frozen = layer((3., 1.), 0., 1.);
        let wf0 = frozen.opd(0.5, 0.5, [0.; 2]);
        frozen.advance();
        assert_ne!(wf0, frozen.opd(0.5, 0.5, [0.; 2]));
        frozen.reset();
        assert_eq!(wf0, frozen.opd(0.5, 0.5, [0.; 2]));

        let mut boiling = layer((0., 0.), 0., 0.997);
        let wf0 = boiling.opd(0.5, 0.5, [0.; 2]);
        boiling.advance();
        let wf1 = boiling.opd(0.5, 0.5, [0.; 2]);
        assert_ne!(wf0, wf1);
        boiling.reset();
        assert_eq!(wf0, boiling.opd(0.5, 0.5, [0.; 2]));
        boiling.advance();
        assert_eq!(wf1, boiling.opd(0.5, 0.5, [0.; 2]));
    }

    #[test]
    fn layers_differ() {
        let a = layer((1., 0.), 0., 1.);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.advance();
        assert_ne!(a, b);
        assert_ne!(a, layer((2., 0.), 0., 1.));
    }

    #[test]
    fn periodic() {
        let layer = layer((0., 0.), 0., 1.);
        let size = layer.screen_size();
        let a = layer.opd(0.123, 0.456, [0.; 2]);
        let b = layer.opd(0.123 + size, 0.456 - size, [0.; 2]);
        assert!((a - b).abs() < 1e-9);
    }
}
