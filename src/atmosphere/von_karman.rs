use rustfft::{num_complex::Complex64, FftDirection};
use std::f64::consts::PI;

use crate::{fft, RandomStream};

/// Von Karman phase screen generator
///
/// Periodic screens of `n_px x n_px` samples spaced by `scale` meters,
/// in nanometers of optical path difference.
#[derive(Debug, Clone, PartialEq)]
pub struct VonKarman {
    n_px: usize,
    /// Square root of the phase PSD scaled to the FFT normalization, in nm
    psi: Vec<f64>,
}
impl VonKarman {
    /// Creates a generator for the Fried parameter `r0_500` (m) at 500nm and the outer scale `l0` (m)
    ///
    /// An infinite outer scale gives a Kolmogorov screen.
    pub fn new(n_px: usize, scale: f64, r0_500: f64, l0: f64) -> Self {
        let length = n_px as f64 * scale;
        let l0_inv2 = if l0.is_finite() { 1. / (l0 * l0) } else { 0. };
        let freq = |k: usize| {
            let k = if k < n_px.div_ceil(2) {
                k as f64
            } else {
                k as f64 - n_px as f64
            };
            k / length
        };
        // phase PSD at 500nm: 0.023 r0^-5/3 (f^2+1/L0^2)^-11/6 rad^2.m^2
        let c = (n_px as f64 / length) * 0.023f64.sqrt() * r0_500.powf(-5. / 6.) * 500.
            / (2. * PI);
        let psi = (0..n_px * n_px)
            .map(|k| {
                if k == 0 {
                    return 0.;
                }
                let (fy, fx) = (freq(k / n_px), freq(k % n_px));
                c * (fx * fx + fy * fy + l0_inv2).powf(-11. / 12.)
            })
            .collect();
        Self { n_px, psi }
    }
    pub fn n_px(&self) -> usize {
        self.n_px
    }
    /// Draws a new screen realization
    pub fn realization(&self, rng: &mut RandomStream) -> Vec<f64> {
        let n = self.n_px;
        let mut noise: Vec<Complex64> = (0..n * n)
            .map(|_| Complex64::new(rng.gaussian(), 0.))
            .collect();
        fft::fft2(&mut noise, n, FftDirection::Forward);
        noise.iter_mut().zip(&self.psi).for_each(|(w, p)| *w *= p);
        fft::fft2(&mut noise, n, FftDirection::Inverse);
        let norm = 1. / (n * n) as f64;
        noise.into_iter().map(|w| w.re * norm).collect()
    }
}
