//! Temporally correlated Zernike coefficients
//!
//! The time series of each Zernike mode is a Gaussian random field with a Gaussian
//! auto-correlation, synthesized by shaping white noise in the Fourier domain.

use nalgebra::DMatrix;
use rustfft::{num_complex::Complex64, FftDirection};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::{fft, RandomStream};

#[derive(Debug, thiserror::Error)]
pub enum AberrationsError {
    #[error("the number of frames must be at least 1")]
    NoFrame,
    #[error("the largest Zernike mode must be at least 1 (piston), found {0}")]
    Jmax(usize),
    #[error("the correlation length must be positive, found {0}")]
    CorrelationLength(f64),
    #[error("the aberration amplitude must be positive or zero, found {0}")]
    Amplitude(f64),
}

/// Correlated aberrations generator
///
/// Default properties:
///  * n     : 100 frames
///  * jmax  : 15
///  * ell   : 4 frames
///  * sigma : 0.05 wave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedFieldGenerator {
    pub n: usize,
    pub jmax: usize,
    pub ell: f64,
    pub sigma: f64,
}
impl Default for CorrelatedFieldGenerator {
    fn default() -> Self {
        Self {
            n: 100,
            jmax: 15,
            ell: 4.,
            sigma: 0.05,
        }
    }
}
impl CorrelatedFieldGenerator {
    /// Set the number of frames
    pub fn n(self, n: usize) -> Self {
        Self { n, ..self }
    }
    /// Set the largest Zernike mode (Noll index)
    pub fn jmax(self, jmax: usize) -> Self {
        Self { jmax, ..self }
    }
    /// Set the correlation length in frames
    pub fn ell(self, ell: f64) -> Self {
        Self { ell, ..self }
    }
    /// Set the RMS amplitude of the coefficients in wave
    pub fn sigma(self, sigma: f64) -> Self {
        Self { sigma, ..self }
    }
    /// Number of modes from tip (j=2) to `jmax`
    pub fn n_mode(&self) -> usize {
        self.jmax.saturating_sub(1)
    }
    /// Checks the generator parameters
    pub fn validate(&self) -> Result<(), AberrationsError> {
        if self.n == 0 {
            return Err(AberrationsError::NoFrame);
        }
        if self.jmax < 1 {
            return Err(AberrationsError::Jmax(self.jmax));
        }
        if !(self.ell > 0.) {
            return Err(AberrationsError::CorrelationLength(self.ell));
        }
        if !(self.sigma >= 0.) {
            return Err(AberrationsError::Amplitude(self.sigma));
        }
        Ok(())
    }
    /// Amplitude spectrum `sqrt(2 pk)` of the Gaussian auto-correlation kernel
    fn amplitude_spectrum(&self) -> Vec<f64> {
        let n = self.n;
        let h = n / 2;
        let corr: Vec<f64> = (0..n)
            .map(|k| {
                let t = k as f64 - n as f64 / 2.;
                (-0.5 * t * t / (self.ell * self.ell)).exp()
            })
            .collect();
        let mut pk: Vec<Complex64> = (0..n)
            .map(|k| Complex64::new(corr[(k + n - h) % n], 0.))
            .collect();
        fft::fft(&mut pk, FftDirection::Forward);
        pk.into_iter().map(|p| (2. * p.re.max(0.)).sqrt()).collect()
    }
    /// Generates the `n x (jmax-1)` coefficients
    pub fn generate(&self, rng: &mut RandomStream) -> Result<AberrationTrajectory, AberrationsError> {
        self.validate()?;
        let n = self.n;
        let n_mode = self.n_mode();
        let ak = self.amplitude_spectrum();
        let mut coefs = DMatrix::<f64>::zeros(n, n_mode);
        for mut column in coefs.column_iter_mut() {
            let mut zk: Vec<Complex64> = ak
                .iter()
                .map(|a| Complex64::from_polar(*a, 2. * PI * rng.uniform()))
                .collect();
            fft::ifft(&mut zk);
            column
                .iter_mut()
                .zip(zk)
                .for_each(|(c, z)| *c = 0.5 * n as f64 * z.re);
        }
        if n_mode > 0 {
            let measured_std = coefs
                .column_iter()
                .map(|c| c.variance().sqrt())
                .sum::<f64>()
                / n_mode as f64;
            if measured_std > 0. {
                coefs *= self.sigma / measured_std;
            } else {
                log::warn!("degenerate aberration time series (n={n}), coefficients set to 0");
            }
            for mut column in coefs.column_iter_mut() {
                let mean = column.mean();
                column.add_scalar_mut(-mean);
            }
        }
        log::info!(
            "Generated {} frames of {} correlated Zernike coefficients (ell={:.1} frames, sigma={:.3} wave)",
            n,
            n_mode,
            self.ell,
            self.sigma
        );
        Ok(AberrationTrajectory {
            jmax: self.jmax,
            coefficients: coefs,
        })
    }
}

/// Zernike coefficients time series
///
/// One row per frame, one column per mode from tip (j=2) to `jmax`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AberrationTrajectory {
    jmax: usize,
    coefficients: DMatrix<f64>,
}
impl AberrationTrajectory {
    /// Number of frames
    pub fn n_frame(&self) -> usize {
        self.coefficients.nrows()
    }
    /// Number of modes
    pub fn n_mode(&self) -> usize {
        self.coefficients.ncols()
    }
    pub fn jmax(&self) -> usize {
        self.jmax
    }
    /// Coefficients of frame `i`
    pub fn frame(&self, i: usize) -> Vec<f64> {
        self.coefficients.row(i).iter().cloned().collect()
    }
    /// Iterator over the frame coefficients
    pub fn frames(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.n_frame()).map(|i| self.frame(i))
    }
    /// Time series of mode `j` (Noll index), `None` outside `2..=jmax`
    pub fn mode(&self, j: usize) -> Option<Vec<f64>> {
        let k = j.checked_sub(2).filter(|k| *k < self.n_mode())?;
        Some(self.coefficients.column(k).iter().cloned().collect())
    }
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.coefficients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_std(x: &[f64]) -> (f64, f64) {
        let n = x.len() as f64;
        let m = x.iter().sum::<f64>() / n;
        let v = x.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / n;
        (m, v.sqrt())
    }

    #[test]
    fn deterministic() {
        let gen = CorrelatedFieldGenerator::default();
        let a = gen.generate(&mut RandomStream::new(5)).unwrap();
        let b = gen.generate(&mut RandomStream::new(5)).unwrap();
        assert_eq!(a, b);
        let c = gen.generate(&mut RandomStream::new(6)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn zero_mean_and_rms() {
        let gen = CorrelatedFieldGenerator::default().n(64).jmax(11).sigma(0.1);
        let ab = gen.generate(&mut RandomStream::new(1)).unwrap();
        assert_eq!(ab.n_frame(), 64);
        assert_eq!(ab.n_mode(), 10);
        let stds: Vec<f64> = (2..=11)
            .map(|j| {
                let (m, s) = mean_std(&ab.mode(j).unwrap());
                assert!(m.abs() < 1e-12, "Z{j} mean: {m}");
                s
            })
            .collect();
        let mean_std = stds.iter().sum::<f64>() / stds.len() as f64;
        assert!((mean_std - 0.1).abs() < 1e-12);
    }

    #[test]
    fn scenario() {
        let gen = CorrelatedFieldGenerator::default()
            .n(10)
            .jmax(3)
            .ell(4.)
            .sigma(0.05);
        let ab = gen.generate(&mut RandomStream::new(1)).unwrap();
        assert_eq!(ab.n_frame(), 10);
        assert!(ab.frames().all(|f| f.len() == 2));
        let (m2, s2) = mean_std(&ab.mode(2).unwrap());
        let (m3, s3) = mean_std(&ab.mode(3).unwrap());
        assert!(m2.abs() < 1e-12 && m3.abs() < 1e-12);
        assert!((0.5 * (s2 + s3) - 0.05).abs() < 1e-12);
        for j in [0, 1, 4] {
            assert!(ab.mode(j).is_none(), "Z{j}");
        }
    }

    #[test]
    fn temporal_correlation() {
        // neighbour frames are much more alike than frames far apart
        let gen = CorrelatedFieldGenerator::default().n(512).jmax(21).ell(8.);
        let ab = gen.generate(&mut RandomStream::new(3)).unwrap();
        let autocorr = |lag: usize| {
            (2..=21)
                .map(|j| {
                    let x = ab.mode(j).unwrap();
                    (0..x.len())
                        .map(|i| x[i] * x[(i + lag) % x.len()])
                        .sum::<f64>()
                })
                .sum::<f64>()
        };
        let c0 = autocorr(0);
        assert!(autocorr(1) / c0 > 0.9);
        assert!(autocorr(64).abs() / c0 < 0.3);
    }

    #[test]
    fn piston_only() {
        let gen = CorrelatedFieldGenerator::default().jmax(1);
        let ab = gen.generate(&mut RandomStream::new(1)).unwrap();
        assert_eq!(ab.n_mode(), 0);
        assert!(ab.frames().all(|f| f.is_empty()));
        assert!(ab.mode(1).is_none() && ab.mode(2).is_none());
    }

    #[test]
    fn invalid_parameters() {
        let mut rng = RandomStream::new(1);
        assert!(CorrelatedFieldGenerator::default()
            .jmax(0)
            .generate(&mut rng)
            .is_err());
        assert!(CorrelatedFieldGenerator::default()
            .n(0)
            .generate(&mut rng)
            .is_err());
        assert!(CorrelatedFieldGenerator::default()
            .ell(0.)
            .generate(&mut rng)
            .is_err());
        assert!(CorrelatedFieldGenerator::default()
            .sigma(-1.)
            .generate(&mut rng)
            .is_err());
    }
}
