//! Zernike polynomials in the Noll ordering
//!
//! The polynomials are normalized to a unit variance over the unit disk.
//! Over an annulus, the annular polynomials are the Gram-Schmidt orthonormalization
//! of the circular ones in the Noll order.

use nalgebra::{DMatrix, DVector};
use std::f64::consts::SQRT_2;

/// Converts the Noll index `j` (starting at 1 for piston) into the radial order `n`
/// and the signed azimuthal frequency `m` (cosine terms for `m>0`, sine terms for `m<0`)
pub fn noll_to_zern(j: usize) -> (usize, i32) {
    assert!(j > 0, "Noll indices start at 1");
    let mut n = 0;
    let mut k = j - 1;
    while k > n {
        n += 1;
        k -= n;
    }
    let m = (n % 2 + 2 * ((k + (n + 1) % 2) / 2)) as i32;
    if j % 2 == 0 {
        (n, m)
    } else {
        (n, -m)
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|x| x as f64).product()
}

/// Radial polynomial coefficients `[(c_k,p_k)]` with `R_n^m(r) = Σ c_k r^p_k`
fn radial_coefficients(n: usize, m: usize) -> Vec<(f64, i32)> {
    (0..=(n - m) / 2)
        .map(|k| {
            let sign = if k % 2 == 0 { 1. } else { -1. };
            let c = sign * factorial(n - k)
                / (factorial(k) * factorial((n + m) / 2 - k) * factorial((n - m) / 2 - k));
            (c, (n - 2 * k) as i32)
        })
        .collect()
}

/// Zernike polynomial of a given Noll index
#[derive(Debug, Clone, PartialEq)]
pub struct Zernike {
    j: usize,
    m: i32,
    norm: f64,
    radial: Vec<(f64, i32)>,
}
impl Zernike {
    /// Creates the polynomial of Noll index `j`
    pub fn new(j: usize) -> Self {
        let (n, m) = noll_to_zern(j);
        let norm = if m == 0 {
            ((n + 1) as f64).sqrt()
        } else {
            SQRT_2 * ((n + 1) as f64).sqrt()
        };
        Self {
            j,
            m,
            norm,
            radial: radial_coefficients(n, m.unsigned_abs() as usize),
        }
    }
    /// Noll index
    pub fn noll(&self) -> usize {
        self.j
    }
    /// Value at the polar coordinates `(r,o)` of the unit disk
    pub fn polar(&self, r: f64, o: f64) -> f64 {
        let radial: f64 = self.radial.iter().map(|(c, p)| c * r.powi(*p)).sum();
        let azimuthal = match self.m {
            0 => 1.,
            m if m > 0 => (m as f64 * o).cos(),
            m => (-m as f64 * o).sin(),
        };
        self.norm * radial * azimuthal
    }
    /// Value at the cartesian coordinates `(x,y)` of the unit disk
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        self.polar(x.hypot(y), y.atan2(x))
    }
    /// Integral of the product with `other` over the annulus `eps<=r<=1`, divided by π
    fn annular_product(&self, other: &Zernike, eps: f64) -> f64 {
        if self.m != other.m {
            return 0.;
        }
        let azimuthal = if self.m == 0 { 2. } else { 1. };
        let radial: f64 = self
            .radial
            .iter()
            .flat_map(|(a, p)| {
                other.radial.iter().map(move |(b, q)| {
                    let k = p + q + 2;
                    a * b * (1. - eps.powi(k)) / k as f64
                })
            })
            .sum();
        self.norm * other.norm * azimuthal * radial
    }
}

/// Gram matrix `<Z_i Z_j>` of the modes `1..=jmax` averaged over the annulus `eps<=r<=1`
pub fn annular_gram(jmax: usize, eps: f64) -> DMatrix<f64> {
    let modes: Vec<Zernike> = (1..=jmax).map(Zernike::new).collect();
    let area = 1. - eps * eps;
    DMatrix::from_fn(jmax, jmax, |i, j| {
        modes[i].annular_product(&modes[j], eps) / area
    })
}

/// Coefficients of the circular modes `1..=jmax` equivalent to the coefficients
/// of the annular modes `2..=jmax` over the annulus `eps<=r<=1`
///
/// Returns `None` if the modes cannot be orthonormalized over the annulus.
pub fn annular_to_circular(coefficients: &[f64], eps: f64) -> Option<Vec<f64>> {
    let jmax = coefficients.len() + 1;
    let cholesky = annular_gram(jmax, eps).cholesky()?;
    let annular = DVector::from_iterator(
        jmax,
        std::iter::once(0.).chain(coefficients.iter().cloned()),
    );
    cholesky
        .l()
        .transpose()
        .solve_upper_triangular(&annular)
        .map(|c| c.iter().cloned().collect())
}

/// Sum of Zernike polynomials
#[derive(Debug, Clone, PartialEq)]
pub struct ZernikeSeries {
    modes: Vec<(Zernike, f64)>,
}
impl ZernikeSeries {
    /// Creates a series from the coefficients of the Noll modes `j0, j0+1, ...`
    ///
    /// Modes with a zero coefficient are skipped.
    pub fn new(j0: usize, coefficients: &[f64]) -> Self {
        Self {
            modes: coefficients
                .iter()
                .enumerate()
                .filter(|(_, c)| **c != 0.)
                .map(|(i, c)| (Zernike::new(j0 + i), *c))
                .collect(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
    /// Value at the cartesian coordinates `(x,y)` of the unit disk
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        if self.modes.is_empty() {
            return 0.;
        }
        let (r, o) = (x.hypot(y), y.atan2(x));
        self.modes.iter().map(|(z, c)| c * z.polar(r, o)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noll_indices() {
        let expected = [
            (0, 0),
            (1, 1),
            (1, -1),
            (2, 0),
            (2, -2),
            (2, 2),
            (3, -1),
            (3, 1),
            (3, -3),
            (3, 3),
            (4, 0),
        ];
        for (j, nm) in expected.iter().enumerate() {
            assert_eq!(noll_to_zern(j + 1), *nm, "Noll index {}", j + 1);
        }
    }

    #[test]
    fn defocus() {
        let z = Zernike::new(4);
        assert!((z.eval(0., 0.) + 3f64.sqrt()).abs() < 1e-12);
        assert!((z.eval(1., 0.) - 3f64.sqrt()).abs() < 1e-12);
        assert!((z.eval(0., 1.) - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn unit_variance() {
        let n = 401;
        let d = 2. / (n - 1) as f64;
        for j in 2..=11 {
            let z = Zernike::new(j);
            let (mut s, mut s2, mut count) = (0., 0., 0.);
            for i in 0..n {
                for k in 0..n {
                    let (x, y) = (-1. + i as f64 * d, -1. + k as f64 * d);
                    if x.hypot(y) <= 1. {
                        let v = z.eval(x, y);
                        s += v;
                        s2 += v * v;
                        count += 1.;
                    }
                }
            }
            let mean = s / count;
            let var = s2 / count - mean * mean;
            assert!(mean.abs() < 1e-2, "Z{j} mean: {mean}");
            assert!((var - 1.).abs() < 2e-2, "Z{j} variance: {var}");
        }
    }

    #[test]
    fn full_disk_gram() {
        let gram = annular_gram(11, 0.);
        assert!((gram - DMatrix::<f64>::identity(11, 11)).amax() < 1e-12);
        let c = annular_to_circular(&[0.1, -0.2, 0.3], 0.).unwrap();
        assert!(c[0].abs() < 1e-12);
        assert!(c[1..]
            .iter()
            .zip([0.1, -0.2, 0.3])
            .all(|(c, a)| (c - a).abs() < 1e-12));
    }

    #[test]
    fn annular_orthonormality() {
        let eps = 0.4;
        let jmax = 11;
        let n = 401;
        let d = 2. / (n - 1) as f64;
        let points: Vec<(f64, f64)> = (0..n * n)
            .map(|k| (-1. + (k / n) as f64 * d, -1. + (k % n) as f64 * d))
            .filter(|(x, y)| (eps..=1.).contains(&x.hypot(*y)))
            .collect();
        let count = points.len() as f64;
        let modes: Vec<ZernikeSeries> = (2..=jmax)
            .map(|j| {
                let mut a = vec![0.; jmax - 1];
                a[j - 2] = 1.;
                ZernikeSeries::new(1, &annular_to_circular(&a, eps).unwrap())
            })
            .collect();
        for (i, zi) in modes.iter().enumerate() {
            let mean = points.iter().map(|(x, y)| zi.eval(*x, *y)).sum::<f64>() / count;
            assert!(mean.abs() < 2e-2, "Z{} mean: {mean}", i + 2);
            for (j, zj) in modes.iter().enumerate().skip(i) {
                let p = points
                    .iter()
                    .map(|(x, y)| zi.eval(*x, *y) * zj.eval(*x, *y))
                    .sum::<f64>()
                    / count;
                let expected = if i == j { 1. } else { 0. };
                assert!((p - expected).abs() < 3e-2, "<Z{} Z{}> = {p}", i + 2, j + 2);
            }
        }
    }

    #[test]
    fn series_skips_zeros() {
        let s = ZernikeSeries::new(2, &[0., 0., 1.]);
        assert_eq!(s.modes.len(), 1);
        assert!((s.eval(1., 0.) - Zernike::new(4).eval(1., 0.)).abs() < 1e-12);
        assert!(ZernikeSeries::new(2, &[]).is_empty());
    }
}
