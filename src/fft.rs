//! Fourier transform helpers on top of [rustfft]
//!
//! 2D arrays are square, row-major `n x n` slices.

use rayon::prelude::*;
use rustfft::{num_complex::Complex64, FftDirection, FftPlanner};

/// Smallest integer `>= n` that factors into powers of 2, 3 and 5
pub fn good_fft_size(n: usize) -> usize {
    let mut m = n.max(2);
    loop {
        let mut k = m;
        for p in [2, 3, 5] {
            while k % p == 0 {
                k /= p;
            }
        }
        if k == 1 {
            return m;
        }
        m += 1;
    }
}

/// 1D in-place transform, unnormalized
pub fn fft(data: &mut [Complex64], direction: FftDirection) {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft(data.len(), direction);
    fft.process(data);
}

/// 1D inverse transform normalized by `1/n`
pub fn ifft(data: &mut [Complex64]) {
    fft(data, FftDirection::Inverse);
    let n = data.len() as f64;
    data.iter_mut().for_each(|x| *x /= n);
}

fn transpose(data: &mut [Complex64], n: usize) {
    for i in 0..n {
        for j in i + 1..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}

/// 2D in-place transform of a `n x n` array, unnormalized
pub fn fft2(data: &mut [Complex64], n: usize, direction: FftDirection) {
    assert_eq!(data.len(), n * n, "fft2 expects a {n}x{n} array");
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft(n, direction);
    data.par_chunks_mut(n).for_each(|row| fft.process(row));
    transpose(data, n);
    data.par_chunks_mut(n).for_each(|row| fft.process(row));
    transpose(data, n);
}

/// Moves the zero frequency of a `n x n` array to `(n/2,n/2)`
pub fn fftshift2<T: Copy>(data: &[T], n: usize) -> Vec<T> {
    let h = n / 2;
    (0..n * n)
        .map(|k| {
            let (i, j) = (k / n, k % n);
            data[((i + n - h) % n) * n + (j + n - h) % n]
        })
        .collect()
}
