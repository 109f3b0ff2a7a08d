/// Linear interpolation table
///
/// Values outside the range of the calibration points are clamped to the end points.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LookupTable {
    x: Vec<f64>,
    f: Vec<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupTableError {
    #[error("lookup table abscissa and ordinate lengths differ ({0} vs {1})")]
    Length(usize, usize),
    #[error("lookup table is empty")]
    Empty,
    #[error("lookup table abscissa must be strictly increasing")]
    NotSorted,
}

impl LookupTable {
    /// Creates a new table from the calibration points `(x,f)`
    pub fn new(x: Vec<f64>, f: Vec<f64>) -> Result<Self, LookupTableError> {
        if x.len() != f.len() {
            return Err(LookupTableError::Length(x.len(), f.len()));
        }
        if x.is_empty() {
            return Err(LookupTableError::Empty);
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(LookupTableError::NotSorted);
        }
        Ok(Self { x, f })
    }
    /// Smallest abscissa
    pub fn x_min(&self) -> f64 {
        self.x[0]
    }
    /// Largest abscissa
    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }
    /// Interpolated value at `x`
    pub fn interpolate(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.f[0];
        }
        if x >= self.x[n - 1] {
            return self.f[n - 1];
        }
        // first calibration point strictly above x
        let i = self.x.partition_point(|&xi| xi <= x);
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (f0, f1) = (self.f[i - 1], self.f[i]);
        f0 + (f1 - f0) * (x - x0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation() {
        let table = LookupTable::new(vec![0., 1., 3.], vec![1., 3., -1.]).unwrap();
        assert_eq!(table.interpolate(0.), 1.);
        assert_eq!(table.interpolate(1.), 3.);
        assert!((table.interpolate(0.5) - 2.).abs() < 1e-12);
        assert!((table.interpolate(2.) - 1.).abs() < 1e-12);
        assert_eq!(table.interpolate(-1.), 1.);
        assert_eq!(table.interpolate(10.), -1.);
    }

    #[test]
    fn invalid_tables() {
        assert!(LookupTable::new(vec![0., 1.], vec![1.]).is_err());
        assert!(LookupTable::new(vec![], vec![]).is_err());
        assert!(LookupTable::new(vec![1., 0.], vec![1., 2.]).is_err());
    }
}
