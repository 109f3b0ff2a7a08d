use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::BitAnd};

/// Integer image bounds
///
/// The rectangle `[xmin,xmax] x [ymin,ymax]`, inclusive.
/// The default bounds are undefined; including a point in undefined bounds
/// makes the bounds of that single point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    xmin: i32,
    xmax: i32,
    ymin: i32,
    ymax: i32,
    defined: bool,
}
impl Bounds {
    /// Creates new bounds, undefined if `xmin>xmax` or `ymin>ymax`
    pub fn new(xmin: i32, xmax: i32, ymin: i32, ymax: i32) -> Self {
        let defined = xmin <= xmax && ymin <= ymax;
        if defined {
            Self {
                xmin,
                xmax,
                ymin,
                ymax,
                defined,
            }
        } else {
            Default::default()
        }
    }
    /// Bounds `[1,nx] x [1,ny]` of a `nx x ny` image
    pub fn from_shape(nx: usize, ny: usize) -> Self {
        Self::new(1, nx as i32, 1, ny as i32)
    }
    pub fn is_defined(&self) -> bool {
        self.defined
    }
    pub fn xmin(&self) -> i32 {
        self.xmin
    }
    pub fn xmax(&self) -> i32 {
        self.xmax
    }
    pub fn ymin(&self) -> i32 {
        self.ymin
    }
    pub fn ymax(&self) -> i32 {
        self.ymax
    }
    /// Number of pixels
    pub fn area(&self) -> usize {
        if self.defined {
            ((self.xmax - self.xmin + 1) * (self.ymax - self.ymin + 1)) as usize
        } else {
            0
        }
    }
    /// Number of rows and columns
    pub fn shape(&self) -> (usize, usize) {
        if self.defined {
            (
                (self.ymax - self.ymin + 1) as usize,
                (self.xmax - self.xmin + 1) as usize,
            )
        } else {
            (0, 0)
        }
    }
    /// Center of the bounds
    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.xmin + self.xmax) as f64,
            0.5 * (self.ymin + self.ymax) as f64,
        )
    }
    pub fn includes(&self, x: i32, y: i32) -> bool {
        self.defined && (self.xmin..=self.xmax).contains(&x) && (self.ymin..=self.ymax).contains(&y)
    }
    /// Grows the bounds to include the point `(x,y)`
    pub fn include(&mut self, x: i32, y: i32) -> &mut Self {
        *self = if self.defined {
            Self::new(
                self.xmin.min(x),
                self.xmax.max(x),
                self.ymin.min(y),
                self.ymax.max(y),
            )
        } else {
            Self::new(x, x, y, y)
        };
        self
    }
    pub fn shift(&self, dx: i32, dy: i32) -> Self {
        if self.defined {
            Self::new(
                self.xmin + dx,
                self.xmax + dx,
                self.ymin + dy,
                self.ymax + dy,
            )
        } else {
            *self
        }
    }
    pub fn with_border(&self, width: i32) -> Self {
        if self.defined {
            Self::new(
                self.xmin - width,
                self.xmax + width,
                self.ymin - width,
                self.ymax + width,
            )
        } else {
            *self
        }
    }
}
impl BitAnd for Bounds {
    type Output = Bounds;
    /// Intersection
    fn bitand(self, rhs: Self) -> Self::Output {
        if self.defined && rhs.defined {
            Bounds::new(
                self.xmin.max(rhs.xmin),
                self.xmax.min(rhs.xmax),
                self.ymin.max(rhs.ymin),
                self.ymax.min(rhs.ymax),
            )
        } else {
            Default::default()
        }
    }
}
impl Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.defined {
            write!(
                f,
                "Bounds({},{},{},{})",
                self.xmin, self.xmax, self.ymin, self.ymax
            )
        } else {
            write!(f, "Bounds(undefined)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn intersection() {
        let a = Bounds::new(1, 32, 1, 32);
        let b = Bounds::new(20, 40, -5, 10);
        assert_eq!(a & b, Bounds::new(20, 32, 1, 10));
        assert!(!(a & Bounds::new(40, 50, 1, 10)).is_defined());
        assert!(!(a & Bounds::default()).is_defined());
    }

    #[test]
    fn include_points() {
        let mut b = Bounds::default();
        assert_eq!(b.area(), 0);
        b.include(3, 4);
        assert_eq!(b, Bounds::new(3, 3, 4, 4));
        b.include(-1, 10).include(5, 5);
        assert_eq!(b, Bounds::new(-1, 5, 4, 10));
        assert_eq!(b.shape(), (7, 7));
        assert!(b.includes(0, 9));
        assert!(!b.includes(6, 9));
    }

    #[test]
    fn value_semantics() {
        let a = Bounds::from_shape(64, 32);
        assert_eq!(a.to_string(), "Bounds(1,64,1,32)");
        assert_eq!(Bounds::new(2, 1, 0, 0).to_string(), "Bounds(undefined)");
        assert_eq!(a.shape(), (32, 64));
        assert_eq!(a.area(), 2048);
        assert_eq!(a.shift(1, -1), Bounds::new(2, 65, 0, 31));
        assert_eq!(a.with_border(2), Bounds::new(-1, 66, -1, 34));
        assert_eq!(a.center(), (32.5, 16.5));
        let set: HashSet<Bounds> = [a, Bounds::from_shape(64, 32), Bounds::default()]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }
}
