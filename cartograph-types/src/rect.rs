use nalgebra::{Point2, Scalar};
use num_traits::{FromPrimitive, Num};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in the native coordinate space of a dataset.
///
/// Extents of geometries, layers and render frames are all expressed as a `Rect`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect<N = f64> {
    /// Minimum X coordinate.
    pub x_min: N,
    /// Minimum Y coordinate.
    pub y_min: N,
    /// Maximum X coordinate.
    pub x_max: N,
    /// Maximum Y coordinate.
    pub y_max: N,
}

impl<N: Num + Copy + PartialOrd + Scalar + FromPrimitive> Rect<N> {
    /// Creates a new rectangle. Coordinates are taken as given; use [`Rect::from_corners`]
    /// when the corner order is not known.
    pub fn new(x_min: N, y_min: N, x_max: N, y_max: N) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Creates a rectangle spanning two arbitrary corner points.
    pub fn from_corners(a: Point2<N>, b: Point2<N>) -> Self {
        let (x_min, x_max) = if a.x <= b.x { (a.x, b.x) } else { (b.x, a.x) };
        let (y_min, y_max) = if a.y <= b.y { (a.y, b.y) } else { (b.y, a.y) };
        Self::new(x_min, y_min, x_max, y_max)
    }

    /// Minimum X coordinate.
    pub fn x_min(&self) -> N {
        self.x_min
    }

    /// Maximum X coordinate.
    pub fn x_max(&self) -> N {
        self.x_max
    }

    /// Minimum Y coordinate.
    pub fn y_min(&self) -> N {
        self.y_min
    }

    /// Maximum Y coordinate.
    pub fn y_max(&self) -> N {
        self.y_max
    }

    /// Width of the rectangle.
    pub fn width(&self) -> N {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> N {
        self.y_max - self.y_min
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn merge(&self, other: Self) -> Self {
        Self {
            x_min: if self.x_min < other.x_min {
                self.x_min
            } else {
                other.x_min
            },
            y_min: if self.y_min < other.y_min {
                self.y_min
            } else {
                other.y_min
            },
            x_max: if self.x_max > other.x_max {
                self.x_max
            } else {
                other.x_max
            },
            y_max: if self.y_max > other.y_max {
                self.y_max
            } else {
                other.y_max
            },
        }
    }

    /// Union of all rectangles of the iterator. Returns `None` for an empty iterator.
    pub fn union_all(iter: impl IntoIterator<Item = Self>) -> Option<Self> {
        let mut iter = iter.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, |acc, rect| acc.merge(rect)))
    }

    /// Center point of the rectangle.
    pub fn center(&self) -> Point2<N> {
        let two = N::one() + N::one();
        Point2::new(
            (self.x_min + self.x_max) / two,
            (self.y_min + self.y_max) / two,
        )
    }
}

impl From<geo_types::Rect<f64>> for Rect<f64> {
    fn from(value: geo_types::Rect<f64>) -> Self {
        let min = value.min();
        let max = value.max();
        Self::new(min.x, min.y, max.x, max.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn merge_takes_componentwise_extremes() {
        let a = Rect::new(0.0, 5.0, 10.0, 6.0);
        let b = Rect::new(-1.0, 7.0, 3.0, 20.0);
        assert_eq!(a.merge(b), Rect::new(-1.0, 5.0, 10.0, 20.0));
        assert_eq!(b.merge(a), a.merge(b));
    }

    #[test]
    fn union_all_of_nothing_is_none() {
        assert!(Rect::<f64>::union_all(std::iter::empty()).is_none());
    }

    #[test]
    fn union_all_folds_every_rect() {
        let rects = [
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rect::new(2.0, -3.0, 2.5, 0.0),
            Rect::new(-4.0, 0.5, -3.0, 9.0),
        ];
        assert_eq!(
            Rect::union_all(rects),
            Some(Rect::new(-4.0, -3.0, 2.5, 9.0))
        );
    }

    #[test]
    fn from_corners_normalizes_order() {
        let rect = Rect::from_corners(Point2::new(5.0, -1.0), Point2::new(-5.0, 1.0));
        assert_eq!(rect, Rect::new(-5.0, -1.0, 5.0, 1.0));
        assert_relative_eq!(rect.width(), 10.0);
        assert_relative_eq!(rect.height(), 2.0);
    }

    #[test]
    fn center() {
        let center = Rect::new(0.0, 0.0, 4.0, 2.0).center();
        assert_relative_eq!(center.x, 2.0);
        assert_relative_eq!(center.y, 1.0);
    }
}
