use nalgebra::{ClosedSub, Point3, Scalar, Vector3};

/// 3D axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB<T: Scalar + PartialOrd> {
    min: Point3<T>,
    max: Point3<T>,
}

impl<T: Scalar + ClosedSub + PartialOrd + Copy> AABB<T> {
    /// Computes the smallest AABB that contains all of the given points. Returns `None` for an empty iterator
    /// ```
    /// # use pointbridge_core::math::AABB;
    /// # use nalgebra::Point3;
    /// let bounds = AABB::from_points([Point3::new(1.0, -1.0, 0.0), Point3::new(-1.0, 1.0, 2.0)]).unwrap();
    /// assert_eq!(*bounds.min(), Point3::new(-1.0, -1.0, 0.0));
    /// assert_eq!(*bounds.max(), Point3::new(1.0, 1.0, 2.0));
    /// ```
    pub fn from_points<I: IntoIterator<Item = Point3<T>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let initial = Self {
            min: first,
            max: first,
        };
        Some(iter.fold(initial, |bounds, point| bounds.extend_with_point(&point)))
    }

    pub fn min(&self) -> &Point3<T> {
        &self.min
    }

    pub fn max(&self) -> &Point3<T> {
        &self.max
    }

    /// Returns the size between the minimum and maximum position of this AABB
    pub fn extent(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Returns a copy of this AABB, grown so that it contains `point`
    pub fn extend_with_point(&self, point: &Point3<T>) -> Self {
        let pick_min = |a: T, b: T| if a < b { a } else { b };
        let pick_max = |a: T, b: T| if a > b { a } else { b };
        Self {
            min: Point3::new(
                pick_min(self.min.x, point.x),
                pick_min(self.min.y, point.y),
                pick_min(self.min.z, point.z),
            ),
            max: Point3::new(
                pick_max(self.max.x, point.x),
                pick_max(self.max.y, point.y),
                pick_max(self.max.z, point.z),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_empty() {
        assert!(AABB::<f64>::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_extent_and_growth() {
        let single = AABB::from_points([Point3::new(1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(single.extent(), Vector3::zeros());

        let grown = single
            .extend_with_point(&Point3::new(-1.0, 5.0, 3.0))
            .extend_with_point(&Point3::new(0.0, 0.0, 4.0));
        assert_eq!(*grown.min(), Point3::new(-1.0, 0.0, 3.0));
        assert_eq!(*grown.max(), Point3::new(1.0, 5.0, 4.0));
        assert_eq!(grown.extent(), Vector3::new(2.0, 5.0, 1.0));
    }
}
