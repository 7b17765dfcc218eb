use std::ops::Index;

use anyhow::{bail, Result};

use super::PointXYZ;

/// An ordered sequence of point records. A `PointCloud` is either unorganized (`height == 1`, `width == len`)
/// or organized into a `width * height` grid, as produced by depth sensors. Pushing a point into an organized
/// cloud turns it back into an unorganized one
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud<P> {
    points: Vec<P>,
    width: usize,
    height: usize,
}

impl<P> PointCloud<P> {
    /// Creates a new empty, unorganized `PointCloud`
    pub fn new() -> Self {
        Self {
            points: vec![],
            width: 0,
            height: 1,
        }
    }

    /// Creates a new empty `PointCloud` with room for `capacity` points
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            width: 0,
            height: 1,
        }
    }

    /// Creates an unorganized `PointCloud` that takes ownership of the given `points`
    pub fn from_points(points: Vec<P>) -> Self {
        let width = points.len();
        Self {
            points,
            width,
            height: 1,
        }
    }

    pub fn push(&mut self, point: P) {
        self.points.push(point);
        self.width = self.points.len();
        self.height = 1;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&P> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[P] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [P] {
        &mut self.points
    }

    pub fn into_points(self) -> Vec<P> {
        self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.points.iter()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns true if this cloud is arranged as a 2D grid with more than one row
    pub fn is_organized(&self) -> bool {
        self.height > 1
    }

    /// Arranges the points of this cloud into a grid of `width` columns and `height` rows.
    ///
    /// # Errors
    ///
    /// If `width * height` does not equal the number of points in this cloud
    pub fn organize(&mut self, width: usize, height: usize) -> Result<()> {
        if width.checked_mul(height) != Some(self.points.len()) {
            bail!(
                "Can't organize {} points into a {}x{} grid",
                self.points.len(),
                width,
                height
            );
        }
        self.width = width;
        self.height = height;
        Ok(())
    }
}

impl PointCloud<PointXYZ> {
    /// Returns true if every point in this cloud has finite coordinates
    pub fn is_dense(&self) -> bool {
        self.points.iter().all(PointXYZ::is_finite)
    }

    /// Iterates over the positions of all points as `[f32; 3]` arrays
    pub fn positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.points.iter().map(|p| [p.x, p.y, p.z])
    }
}

impl<P> Default for PointCloud<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Index<usize> for PointCloud<P> {
    type Output = P;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<P> FromIterator<P> for PointCloud<P> {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

impl<P> Extend<P> for PointCloud<P> {
    fn extend<T: IntoIterator<Item = P>>(&mut self, iter: T) {
        self.points.extend(iter);
        self.width = self.points.len();
        self.height = 1;
    }
}

impl<'a, P> IntoIterator for &'a PointCloud<P> {
    type Item = &'a P;
    type IntoIter = std::slice::Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<P> IntoIterator for PointCloud<P> {
    type Item = P;
    type IntoIter = std::vec::IntoIter<P>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}
