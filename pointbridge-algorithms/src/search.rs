use anyhow::{bail, Result};
use kd_tree::{KdPoint, KdTree};
use pointbridge_core::containers::{PointCloud, PointXYZ};

/// How the neighbourhood of a point is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Neighborhood {
    /// The `k` nearest points, including the query point itself if it is part of the cloud
    KNearest(usize),
    /// All points within the given distance
    Radius(f32),
}

impl Neighborhood {
    /// Picks the neighbourhood from a pair of raw parameters where a non-positive value means 'unused'.
    /// Exactly one of the two parameters must be in use.
    ///
    /// ```
    /// # use pointbridge_algorithms::search::Neighborhood;
    /// assert_eq!(Neighborhood::from_parameters(8, 0.0).unwrap(), Neighborhood::KNearest(8));
    /// assert_eq!(Neighborhood::from_parameters(-1, 0.5).unwrap(), Neighborhood::Radius(0.5));
    /// assert!(Neighborhood::from_parameters(8, 0.5).is_err());
    /// assert!(Neighborhood::from_parameters(0, 0.0).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// If both or neither of the parameters are positive. A NaN radius counts as unused.
    pub fn from_parameters(k: i32, radius: f32) -> Result<Self> {
        let use_k = k > 0;
        let use_radius = radius > 0.0;
        match (use_k, use_radius) {
            (true, false) => Ok(Self::KNearest(k as usize)),
            (false, true) => Ok(Self::Radius(radius)),
            (true, true) => bail!(
                "Both k ({}) and radius ({}) are set, only one neighbourhood may be used",
                k,
                radius
            ),
            (false, false) => bail!(
                "Neither k ({}) nor radius ({}) is positive, no neighbourhood to search",
                k,
                radius
            ),
        }
    }
}

/// A neighbour found by a [`SearchIndex`] query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the neighbour in the cloud the index was built over
    pub index: usize,
    pub squared_distance: f32,
}

#[derive(Debug, Clone, Copy)]
struct IndexedPosition {
    position: [f32; 3],
    index: usize,
}

impl KdPoint for IndexedPosition {
    type Scalar = f32;
    type Dim = typenum::U3;
    fn at(&self, k: usize) -> f32 {
        self.position[k]
    }
}

/// k-d tree over the positions of a point cloud. Points with non-finite coordinates are left out of the tree,
/// so they are never returned as neighbours
pub struct SearchIndex {
    tree: KdTree<IndexedPosition>,
    source_len: usize,
}

impl SearchIndex {
    pub fn build(cloud: &PointCloud<PointXYZ>) -> Self {
        let items = cloud
            .iter()
            .enumerate()
            .filter(|(_, point)| point.is_finite())
            .map(|(index, point)| IndexedPosition {
                position: [point.x, point.y, point.z],
                index,
            })
            .collect::<Vec<_>>();
        log::trace!(
            "Building search index over {} of {} points",
            items.len(),
            cloud.len()
        );
        Self {
            tree: KdTree::build_by_ordered_float(items),
            source_len: cloud.len(),
        }
    }

    /// Number of points stored in the tree
    pub fn len(&self) -> usize {
        self.tree.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.items().is_empty()
    }

    /// Number of points in the cloud this index was built over, including the ones left out of the tree
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Returns the (up to) `k` nearest neighbours of `query`, closest first
    pub fn nearest_k(&self, query: &[f32; 3], k: usize) -> Vec<Neighbor> {
        if k == 0 || !query.iter().all(|c| c.is_finite()) {
            return vec![];
        }
        let mut neighbors = self
            .tree
            .nearests(query, k)
            .into_iter()
            .map(|found| Neighbor {
                index: found.item.index,
                squared_distance: found.squared_distance,
            })
            .collect::<Vec<_>>();
        sort_by_distance(&mut neighbors);
        neighbors
    }

    /// Returns all neighbours within `radius` of `query`, closest first
    pub fn within_radius(&self, query: &[f32; 3], radius: f32) -> Vec<Neighbor> {
        if radius.is_nan() || radius <= 0.0 || !query.iter().all(|c| c.is_finite()) {
            return vec![];
        }
        let mut neighbors = self
            .tree
            .within_radius(query, radius)
            .into_iter()
            .map(|found| Neighbor {
                index: found.index,
                squared_distance: squared_distance(&found.position, query),
            })
            .collect::<Vec<_>>();
        sort_by_distance(&mut neighbors);
        neighbors
    }

    pub fn search(&self, query: &[f32; 3], neighborhood: Neighborhood) -> Vec<Neighbor> {
        match neighborhood {
            Neighborhood::KNearest(k) => self.nearest_k(query, k),
            Neighborhood::Radius(radius) => self.within_radius(query, radius),
        }
    }
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter().zip(b.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
}

fn sort_by_distance(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        a.squared_distance
            .total_cmp(&b.squared_distance)
            .then(a.index.cmp(&b.index))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_cloud() -> PointCloud<PointXYZ> {
        (0..10)
            .map(|i| PointXYZ::new(i as f32, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn test_nearest_k_includes_query_point() {
        let cloud = line_cloud();
        let index = SearchIndex::build(&cloud);
        let neighbors = index.nearest_k(&[4.0, 0.0, 0.0], 3);
        assert_eq!(neighbors.len(), 3);
        assert_eq!(neighbors[0].index, 4);
        assert_eq!(neighbors[0].squared_distance, 0.0);
        let mut rest = vec![neighbors[1].index, neighbors[2].index];
        rest.sort();
        assert_eq!(rest, vec![3, 5]);
    }

    #[test]
    fn test_nearest_k_more_than_available() {
        let cloud = line_cloud();
        let index = SearchIndex::build(&cloud);
        assert_eq!(index.nearest_k(&[0.0, 0.0, 0.0], 50).len(), 10);
    }

    #[test]
    fn test_within_radius() {
        let cloud = line_cloud();
        let index = SearchIndex::build(&cloud);
        let neighbors = index.within_radius(&[4.0, 0.0, 0.0], 1.5);
        let indices = neighbors.iter().map(|n| n.index).collect::<Vec<_>>();
        assert_eq!(indices[0], 4);
        assert_eq!(indices.len(), 3);
        assert!(indices.contains(&3) && indices.contains(&5));
    }

    #[test]
    fn test_non_finite_points_are_not_indexed() {
        let mut cloud = line_cloud();
        cloud.push(PointXYZ::new(f32::NAN, 0.0, 0.0));
        let index = SearchIndex::build(&cloud);
        assert_eq!(index.len(), 10);
        assert_eq!(index.source_len(), 11);
        assert!(index.nearest_k(&[f32::NAN, 0.0, 0.0], 3).is_empty());
    }

    #[test]
    fn test_neighborhood_selection() {
        assert_eq!(
            Neighborhood::from_parameters(5, -1.0).unwrap(),
            Neighborhood::KNearest(5)
        );
        assert_eq!(
            Neighborhood::from_parameters(0, 2.0).unwrap(),
            Neighborhood::Radius(2.0)
        );
        assert!(Neighborhood::from_parameters(0, 0.0).is_err());
        assert!(Neighborhood::from_parameters(5, 2.0).is_err());
        assert!(Neighborhood::from_parameters(-1, -1.0).is_err());
        assert!(Neighborhood::from_parameters(0, f32::NAN).is_err());
    }
}
