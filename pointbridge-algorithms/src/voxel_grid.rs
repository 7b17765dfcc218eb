use pointbridge_core::{
    containers::{PointCloud, PointXYZ},
    nalgebra::Vector3,
};

use crate::bounds::calculate_bounds;

/// A voxel-grid downsampling filter. All finite points that fall into the same cell of a regular grid are
/// replaced by their centroid. The grid is anchored at the origin, so cell `(i, j, k)` spans
/// `[i * leaf_x, (i + 1) * leaf_x)` on the x axis and likewise for y and z.
///
/// The output holds one point per occupied cell, ordered by cell with x varying fastest, then y, then z.
/// Points with non-finite coordinates are dropped.
///
/// Leaf sizes that are not positive and finite, or that are so small that the cell indices of the cloud would
/// not fit into an `i32`, disable the filter: the input cloud is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelGrid {
    leaf_size: Vector3<f64>,
    min_points_per_voxel: usize,
}

impl VoxelGrid {
    /// Creates a `VoxelGrid` with cubic cells of the given size
    pub fn new(leaf_size: f64) -> Self {
        Self::with_leaf_sizes(leaf_size, leaf_size, leaf_size)
    }

    pub fn with_leaf_sizes(leaf_size_x: f64, leaf_size_y: f64, leaf_size_z: f64) -> Self {
        Self {
            leaf_size: Vector3::new(leaf_size_x, leaf_size_y, leaf_size_z),
            min_points_per_voxel: 0,
        }
    }

    /// Cells with fewer points than `min_points` produce no output point
    pub fn with_min_points_per_voxel(mut self, min_points: usize) -> Self {
        self.min_points_per_voxel = min_points;
        self
    }

    pub fn leaf_size(&self) -> &Vector3<f64> {
        &self.leaf_size
    }

    /// Returns `true` if all leaf sizes are positive and finite
    pub fn has_valid_leaf_size(&self) -> bool {
        self.leaf_size.iter().all(|size| size.is_finite() && *size > 0.0)
    }

    pub fn filter(&self, cloud: &PointCloud<PointXYZ>) -> PointCloud<PointXYZ> {
        if !self.has_valid_leaf_size() {
            log::warn!(
                "Invalid voxel leaf size {:?}, passing {} points through unfiltered",
                self.leaf_size.as_slice(),
                cloud.len()
            );
            return cloud.clone();
        }

        let bounds = match calculate_bounds(cloud) {
            Some(bounds) => bounds,
            None => return PointCloud::new(),
        };

        let inverse_leaf_size = self.leaf_size.map(|size| 1.0 / size);
        let cell_of = |position: &Vector3<f64>| -> Vector3<f64> {
            position.component_mul(&inverse_leaf_size).map(f64::floor)
        };
        let min_cell = cell_of(&bounds.min().coords);
        let max_cell = cell_of(&bounds.max().coords);
        let divisions = max_cell - min_cell + Vector3::repeat(1.0);

        if divisions.x * divisions.y * divisions.z > i32::MAX as f64 {
            log::warn!(
                "Voxel leaf size {:?} is too small for a cloud with extent {:?}, passing {} points through unfiltered",
                self.leaf_size.as_slice(),
                bounds.extent().as_slice(),
                cloud.len()
            );
            return cloud.clone();
        }

        let divisions_x = divisions.x as u64;
        let divisions_xy = divisions_x * divisions.y as u64;

        let mut cells = cloud
            .iter()
            .enumerate()
            .filter(|(_, point)| point.is_finite())
            .map(|(index, point)| {
                let cell = cell_of(&point.position_f64()) - min_cell;
                let linear_index =
                    cell.x as u64 + cell.y as u64 * divisions_x + cell.z as u64 * divisions_xy;
                (linear_index, index)
            })
            .collect::<Vec<_>>();
        cells.sort_unstable();

        let mut filtered = PointCloud::with_capacity(cells.len());
        let mut begin = 0;
        while begin < cells.len() {
            let cell = cells[begin].0;
            let end = begin
                + cells[begin..]
                    .iter()
                    .take_while(|(other, _)| *other == cell)
                    .count();
            if end - begin >= self.min_points_per_voxel {
                let sum = cells[begin..end]
                    .iter()
                    .fold(Vector3::<f64>::zeros(), |sum, (_, index)| {
                        sum + cloud[*index].position_f64()
                    });
                let centroid = sum / (end - begin) as f64;
                filtered.push(PointXYZ::new(
                    centroid.x as f32,
                    centroid.y as f32,
                    centroid.z as f32,
                ));
            }
            begin = end;
        }

        log::debug!(
            "Voxel grid with leaf size {:?} reduced {} points to {}",
            self.leaf_size.as_slice(),
            cloud.len(),
            filtered.len()
        );
        filtered
    }
}

/// Downsamples `cloud` by applying a voxelgrid-filter with the given leaf sizes per axis.
///
/// # Examples
/// ```
/// # use pointbridge_algorithms::voxel_grid::voxelgrid_filter;
/// # use pointbridge_core::containers::{PointCloud, PointXYZ};
/// let mut points = vec![];
/// // generate some points
/// for i in 0..100 {
///     for j in 0..100 {
///         points.push(PointXYZ::new(0.0, i as f32, j as f32));
///     }
/// }
/// let cloud = PointCloud::from_points(points);
/// let filtered = voxelgrid_filter(&cloud, 1.5, 1.5, 1.5);
/// // filtered now has fewer points than cloud
/// assert!(filtered.len() < cloud.len() / 2);
/// ```
pub fn voxelgrid_filter(
    cloud: &PointCloud<PointXYZ>,
    leafsize_x: f64,
    leafsize_y: f64,
    leafsize_z: f64,
) -> PointCloud<PointXYZ> {
    VoxelGrid::with_leaf_sizes(leafsize_x, leafsize_y, leafsize_z).filter(cloud)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::{distributions::Uniform, prelude::Distribution, rngs::StdRng, SeedableRng};

    use super::*;

    fn cube_corners() -> PointCloud<PointXYZ> {
        let mut cloud = PointCloud::new();
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    cloud.push(PointXYZ::new(x as f32, y as f32, z as f32));
                }
            }
        }
        cloud
    }

    fn random_cloud(count: usize, seed: u64) -> PointCloud<PointXYZ> {
        let mut rng = StdRng::seed_from_u64(seed);
        let range = Uniform::new(-20.0_f32, 20.0);
        (0..count)
            .map(|_| {
                PointXYZ::new(
                    range.sample(&mut rng),
                    range.sample(&mut rng),
                    range.sample(&mut rng),
                )
            })
            .collect()
    }

    #[test]
    fn test_large_leaf_merges_everything() {
        let filtered = VoxelGrid::new(10.0).filter(&cube_corners());
        assert_eq!(filtered.len(), 1);
        assert_approx_eq!(filtered[0].x, 0.5);
        assert_approx_eq!(filtered[0].y, 0.5);
        assert_approx_eq!(filtered[0].z, 0.5);
    }

    #[test]
    fn test_small_leaf_keeps_every_point() {
        let cloud = cube_corners();
        let filtered = VoxelGrid::new(0.5).filter(&cloud);
        // the input is already in x-fastest cell order
        assert_eq!(filtered, cloud);
    }

    #[test]
    fn test_output_order_is_x_fastest() {
        let cloud: PointCloud<PointXYZ> = vec![
            PointXYZ::new(0.5, 0.5, 1.5),
            PointXYZ::new(0.5, 1.5, 0.5),
            PointXYZ::new(1.5, 0.5, 0.5),
            PointXYZ::new(0.5, 0.5, 0.5),
        ]
        .into_iter()
        .collect();
        let filtered = VoxelGrid::new(1.0).filter(&cloud);
        assert_eq!(
            filtered.into_points(),
            vec![
                PointXYZ::new(0.5, 0.5, 0.5),
                PointXYZ::new(1.5, 0.5, 0.5),
                PointXYZ::new(0.5, 1.5, 0.5),
                PointXYZ::new(0.5, 0.5, 1.5),
            ]
        );
    }

    #[test]
    fn test_grid_is_anchored_at_origin() {
        // both points lie in cell [-1, 0) although they are only 0.2 apart from each other and from 0
        let cloud: PointCloud<PointXYZ> = vec![
            PointXYZ::new(-0.9, 0.1, 0.1),
            PointXYZ::new(-0.7, 0.1, 0.1),
            PointXYZ::new(0.1, 0.1, 0.1),
        ]
        .into_iter()
        .collect();
        let filtered = VoxelGrid::new(1.0).filter(&cloud);
        assert_eq!(filtered.len(), 2);
        assert_approx_eq!(filtered[0].x, -0.8, 1e-6);
        assert_approx_eq!(filtered[1].x, 0.1, 1e-6);
    }

    #[test]
    fn test_non_finite_points_are_dropped() {
        let mut cloud = cube_corners();
        cloud.push(PointXYZ::new(f32::NAN, 0.0, 0.0));
        cloud.push(PointXYZ::new(0.0, f32::INFINITY, 0.0));
        let filtered = VoxelGrid::new(10.0).filter(&cloud);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.is_dense());

        let only_nan: PointCloud<PointXYZ> =
            std::iter::once(PointXYZ::new(f32::NAN, f32::NAN, f32::NAN)).collect();
        assert!(VoxelGrid::new(1.0).filter(&only_nan).is_empty());
        assert!(VoxelGrid::new(1.0).filter(&PointCloud::new()).is_empty());
    }

    #[test]
    fn test_invalid_leaf_size_passes_through() {
        let mut cloud = cube_corners();
        cloud.push(PointXYZ::new(f32::NAN, 0.0, 0.0));
        for leaf_size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let filtered = VoxelGrid::new(leaf_size).filter(&cloud);
            assert_eq!(filtered.len(), cloud.len());
            assert_eq!(filtered[0], cloud[0]);
            assert!(filtered[8].x.is_nan());
        }
    }

    #[test]
    fn test_index_overflow_passes_through() {
        let cloud: PointCloud<PointXYZ> = vec![
            PointXYZ::new(0.0, 0.0, 0.0),
            PointXYZ::new(1000.0, 1000.0, 1000.0),
            PointXYZ::new(1000.0, 1000.0, 1000.0),
        ]
        .into_iter()
        .collect();
        let filtered = VoxelGrid::new(0.01).filter(&cloud);
        assert_eq!(filtered, cloud);
    }

    #[test]
    fn test_min_points_per_voxel() {
        let mut cloud = cube_corners();
        cloud.push(PointXYZ::new(5.5, 5.5, 5.5));
        let filtered = VoxelGrid::new(2.0)
            .with_min_points_per_voxel(2)
            .filter(&cloud);
        assert_eq!(filtered.len(), 1);
        assert_approx_eq!(filtered[0].z, 0.5);
    }

    #[test]
    fn test_per_axis_leaf_sizes() {
        let filtered = voxelgrid_filter(&cube_corners(), 10.0, 0.5, 10.0);
        assert_eq!(filtered.len(), 2);
        assert_approx_eq!(filtered[0].y, 0.0);
        assert_approx_eq!(filtered[1].y, 1.0);
    }

    #[test]
    fn test_count_never_grows_with_coarser_grids() {
        let cloud = random_cloud(5000, 7);
        let counts = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0]
            .iter()
            .map(|leaf_size| VoxelGrid::new(*leaf_size).filter(&cloud).len())
            .collect::<Vec<_>>();
        assert!(counts[0] <= cloud.len());
        for pair in counts.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}", counts);
        }
    }

    #[test]
    fn test_centroids_stay_inside_their_cell() {
        let cloud = random_cloud(2000, 11);
        let leaf_size = 3.0;
        let filtered = VoxelGrid::new(leaf_size).filter(&cloud);
        let mut previous = None;
        for point in filtered.iter() {
            let cell = point.position_f64().map(|c| (c / leaf_size).floor() as i64);
            let key = (cell.z, cell.y, cell.x);
            if let Some(previous) = previous {
                assert!(key > previous);
            }
            previous = Some(key);
        }
    }
}
