//! The boundary operations on safe Rust types. Each one decodes its input into a fresh container, calls into a
//! [`PointBackend`] and encodes the result into a new buffer. The `extern "C"` entry points are thin wrappers
//! around these.

use std::path::Path;

use pointbridge_algorithms::search::Neighborhood;

use crate::{
    backend::PointBackend,
    status::{BoundaryError, Result},
};

/// Estimates one normal per point of the flat buffer `points`. Exactly one of `k` and `radius` must be positive,
/// otherwise the call is rejected before the backend is touched.
///
/// # Errors
///
/// - [`BoundaryError::InvalidNeighborhood`] if both or neither of `k` and `radius` are positive
/// - [`BoundaryError::NormalCountMismatch`] if the backend returns a different number of normals than points
pub fn compute_normals<B: PointBackend + ?Sized>(
    backend: &B,
    points: &[f32],
    k: i32,
    radius: f32,
) -> Result<Box<[f32]>> {
    let neighborhood = Neighborhood::from_parameters(k, radius).map_err(|e| {
        log::warn!("Rejecting normal estimation: {}", e);
        BoundaryError::InvalidNeighborhood { k, radius }
    })?;
    let cloud = backend.build_point_container(points);
    log::debug!(
        "Estimating normals for {} points with {:?}",
        cloud.len(),
        neighborhood
    );
    let index = backend.build_search_index(&cloud);
    let normals = backend.estimate_normals(&cloud, &index, neighborhood);
    if normals.len() != cloud.len() {
        return Err(BoundaryError::NormalCountMismatch {
            points: cloud.len(),
            normals: normals.len(),
        });
    }
    Ok(normals.to_flat_boxed())
}

/// Reads all points of an ASCII or binary PCD file into a new flat buffer
pub fn load_pcd<B: PointBackend + ?Sized>(backend: &B, path: &Path) -> Result<Box<[f32]>> {
    let cloud = backend.load_file(path).map_err(BoundaryError::Io)?;
    log::debug!("Loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud.to_flat_boxed())
}

/// Writes the flat buffer `points` as an unorganized ASCII PCD file
pub fn save_pcd<B: PointBackend + ?Sized>(backend: &B, path: &Path, points: &[f32]) -> Result<()> {
    let cloud = backend.build_point_container(points);
    backend.save_file_ascii(path, &cloud).map_err(BoundaryError::Io)?;
    log::debug!("Saved {} points to {}", cloud.len(), path.display());
    Ok(())
}

/// Writes the flat buffer `points` as an organized ASCII PCD file with `height` rows of `width` points
///
/// # Errors
///
/// [`BoundaryError::InvalidArgument`] if `height * width` does not equal the number of points
pub fn save_organized_pcd<B: PointBackend + ?Sized>(
    backend: &B,
    path: &Path,
    points: &[f32],
    height: i32,
    width: i32,
) -> Result<()> {
    let mut cloud = backend.build_point_container(points);
    if height <= 0 || width <= 0 {
        return Err(BoundaryError::InvalidArgument(format!(
            "organized cloud dimensions must be positive, got {}x{}",
            width, height
        )));
    }
    cloud
        .organize(width as usize, height as usize)
        .map_err(|e| BoundaryError::InvalidArgument(e.to_string()))?;
    backend.save_file_ascii(path, &cloud).map_err(BoundaryError::Io)?;
    log::debug!(
        "Saved {}x{} organized points to {}",
        width,
        height,
        path.display()
    );
    Ok(())
}

/// Downsamples `points` with a voxel grid of edge length `leaf_size`. An unusable leaf size returns the points
/// unchanged
pub fn voxelize<B: PointBackend + ?Sized>(backend: &B, points: &[f32], leaf_size: f32) -> Box<[f32]> {
    let cloud = backend.build_point_container(points);
    let filtered = backend.voxel_filter(&cloud, leaf_size);
    log::debug!(
        "Voxelized {} points into {} with leaf size {}",
        cloud.len(),
        filtered.len(),
        leaf_size
    );
    filtered.to_flat_boxed()
}

/// Removes points whose mean distance to their `mean_k` nearest neighbours is more than `stddev_mul` standard
/// deviations above the average
///
/// # Errors
///
/// [`BoundaryError::InvalidArgument`] if `mean_k` is not positive or `stddev_mul` is not finite
pub fn remove_statistical_outliers<B: PointBackend + ?Sized>(
    backend: &B,
    points: &[f32],
    mean_k: i32,
    stddev_mul: f32,
) -> Result<Box<[f32]>> {
    if mean_k <= 0 {
        return Err(BoundaryError::InvalidArgument(format!(
            "meanK must be positive, got {}",
            mean_k
        )));
    }
    let cloud = backend.build_point_container(points);
    let filtered = backend
        .remove_statistical_outliers(&cloud, mean_k as usize, stddev_mul as f64)
        .map_err(|e| BoundaryError::InvalidArgument(format!("{:#}", e)))?;
    log::debug!(
        "Outlier removal kept {} of {} points",
        filtered.len(),
        cloud.len()
    );
    Ok(filtered.to_flat_boxed())
}

/// Finds the dominant plane of `points` and returns the sorted indices of its inliers
///
/// # Errors
///
/// [`BoundaryError::InvalidArgument`] if there are fewer than 3 finite points or `distance_threshold` is not
/// positive
pub fn segment_plane<B: PointBackend + ?Sized>(
    backend: &B,
    points: &[f32],
    distance_threshold: f32,
) -> Result<Box<[i32]>> {
    let cloud = backend.build_point_container(points);
    let inliers = backend
        .segment_plane(&cloud, distance_threshold as f64)
        .map_err(|e| BoundaryError::InvalidArgument(format!("{:#}", e)))?;
    log::debug!(
        "Plane segmentation found {} inliers among {} points",
        inliers.len(),
        cloud.len()
    );
    // indices are below the point count, which came in as an i32
    Ok(inliers.into_iter().map(|index| index as i32).collect())
}
