#![warn(clippy::all)]
//! Algorithms that operate on point clouds.
//!
//! These are the numerics that sit behind the pointbridge boundary: neighbour search, surface normal
//! estimation, voxel-grid downsampling, statistical outlier removal and plane segmentation.

// Algorithm to calculate the bounding box of a point cloud.
pub mod bounds;
// k-d tree over the positions of a point cloud, supporting k-nearest and radius queries.
pub mod search;
// Per-point surface normals and curvature from a k-nearest or fixed-radius neighbourhood.
pub mod normal_estimation;
// Downsampling by averaging all points that fall into the same cubic cell.
pub mod voxel_grid;
// Removes points whose mean neighbour distance is far above the cloud-wide mean.
pub mod outlier_removal;
// Ransac plane segmentation in serial and parallel, returning the best plane and its inlier indices.
pub mod segmentation;
