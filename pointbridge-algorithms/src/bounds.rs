use pointbridge_core::{
    containers::{PointCloud, PointXYZ},
    math::AABB,
    nalgebra::Point3,
};

/// Calculate the bounding box of the finite points in the given `cloud`. Returns `None` if the cloud contains
/// no finite points
pub fn calculate_bounds(cloud: &PointCloud<PointXYZ>) -> Option<AABB<f64>> {
    AABB::from_points(
        cloud
            .iter()
            .filter(|point| point.is_finite())
            .map(|point| Point3::from(point.position_f64())),
    )
}
