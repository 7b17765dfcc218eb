// The normal estimation algorithm is inspired by the PCL library (https://pointclouds.org/)
use pointbridge_core::containers::{Normal, PointCloud, PointXYZ};
use pointbridge_core::nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::search::{Neighborhood, SearchIndex};

/// Normal estimation over a fixed neighbourhood definition.
///
/// For every point of a cloud, the neighbours are gathered from a [`SearchIndex`], a plane is fitted through
/// them and its normal and curvature are reported. Points with fewer than three finite neighbours get a
/// [`Normal::nan`]. All normals are flipped towards the viewpoint, which is the origin unless set otherwise.
///
/// # Examples
///
/// ```
/// # use pointbridge_core::containers::{PointCloud, PointXYZ};
/// # use pointbridge_algorithms::normal_estimation::NormalEstimation;
/// # use pointbridge_algorithms::search::{Neighborhood, SearchIndex};
/// let cloud: PointCloud<PointXYZ> = (0..25)
///     .map(|i| PointXYZ::new((i % 5) as f32, (i / 5) as f32, 2.0))
///     .collect();
/// let index = SearchIndex::build(&cloud);
/// let normals = NormalEstimation::new(Neighborhood::KNearest(8)).compute(&cloud, &index);
/// assert_eq!(normals.len(), cloud.len());
/// // the plane lies above the origin, so all normals point down
/// assert!(normals.iter().all(|n| n.normal_z < -0.99));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NormalEstimation {
    neighborhood: Neighborhood,
    viewpoint: Vector3<f32>,
}

impl NormalEstimation {
    pub fn new(neighborhood: Neighborhood) -> Self {
        Self {
            neighborhood,
            viewpoint: Vector3::zeros(),
        }
    }

    /// Sets the viewpoint that all normals are oriented towards
    pub fn with_viewpoint(mut self, viewpoint: Vector3<f32>) -> Self {
        self.viewpoint = viewpoint;
        self
    }

    pub fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    pub fn viewpoint(&self) -> &Vector3<f32> {
        &self.viewpoint
    }

    /// Computes one normal per point of `cloud`. The result has exactly as many entries as `cloud`, and entry
    /// `i` belongs to point `i`. `index` must have been built over `cloud`.
    ///
    /// The points are processed in parallel on the current rayon pool.
    pub fn compute(&self, cloud: &PointCloud<PointXYZ>, index: &SearchIndex) -> PointCloud<Normal> {
        debug_assert_eq!(index.source_len(), cloud.len());
        let points = cloud.points();
        let normals = points
            .par_iter()
            .map(|point| self.compute_at(points, index, point))
            .collect::<Vec<_>>();

        log::debug!(
            "Estimated {} normals ({} undefined) with {:?}",
            normals.len(),
            normals.iter().filter(|normal| !normal.is_finite()).count(),
            self.neighborhood
        );
        PointCloud::from_points(normals)
    }

    fn compute_at(&self, points: &[PointXYZ], index: &SearchIndex, point: &PointXYZ) -> Normal {
        if !point.is_finite() {
            return Normal::nan();
        }
        let neighbors = index
            .search(&[point.x, point.y, point.z], self.neighborhood)
            .into_iter()
            .map(|neighbor| points[neighbor.index].position_f64())
            .collect::<Vec<_>>();

        match compute_point_normal(&neighbors) {
            Some((normal, curvature)) => {
                let normal = flip_towards_viewpoint(
                    &point.position_f64(),
                    &self.viewpoint.cast::<f64>(),
                    normal,
                );
                Normal::new(
                    normal.x as f32,
                    normal.y as f32,
                    normal.z as f32,
                    curvature as f32,
                )
            }
            None => Normal::nan(),
        }
    }
}

/// Builds a search index over `cloud` and estimates its normals with the given `neighborhood`, oriented
/// towards the origin
pub fn compute_normals(cloud: &PointCloud<PointXYZ>, neighborhood: Neighborhood) -> PointCloud<Normal> {
    let index = SearchIndex::build(cloud);
    NormalEstimation::new(neighborhood).compute(cloud, &index)
}

/// Fits a plane through `neighbors` and returns its unit normal and the surface curvature. The orientation of
/// the normal is arbitrary. Returns `None` if fewer than three finite points are given or the points do not
/// define a direction (e.g. they all coincide).
pub fn compute_point_normal(neighbors: &[Vector3<f64>]) -> Option<(Vector3<f64>, f64)> {
    let covariance_matrix = compute_covariance_matrix(neighbors).ok()?;
    let (normal, curvature) = solve_plane_parameter(&covariance_matrix);
    if normal.iter().all(|c| c.is_finite()) {
        Some((normal, curvature))
    } else {
        None
    }
}

/// Computes the centroid of the finite points in `points`. Returns `None` if there are none
///
/// ```
/// # use pointbridge_core::nalgebra::Vector3;
/// # use pointbridge_algorithms::normal_estimation::compute_centroid;
/// let points = vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(-1.0, 2.0, 0.0)];
/// assert_eq!(compute_centroid(&points), Some(Vector3::new(0.0, 1.0, 0.0)));
/// ```
pub fn compute_centroid(points: &[Vector3<f64>]) -> Option<Vector3<f64>> {
    let (sum, count) = points
        .iter()
        .filter(|point| is_finite(point))
        .fold((Vector3::<f64>::zeros(), 0usize), |(sum, count), point| {
            (sum + point, count + 1)
        });
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn is_finite(point: &Vector3<f64>) -> bool {
    point.x.is_finite() && point.y.is_finite() && point.z.is_finite()
}

/// compute the covariance matrix of the finite points, normalized by their number
fn compute_covariance_matrix(points: &[Vector3<f64>]) -> Result<Matrix3<f64>, &'static str> {
    let centroid = match compute_centroid(points) {
        Some(centroid) => centroid,
        None => return Err("The neighbourhood contains no finite points!"),
    };

    let mut covariance_matrix = Matrix3::<f64>::zeros();
    let mut point_count = 0;
    for point in points.iter().filter(|point| is_finite(point)) {
        let diff_mean = point - centroid;

        covariance_matrix[(1, 1)] += diff_mean.y * diff_mean.y;
        covariance_matrix[(1, 2)] += diff_mean.y * diff_mean.z;
        covariance_matrix[(2, 2)] += diff_mean.z * diff_mean.z;

        covariance_matrix[(0, 0)] += diff_mean.x * diff_mean.x;
        covariance_matrix[(0, 1)] += diff_mean.x * diff_mean.y;
        covariance_matrix[(0, 2)] += diff_mean.x * diff_mean.z;
        point_count += 1;
    }

    if point_count < 3 {
        return Err("The number of valid (finite and non-NaN values) points in the neighbourhood is not enough to span a plane!");
    }

    covariance_matrix[(1, 0)] = covariance_matrix[(0, 1)];
    covariance_matrix[(2, 0)] = covariance_matrix[(0, 2)];
    covariance_matrix[(2, 1)] = covariance_matrix[(1, 2)];

    Ok(covariance_matrix / point_count as f64)
}

/// find the eigen value solution if the highest degree of the polynomial is 2
fn solve_polynomial_quadratic(coefficient_2: f64, coefficient_1: f64) -> Vector3<f64> {
    let mut eigen_values = Vector3::<f64>::zeros();

    eigen_values[0] = 0.0;

    let mut delta = coefficient_2 * coefficient_2 - 4.0 * coefficient_1;

    if delta < 0.0 {
        delta = 0.0;
    }

    let sqrt_delta = f64::sqrt(delta);

    eigen_values[2] = 0.5 * (coefficient_2 + sqrt_delta);
    eigen_values[1] = 0.5 * (coefficient_2 - sqrt_delta);

    eigen_values
}

/// solve the characteristic polynomial of a symmetric matrix, returning its eigen values in increasing order
fn solve_polynomial(matrix: &Matrix3<f64>) -> Vector3<f64> {
    let coefficient_0 = matrix[(0, 0)] * matrix[(1, 1)] * matrix[(2, 2)]
        + 2.0 * matrix[(0, 1)] * matrix[(0, 2)] * matrix[(1, 2)]
        - matrix[(0, 0)] * matrix[(1, 2)] * matrix[(1, 2)]
        - matrix[(1, 1)] * matrix[(0, 2)] * matrix[(0, 2)]
        - matrix[(2, 2)] * matrix[(0, 1)] * matrix[(0, 1)];
    let coefficient_1 = matrix[(0, 0)] * matrix[(1, 1)] - matrix[(0, 1)] * matrix[(0, 1)]
        + matrix[(0, 0)] * matrix[(2, 2)]
        - matrix[(0, 2)] * matrix[(0, 2)]
        + matrix[(1, 1)] * matrix[(2, 2)]
        - matrix[(1, 2)] * matrix[(1, 2)];
    let coefficient_2 = matrix.trace();

    // one eigen value is zero
    if coefficient_0.abs() < f64::EPSILON {
        return solve_polynomial_quadratic(coefficient_2, coefficient_1);
    }

    let one_third = 1.0 / 3.0;
    let sqrt_3 = f64::sqrt(3.0);

    let coefficient_2_third = coefficient_2 * one_third;
    let mut alpha_third = (coefficient_1 - coefficient_2 * coefficient_2_third) * one_third;
    if alpha_third > 0.0 {
        alpha_third = 0.0;
    }

    let half_beta = 0.5
        * (coefficient_0
            + coefficient_2_third * (2.0 * coefficient_2_third * coefficient_2_third - coefficient_1));

    let mut q = half_beta * half_beta + alpha_third * alpha_third * alpha_third;
    if q > 0.0 {
        q = 0.0;
    }

    let rho = f64::sqrt(-alpha_third);
    let theta = f64::atan2(f64::sqrt(-q), half_beta) * one_third;
    let cosine_of_theta = f64::cos(theta);
    let sine_of_theta = f64::sin(theta);

    let mut eigen_values = Vector3::new(
        coefficient_2_third + 2.0 * rho * cosine_of_theta,
        coefficient_2_third - rho * (cosine_of_theta + sqrt_3 * sine_of_theta),
        coefficient_2_third - rho * (cosine_of_theta - sqrt_3 * sine_of_theta),
    );
    eigen_values.as_mut_slice().sort_by(|a, b| a.total_cmp(b));

    if eigen_values[0] <= 0.0 {
        solve_polynomial_quadratic(coefficient_2, coefficient_1)
    } else {
        eigen_values
    }
}

/// the longest cross product of two rows of `shifted_matrix`, normalized. `shifted_matrix` has rank 2 if an
/// eigen value was subtracted from its diagonal, so this vector spans its null space
fn get_largest_eigen_vector(shifted_matrix: &Matrix3<f64>) -> Vector3<f64> {
    let row_0: Vector3<f64> = shifted_matrix.row(0).transpose();
    let row_1: Vector3<f64> = shifted_matrix.row(1).transpose();
    let row_2: Vector3<f64> = shifted_matrix.row(2).transpose();

    let candidates = [
        row_0.cross(&row_1),
        row_0.cross(&row_2),
        row_1.cross(&row_2),
    ];

    let mut largest = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.norm_squared() > largest.norm_squared() {
            largest = *candidate;
        }
    }

    largest / largest.norm()
}

/// for a given symmetric 3x3 matrix, calculates the smallest eigen value and its eigen vector
fn eigen_3x3(covariance_matrix: &Matrix3<f64>) -> (f64, Vector3<f64>) {
    let mut scale = covariance_matrix.abs().max();
    if scale <= f64::MIN_POSITIVE {
        scale = 1.0;
    }

    let mut scaled_matrix = *covariance_matrix / scale;
    let eigen_values = solve_polynomial(&scaled_matrix);
    let eigen_value = eigen_values[0] * scale;

    for i in 0..3 {
        scaled_matrix[(i, i)] -= eigen_values[0];
    }

    let eigen_vector = get_largest_eigen_vector(&scaled_matrix);
    (eigen_value, eigen_vector)
}

/// calculates the orientation of the surface as a normal vector as well as the curvature of the surface for a
/// given covariance matrix
fn solve_plane_parameter(covariance_matrix: &Matrix3<f64>) -> (Vector3<f64>, f64) {
    let (eigen_value, eigen_vector) = eigen_3x3(covariance_matrix);

    let eigen_sum = covariance_matrix.trace();
    let curvature = if eigen_sum != 0.0 {
        (eigen_value / eigen_sum).abs()
    } else {
        0.0
    };

    (eigen_vector, curvature)
}

fn flip_towards_viewpoint(
    point: &Vector3<f64>,
    viewpoint: &Vector3<f64>,
    normal: Vector3<f64>,
) -> Vector3<f64> {
    if (viewpoint - point).dot(&normal) < 0.0 {
        -normal
    } else {
        normal
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn square_points() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ]
    }

    fn grid(z: f32, size: usize) -> PointCloud<PointXYZ> {
        (0..size * size)
            .map(|i| PointXYZ::new((i % size) as f32 * 0.1, (i / size) as f32 * 0.1, z))
            .collect()
    }

    #[test]
    fn test_compute_normal_sub() {
        let points = square_points();

        let centroid = compute_centroid(&points).unwrap();
        assert_eq!(centroid, Vector3::new(0.25, 0.5, 0.0));

        let covariance_matrix = compute_covariance_matrix(&points).unwrap();
        let expected = Matrix3::new(0.6875, 0.125, 0.0, 0.125, 0.25, 0.0, 0.0, 0.0, 0.0);
        for (actual, expected) in covariance_matrix.iter().zip(expected.iter()) {
            assert_approx_eq!(actual, expected, 1e-12);
        }

        let (normal_vector, curvature) = solve_plane_parameter(&covariance_matrix);
        assert_eq!(normal_vector[0], 0.0);
        assert_eq!(normal_vector[1], 0.0);
        assert_approx_eq!(normal_vector[2].abs(), 1.0, 1e-12);
        assert_eq!(curvature, 0.0);
    }

    #[test]
    fn test_covariance_error() {
        let points = vec![
            Vector3::new(f64::NAN, 0.0, 0.0),
            Vector3::new(0.0, 1.0, f64::NAN),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ];
        assert!(compute_covariance_matrix(&points).is_err());
        assert!(compute_point_normal(&points).is_none());
        assert!(compute_point_normal(&[]).is_none());
    }

    #[test]
    fn test_coinciding_points_have_no_normal() {
        let points = vec![Vector3::new(1.0, 2.0, 3.0); 5];
        assert!(compute_point_normal(&points).is_none());
    }

    #[test]
    fn test_tilted_plane() {
        // points on x + y + z = 1
        let points = (0..16)
            .map(|i| {
                let u = (i % 4) as f64;
                let v = (i / 4) as f64;
                Vector3::new(u, v, 1.0 - u - v)
            })
            .collect::<Vec<_>>();
        let (normal, curvature) = compute_point_normal(&points).unwrap();
        let expected = Vector3::new(1.0, 1.0, 1.0).normalize();
        assert_approx_eq!(normal.dot(&expected).abs(), 1.0, 1e-9);
        assert_approx_eq!(normal.norm(), 1.0, 1e-12);
        assert_approx_eq!(curvature, 0.0, 1e-9);
    }

    #[test]
    fn test_curvature_of_isotropic_neighbourhood() {
        // the six unit axis points spread equally in all directions
        let points = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
        ];
        let covariance_matrix = compute_covariance_matrix(&points).unwrap();
        let (_, curvature) = solve_plane_parameter(&covariance_matrix);
        assert_approx_eq!(curvature, 1.0 / 3.0, 1e-9);
    }

    #[test]
    fn test_normals_face_the_viewpoint() {
        let cloud = grid(1.0, 6);
        let normals = compute_normals(&cloud, Neighborhood::KNearest(8));
        assert_eq!(normals.len(), cloud.len());
        for normal in normals.iter() {
            assert_approx_eq!(normal.normal_x, 0.0, 1e-5);
            assert_approx_eq!(normal.normal_y, 0.0, 1e-5);
            assert_approx_eq!(normal.normal_z, -1.0, 1e-5);
            assert_approx_eq!(normal.curvature, 0.0, 1e-5);
        }

        let index = SearchIndex::build(&cloud);
        let from_above = NormalEstimation::new(Neighborhood::KNearest(8))
            .with_viewpoint(Vector3::new(0.0, 0.0, 10.0))
            .compute(&cloud, &index);
        assert!(from_above
            .iter()
            .all(|normal| (normal.normal_z - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_too_few_neighbours_yield_nan() {
        let cloud: PointCloud<PointXYZ> =
            vec![PointXYZ::new(0.0, 0.0, 0.0), PointXYZ::new(1.0, 0.0, 0.0)]
                .into_iter()
                .collect();
        let normals = compute_normals(&cloud, Neighborhood::KNearest(5));
        assert_eq!(normals.len(), 2);
        assert!(normals.iter().all(|normal| normal.normal_x.is_nan()
            && normal.normal_y.is_nan()
            && normal.normal_z.is_nan()
            && normal.curvature.is_nan()));
    }

    #[test]
    fn test_radius_neighbourhood_and_isolated_points() {
        let mut cloud = grid(0.5, 5);
        cloud.push(PointXYZ::new(50.0, 50.0, 50.0));
        cloud.push(PointXYZ::new(f32::NAN, 0.0, 0.0));

        let normals = compute_normals(&cloud, Neighborhood::Radius(0.25));
        assert_eq!(normals.len(), 27);
        for normal in normals.iter().take(25) {
            assert!(normal.is_finite());
            assert_approx_eq!(normal.normal_z, -1.0, 1e-5);
        }
        assert!(!normals[25].is_finite());
        assert!(!normals[26].is_finite());
    }

    #[test]
    fn test_sphere_normals_point_inwards() {
        // Fibonacci sphere around the origin, which is also the viewpoint
        let count = 500;
        let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        let cloud: PointCloud<PointXYZ> = (0..count)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
                let radius = (1.0 - y * y).sqrt();
                let theta = golden_angle * i as f64;
                PointXYZ::new(
                    (radius * theta.cos()) as f32,
                    y as f32,
                    (radius * theta.sin()) as f32,
                )
            })
            .collect();

        let normals = compute_normals(&cloud, Neighborhood::KNearest(10));
        for (point, normal) in cloud.iter().zip(normals.iter()) {
            let inwards = -point.position().normalize();
            assert!(normal.normal().dot(&inwards) > 0.9);
            assert_approx_eq!(normal.normal().norm(), 1.0, 1e-4);
        }
    }
}
