use anyhow::{bail, Result};
use pointbridge_core::{
    containers::{PointCloud, PointXYZ},
    nalgebra::Vector3,
};
use rand::Rng;
use rayon::prelude::*;

/// Represents a plane in coordinate-form: ax + by + cz + d = 0
/// the ranking shows how many points of the pointcloud are inliers for this specific plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    ranking: usize,
}

impl Plane {
    /// The coefficients `(a, b, c, d)` of the plane, with `(a, b, c)` normalized to unit length
    pub fn coefficients(&self) -> [f64; 4] {
        let length = self.normal_length();
        [
            self.a / length,
            self.b / length,
            self.c / length,
            self.d / length,
        ]
    }

    /// The unit normal of the plane
    pub fn normal(&self) -> Vector3<f64> {
        Vector3::new(self.a, self.b, self.c) / self.normal_length()
    }

    /// Number of inliers of this plane
    pub fn ranking(&self) -> usize {
        self.ranking
    }

    /// calculates the distance between a point and the plane
    pub fn distance_to(&self, point: &Vector3<f64>) -> f64 {
        let d = (self.a * point.x + self.b * point.y + self.c * point.z + self.d).abs();
        d / self.normal_length()
    }

    fn normal_length(&self) -> f64 {
        (self.a * self.a + self.b * self.b + self.c * self.c).sqrt()
    }
}

/// generates a random plane from three distinct points out of `candidates`
fn generate_rng_plane(positions: &[Vector3<f64>], candidates: &[usize]) -> Plane {
    // choose three random points from the pointcloud
    let mut rng = rand::thread_rng();
    let rand1 = rng.gen_range(0..candidates.len());
    let mut rand2 = rng.gen_range(0..candidates.len());
    while rand1 == rand2 {
        rand2 = rng.gen_range(0..candidates.len());
    }
    let mut rand3 = rng.gen_range(0..candidates.len());
    // make sure we have 3 unique random numbers to generate the plane model
    while rand2 == rand3 || rand1 == rand3 {
        rand3 = rng.gen_range(0..candidates.len());
    }
    let p_a = positions[candidates[rand1]];
    let p_b = positions[candidates[rand2]];
    let p_c = positions[candidates[rand3]];

    // compute plane from the three positions
    let normal = (p_b - p_a).cross(&(p_c - p_a));
    let d = -normal.dot(&p_a);
    Plane {
        a: normal.x,
        b: normal.y,
        c: normal.z,
        d,
        ranking: 0,
    }
}

fn generate_plane_model(
    positions: &[Vector3<f64>],
    candidates: &[usize],
    distance_threshold: f64,
) -> (Plane, Vec<usize>) {
    let mut curr_hypo = generate_rng_plane(positions, candidates);
    // three collinear samples span no plane
    if curr_hypo.normal_length() == 0.0 {
        return (curr_hypo, vec![]);
    }
    let curr_positions = candidates
        .iter()
        .copied()
        .filter(|index| curr_hypo.distance_to(&positions[*index]) < distance_threshold)
        .collect::<Vec<_>>();
    curr_hypo.ranking = curr_positions.len();
    (curr_hypo, curr_positions)
}

/// positions as f64 and the indices of all finite points
fn prepare(
    cloud: &PointCloud<PointXYZ>,
    distance_threshold: f64,
    num_of_iterations: usize,
) -> Result<(Vec<Vector3<f64>>, Vec<usize>)> {
    if !(distance_threshold.is_finite() && distance_threshold > 0.0) {
        bail!(
            "The distance threshold must be positive, got {}",
            distance_threshold
        );
    }
    if num_of_iterations == 0 {
        bail!("Ransac needs at least one iteration");
    }
    let positions = cloud
        .iter()
        .map(|point| point.position_f64())
        .collect::<Vec<_>>();
    let candidates = cloud
        .iter()
        .enumerate()
        .filter(|(_, point)| point.is_finite())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    if candidates.len() < 3 {
        bail!(
            "The point cloud needs to include at least 3 finite points to generate a plane, but has {}",
            candidates.len()
        );
    }
    Ok((positions, candidates))
}

/// Ransac Plane Segmentation in parallel.
/// Returns the plane with the highest rating/most inliers and the associated indices of the inliers in
/// increasing order.
/// The `distance_threshold` sets the maximum distance to the plane that a point is counted as an inlier from.
/// With `num_of_iterations` the number of iterations that the algorithm performs can be chosen.
/// Points with non-finite coordinates are never sampled and never inliers.
///
/// # Examples
///
/// ```
/// # use pointbridge_core::containers::{PointCloud, PointXYZ};
/// # use pointbridge_algorithms::segmentation::ransac_plane_par;
/// let mut points = vec![];
/// // generate some inliers
/// for i in 0..200 {
///     points.push(PointXYZ::new(0.0, i as f32, (i * i) as f32));
/// }
/// // generate an outlier
/// points.push(PointXYZ::new(9.0, 0.0, 0.0));
/// let cloud = PointCloud::from_points(points);
/// let (_plane, indices) = ransac_plane_par(&cloud, 0.5, 10).unwrap();
/// for i in 0..200 {
///     // inliers are in the plane
///     assert!(indices.contains(&i));
/// }
/// // outlier is not in the plane
/// assert!(!indices.contains(&200));
/// ```
///
/// # Errors
///
/// If the cloud has fewer than 3 finite points, `distance_threshold` is not positive or `num_of_iterations`
/// is zero.
pub fn ransac_plane_par(
    cloud: &PointCloud<PointXYZ>,
    distance_threshold: f64,
    num_of_iterations: usize,
) -> Result<(Plane, Vec<usize>)> {
    let (positions, candidates) = prepare(cloud, distance_threshold, num_of_iterations)?;
    let best = (0..num_of_iterations)
        .into_par_iter()
        .map(|_x| generate_plane_model(&positions, &candidates, distance_threshold))
        // get the best plane-model from all iterations (highest ranking)
        .max_by(|(x, _y), (a, _b)| x.ranking.cmp(&a.ranking));
    match best {
        Some(best) => {
            log::debug!(
                "Ransac found a plane with {} of {} inliers after {} iterations",
                best.0.ranking,
                cloud.len(),
                num_of_iterations
            );
            Ok(best)
        }
        None => bail!("Ransac produced no plane model"),
    }
}

/// Ransac Plane Segmentation in serial (for maximum speed use ransac_plane_par).
/// Behaves like [`ransac_plane_par`].
///
/// # Examples
///
/// ```
/// # use pointbridge_core::containers::{PointCloud, PointXYZ};
/// # use pointbridge_algorithms::segmentation::ransac_plane_serial;
/// let mut points = vec![];
/// for i in 0..200 {
///     points.push(PointXYZ::new(0.0, i as f32, (i * i) as f32));
/// }
/// points.push(PointXYZ::new(9.0, 0.0, 0.0));
/// let cloud = PointCloud::from_points(points);
/// let (_plane, indices) = ransac_plane_serial(&cloud, 0.5, 10).unwrap();
/// assert_eq!(indices.len(), 200);
/// ```
///
/// # Errors
///
/// Same as [`ransac_plane_par`]
pub fn ransac_plane_serial(
    cloud: &PointCloud<PointXYZ>,
    distance_threshold: f64,
    num_of_iterations: usize,
) -> Result<(Plane, Vec<usize>)> {
    let (positions, candidates) = prepare(cloud, distance_threshold, num_of_iterations)?;
    match (0..num_of_iterations)
        .map(|_x| generate_plane_model(&positions, &candidates, distance_threshold))
        .max_by(|(x, _y), (a, _b)| x.ranking.cmp(&a.ranking))
    {
        Some(best) => Ok(best),
        None => bail!("Ransac produced no plane model"),
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn setup_point_cloud() -> PointCloud<PointXYZ> {
        (0..1000)
            .map(|i| {
                if i % 5 == 3 {
                    // a vertical line above the plane
                    PointXYZ::new(0.0, 0.0, 2.0 + i as f32 * 0.1)
                } else {
                    // plane points at z = 1
                    PointXYZ::new((i % 40) as f32, (i / 40) as f32, 1.0)
                }
            })
            .collect()
    }

    fn check_plane(plane: &Plane, indices: &[usize]) {
        assert_eq!(indices.len(), 800);
        assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(indices.iter().all(|index| index % 5 != 3));
        assert_eq!(plane.ranking(), 800);
        assert_approx_eq!(plane.normal().z.abs(), 1.0, 1e-9);
        let [_, _, c, d] = plane.coefficients();
        // c * 1 + d = 0
        assert_approx_eq!(c + d, 0.0, 1e-9);
    }

    #[test]
    fn test_ransac_plane_par() {
        let cloud = setup_point_cloud();
        let (plane, indices) = ransac_plane_par(&cloud, 0.1, 300).unwrap();
        check_plane(&plane, &indices);
    }

    #[test]
    fn test_ransac_plane_serial() {
        let cloud = setup_point_cloud();
        let (plane, indices) = ransac_plane_serial(&cloud, 0.1, 300).unwrap();
        check_plane(&plane, &indices);
    }

    #[test]
    fn test_non_finite_points_are_ignored() {
        let mut cloud = setup_point_cloud();
        cloud.push(PointXYZ::new(f32::NAN, 0.0, 1.0));
        let (_plane, indices) = ransac_plane_par(&cloud, 0.1, 300).unwrap();
        assert_eq!(indices.len(), 800);
        assert!(!indices.contains(&1000));
    }

    #[test]
    fn test_invalid_input() {
        let two: PointCloud<PointXYZ> =
            vec![PointXYZ::new(0.0, 0.0, 0.0), PointXYZ::new(1.0, 0.0, 0.0)]
                .into_iter()
                .collect();
        assert!(ransac_plane_par(&two, 0.1, 10).is_err());
        let cloud = setup_point_cloud();
        assert!(ransac_plane_par(&cloud, 0.0, 10).is_err());
        assert!(ransac_plane_par(&cloud, f64::NAN, 10).is_err());
        assert!(ransac_plane_serial(&cloud, 0.1, 0).is_err());
    }

    #[test]
    fn test_distance_to_plane() {
        let plane = Plane {
            a: 0.0,
            b: 0.0,
            c: 2.0,
            d: -2.0,
            ranking: 0,
        };
        assert_approx_eq!(plane.distance_to(&Vector3::new(5.0, 5.0, 4.0)), 3.0);
        assert_eq!(plane.coefficients(), [0.0, 0.0, 1.0, -1.0]);
    }
}
