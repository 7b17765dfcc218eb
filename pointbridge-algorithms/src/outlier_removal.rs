use anyhow::{bail, Result};
use pointbridge_core::containers::{PointCloud, PointXYZ};
use rayon::prelude::*;

use crate::search::SearchIndex;

/// Statistical outlier removal, modelled after the PCL filter of the same name.
///
/// For every point the mean distance to its `mean_k` nearest neighbours is computed. Over all points, the
/// mean `μ` and the sample standard deviation `σ` of these distances are taken, and every point whose mean
/// distance exceeds `μ + stddev_mul * σ` is an outlier. Points with non-finite coordinates are always removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticalOutlierRemoval {
    mean_k: usize,
    stddev_mul: f64,
    negative: bool,
}

impl StatisticalOutlierRemoval {
    /// # Errors
    ///
    /// If `mean_k` is zero or `stddev_mul` is not finite
    pub fn new(mean_k: usize, stddev_mul: f64) -> Result<Self> {
        if mean_k == 0 {
            bail!("The number of neighbours for the mean distance must be positive");
        }
        if !stddev_mul.is_finite() {
            bail!(
                "The standard deviation multiplier must be finite, got {}",
                stddev_mul
            );
        }
        Ok(Self {
            mean_k,
            stddev_mul,
            negative: false,
        })
    }

    /// If `negative` is set, the filter keeps the outliers instead of the inliers
    pub fn with_negative(mut self, negative: bool) -> Self {
        self.negative = negative;
        self
    }

    pub fn mean_k(&self) -> usize {
        self.mean_k
    }

    pub fn stddev_mul(&self) -> f64 {
        self.stddev_mul
    }

    /// Returns the indices of the points that pass the filter, in increasing order. `index` must have been
    /// built over `cloud`.
    pub fn filter_indices(&self, cloud: &PointCloud<PointXYZ>, index: &SearchIndex) -> Vec<usize> {
        let mean_distances = cloud
            .points()
            .par_iter()
            .map(|point| {
                if !point.is_finite() {
                    return None;
                }
                // the first neighbour is the point itself
                let neighbors = index.nearest_k(&[point.x, point.y, point.z], self.mean_k + 1);
                let distances = neighbors
                    .iter()
                    .skip(1)
                    .map(|neighbor| (neighbor.squared_distance as f64).sqrt())
                    .collect::<Vec<_>>();
                if distances.is_empty() {
                    Some(0.0)
                } else {
                    Some(distances.iter().sum::<f64>() / distances.len() as f64)
                }
            })
            .collect::<Vec<_>>();

        let valid = mean_distances.iter().flatten().count();
        let sum: f64 = mean_distances.iter().flatten().sum();
        let squared_sum: f64 = mean_distances.iter().flatten().map(|d| d * d).sum();
        let mean = if valid > 0 { sum / valid as f64 } else { 0.0 };
        let stddev = if valid > 1 {
            ((squared_sum - sum * sum / valid as f64) / (valid as f64 - 1.0))
                .max(0.0)
                .sqrt()
        } else {
            0.0
        };
        let threshold = mean + self.stddev_mul * stddev;

        let kept = mean_distances
            .iter()
            .enumerate()
            .filter_map(|(index, distance)| {
                let distance = (*distance)?;
                let is_inlier = distance <= threshold;
                if is_inlier != self.negative {
                    Some(index)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Statistical outlier removal (k = {}, threshold = {:.6}) kept {} of {} points",
            self.mean_k,
            threshold,
            kept.len(),
            cloud.len()
        );
        kept
    }

    pub fn filter(&self, cloud: &PointCloud<PointXYZ>, index: &SearchIndex) -> PointCloud<PointXYZ> {
        self.filter_indices(cloud, index)
            .into_iter()
            .map(|index| cloud[index])
            .collect()
    }
}

/// Removes the statistical outliers of `cloud`, keeping the order of the remaining points.
///
/// ```
/// # use pointbridge_core::containers::{PointCloud, PointXYZ};
/// # use pointbridge_algorithms::outlier_removal::remove_statistical_outliers;
/// let mut cloud: PointCloud<PointXYZ> = (0..100)
///     .map(|i| PointXYZ::new((i % 10) as f32, (i / 10) as f32, 0.0))
///     .collect();
/// cloud.push(PointXYZ::new(100.0, 100.0, 100.0));
/// let filtered = remove_statistical_outliers(&cloud, 8, 1.0).unwrap();
/// assert_eq!(filtered.len(), 100);
/// ```
///
/// # Errors
///
/// If `mean_k` is zero or `stddev_mul` is not finite
pub fn remove_statistical_outliers(
    cloud: &PointCloud<PointXYZ>,
    mean_k: usize,
    stddev_mul: f64,
) -> Result<PointCloud<PointXYZ>> {
    let filter = StatisticalOutlierRemoval::new(mean_k, stddev_mul)?;
    let index = SearchIndex::build(cloud);
    Ok(filter.filter(cloud, &index))
}
