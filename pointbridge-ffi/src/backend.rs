use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use pointbridge_algorithms::{
    normal_estimation::NormalEstimation,
    outlier_removal::StatisticalOutlierRemoval,
    search::{Neighborhood, SearchIndex},
    segmentation::ransac_plane_par,
    voxel_grid::VoxelGrid,
};
use pointbridge_core::containers::{Normal, PointCloud, PointXYZ};
use pointbridge_io::{
    base::PointWriter,
    pcd::{PcdDataFormat, PcdReader, PcdWriter},
};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::BridgeConfig;

/// The capabilities the boundary needs from a point cloud library. Every boundary call builds its own
/// container and search index through these, nothing is kept between calls
pub trait PointBackend {
    /// Builds a point container from a flat `(x, y, z)` buffer. The container owns a copy of the values
    fn build_point_container(&self, flat: &[f32]) -> PointCloud<PointXYZ> {
        PointCloud::from_flat(flat)
    }

    fn build_search_index(&self, cloud: &PointCloud<PointXYZ>) -> SearchIndex {
        SearchIndex::build(cloud)
    }

    /// Estimates one normal per point of `cloud`
    fn estimate_normals(
        &self,
        cloud: &PointCloud<PointXYZ>,
        index: &SearchIndex,
        neighborhood: Neighborhood,
    ) -> PointCloud<Normal>;

    /// Voxel grid filter with the same leaf size on all three axes
    fn voxel_filter(&self, cloud: &PointCloud<PointXYZ>, leaf_size: f32) -> PointCloud<PointXYZ>;

    fn load_file(&self, path: &Path) -> Result<PointCloud<PointXYZ>>;

    /// Writes `cloud` as an ASCII PCD file, keeping its organization
    fn save_file_ascii(&self, path: &Path, cloud: &PointCloud<PointXYZ>) -> Result<()>;

    fn remove_statistical_outliers(
        &self,
        cloud: &PointCloud<PointXYZ>,
        mean_k: usize,
        stddev_mul: f64,
    ) -> Result<PointCloud<PointXYZ>>;

    /// Returns the sorted indices of the points on the dominant plane of `cloud`
    fn segment_plane(&self, cloud: &PointCloud<PointXYZ>, distance_threshold: f64) -> Result<Vec<usize>>;
}

/// [`PointBackend`] on top of `pointbridge-algorithms` and `pointbridge-io`
pub struct DefaultBackend {
    config: BridgeConfig,
    pool: Option<ThreadPool>,
}

impl DefaultBackend {
    /// Creates a backend with its own thread pool of `config.threads` workers. With `threads == 0`, or if the
    /// pool can't be created, work runs on the global rayon pool
    pub fn new(config: BridgeConfig) -> Self {
        let pool = match config.threads {
            0 => None,
            threads => match ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!(
                        "Could not create a thread pool with {} threads, using the global pool: {}",
                        threads,
                        e
                    );
                    None
                }
            },
        };
        Self { config, pool }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn install<R: Send, F: FnOnce() -> R + Send>(&self, work: F) -> R {
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

impl Default for DefaultBackend {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl PointBackend for DefaultBackend {
    fn estimate_normals(
        &self,
        cloud: &PointCloud<PointXYZ>,
        index: &SearchIndex,
        neighborhood: Neighborhood,
    ) -> PointCloud<Normal> {
        let estimation = NormalEstimation::new(neighborhood).with_viewpoint(self.config.viewpoint);
        self.install(|| estimation.compute(cloud, index))
    }

    fn voxel_filter(&self, cloud: &PointCloud<PointXYZ>, leaf_size: f32) -> PointCloud<PointXYZ> {
        VoxelGrid::new(leaf_size as f64).filter(cloud)
    }

    fn load_file(&self, path: &Path) -> Result<PointCloud<PointXYZ>> {
        PcdReader::from_path(path)?.read_cloud()
    }

    fn save_file_ascii(&self, path: &Path, cloud: &PointCloud<PointXYZ>) -> Result<()> {
        let mut writer = PcdWriter::from_path(path, PcdDataFormat::Ascii)?;
        writer.write(cloud)?;
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove_statistical_outliers(
        &self,
        cloud: &PointCloud<PointXYZ>,
        mean_k: usize,
        stddev_mul: f64,
    ) -> Result<PointCloud<PointXYZ>> {
        let filter = StatisticalOutlierRemoval::new(mean_k, stddev_mul)?;
        let index = self.build_search_index(cloud);
        Ok(self.install(|| filter.filter(cloud, &index)))
    }

    fn segment_plane(&self, cloud: &PointCloud<PointXYZ>, distance_threshold: f64) -> Result<Vec<usize>> {
        let iterations = self.config.ransac_iterations;
        let (_plane, inliers) = self.install(|| ransac_plane_par(cloud, distance_threshold, iterations))?;
        Ok(inliers)
    }
}

lazy_static! {
    static ref DEFAULT_BACKEND: DefaultBackend = {
        // a logger installed by the host process wins
        let _ = pretty_env_logger::try_init();
        let config = BridgeConfig::from_env();
        log::debug!("Creating the default backend with {:?}", config);
        DefaultBackend::new(config)
    };
}

/// The process-wide backend used by the `extern "C"` entry points, configured from the environment on first use
pub fn default_backend() -> &'static DefaultBackend {
    &DEFAULT_BACKEND
}
