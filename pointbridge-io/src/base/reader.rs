use anyhow::Result;
use pointbridge_core::containers::{PointCloud, PointXYZ};
use pointbridge_core::meta::Metadata;

/// Base trait for all types that support reading point data
pub trait PointReader {
    /// Read `count` points from this `PointReader` into the end of the given `PointCloud`. Reading stops early
    /// if the underlying source runs out of points. On success, returns the number of points that were read.
    fn read_into(&mut self, cloud: &mut PointCloud<PointXYZ>, count: usize) -> Result<usize>;

    /// Read `count` points from this `PointReader` into a new `PointCloud`
    fn read(&mut self, count: usize) -> Result<PointCloud<PointXYZ>> {
        let mut cloud = PointCloud::new();
        self.read_into(&mut cloud, count)?;
        Ok(cloud)
    }

    /// Returns the `Metadata` of the associated `PointReader`
    fn get_metadata(&self) -> &dyn Metadata;
}
