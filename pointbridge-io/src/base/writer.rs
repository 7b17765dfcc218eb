use anyhow::Result;
use pointbridge_core::containers::{PointCloud, PointXYZ};

/// Base trait for all types that support writing point data
pub trait PointWriter {
    /// Write the points in the given `PointCloud` to the associated `PointWriter`.
    fn write(&mut self, points: &PointCloud<PointXYZ>) -> Result<()>;
    /// Flush this `PointWriter`, ensuring that all points are written to their destination and that all required
    /// metadata is written as well
    fn flush(&mut self) -> Result<()>;
}
