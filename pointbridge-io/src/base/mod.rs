use anyhow::{Context, Result};
use pointbridge_core::containers::{PointCloud, PointXYZ};
use std::path::Path;

mod reader;
pub use self::reader::*;

mod writer;
pub use self::writer::*;

mod io_factory;
pub use self::io_factory::*;

/// Try to read all points in the given point cloud file. The file type is determined from the file extension of
/// `path`. If this succeeds, an appropriate reader is created and all points are read into a `PointCloud`, which
/// is organized if the file stores an organized cloud.
pub fn read_all<P: AsRef<Path>>(path: P) -> Result<PointCloud<PointXYZ>> {
    let mut reader = GenericPointReader::open_file(path.as_ref()).context(format!(
        "Could not create appropriate reader for point cloud file {}",
        path.as_ref().display()
    ))?;
    reader.read_cloud()
}

/// Writes all points in the given `cloud` into the file at `path`
pub fn write_all<P: AsRef<Path>>(cloud: &PointCloud<PointXYZ>, path: P) -> Result<()> {
    let mut writer = GenericPointWriter::open_file(path.as_ref()).context(format!(
        "Could not create appropriate writer for point cloud file {}",
        path.as_ref().display()
    ))?;
    writer.write(cloud).context("Failed to write points")?;
    writer.flush()
}
