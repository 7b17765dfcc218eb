use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use anyhow::{anyhow, bail, Result};
use pointbridge_core::{
    containers::{PointCloud, PointXYZ},
    meta::Metadata,
};

use crate::pcd::{PcdDataFormat, PcdReader, PcdWriter};

use super::{PointReader, PointWriter};

#[derive(Debug)]
enum SupportedFileExtensions {
    Pcd,
}

/// Returns a lookup value for the file extension of the given file path
fn get_extension_lookup(path: &Path) -> Result<Option<SupportedFileExtensions>> {
    let extension = match path.extension() {
        Some(ex) => ex,
        None => return Ok(None),
    };
    let extension_str = extension.to_str().ok_or_else(|| {
        anyhow!(
            "File extension of path {} is no valid Unicode string",
            path.display()
        )
    })?;
    match extension_str.to_lowercase().as_str() {
        "pcd" => Ok(Some(SupportedFileExtensions::Pcd)),
        _ => Ok(None),
    }
}

/// A `PointReader` for any supported file format, chosen by file extension
pub enum GenericPointReader {
    Pcd(PcdReader<BufReader<File>>),
}

impl GenericPointReader {
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let extension = get_extension_lookup(path.as_ref())?;
        match extension {
            Some(SupportedFileExtensions::Pcd) => {
                let reader = PcdReader::from_path(path)?;
                Ok(Self::Pcd(reader))
            }
            None => bail!(
                "Unsupported file format of file {}",
                path.as_ref().display()
            ),
        }
    }

    /// Checks whether the given `path` is a valid point cloud file that can be read using a `GenericPointReader`. If yes,
    /// `Ok(true)` is returned, if not `Ok(false)` is returned. `Err` is returned only if there is an error accessing the
    /// `path` or its file extension
    pub fn is_supported_file<P: AsRef<Path>>(path: P) -> Result<bool> {
        Ok(get_extension_lookup(path.as_ref())?.is_some())
    }

    /// Returns the total number of points in the underlying point cloud file, if the format stores it
    pub fn point_count(&self) -> Option<usize> {
        match self {
            GenericPointReader::Pcd(reader) => reader.get_metadata().number_of_points(),
        }
    }

    /// Reads all remaining points, keeping the organization of the file if it stores one
    pub fn read_cloud(&mut self) -> Result<PointCloud<PointXYZ>> {
        match self {
            GenericPointReader::Pcd(reader) => reader.read_cloud(),
        }
    }
}

impl PointReader for GenericPointReader {
    fn read_into(&mut self, cloud: &mut PointCloud<PointXYZ>, count: usize) -> Result<usize> {
        match self {
            GenericPointReader::Pcd(reader) => reader.read_into(cloud, count),
        }
    }

    fn get_metadata(&self) -> &dyn Metadata {
        match self {
            GenericPointReader::Pcd(reader) => reader.get_metadata(),
        }
    }
}

/// A `PointWriter` for any supported file format, chosen by file extension
pub enum GenericPointWriter {
    Pcd(PcdWriter<BufWriter<File>>),
}

impl GenericPointWriter {
    /// Opens a writer for the file at `path`. PCD files are written as ASCII
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let extension = get_extension_lookup(path.as_ref())?;
        match extension {
            Some(SupportedFileExtensions::Pcd) => {
                let writer = PcdWriter::from_path(path, PcdDataFormat::Ascii)?;
                Ok(Self::Pcd(writer))
            }
            None => bail!(
                "Unsupported file format of file {}",
                path.as_ref().display()
            ),
        }
    }
}

impl PointWriter for GenericPointWriter {
    fn write(&mut self, points: &PointCloud<PointXYZ>) -> Result<()> {
        match self {
            GenericPointWriter::Pcd(writer) => writer.write(points),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            GenericPointWriter::Pcd(writer) => writer.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() -> Result<()> {
        assert!(GenericPointReader::is_supported_file("cloud.pcd")?);
        assert!(GenericPointReader::is_supported_file("CLOUD.PCD")?);
        assert!(!GenericPointReader::is_supported_file("cloud.las")?);
        assert!(!GenericPointReader::is_supported_file("cloud")?);
        assert!(GenericPointReader::open_file("cloud.xyz").is_err());
        Ok(())
    }
}
