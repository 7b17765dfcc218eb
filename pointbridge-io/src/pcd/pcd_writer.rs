use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use pointbridge_core::containers::{PointCloud, PointXYZ};

use crate::base::PointWriter;

use super::{PcdDataFormat, PcdHeader};

/// `PointWriter` implementation for PCD files with the fields `x`, `y` and `z`.
///
/// Since the PCD header stores the number of points, all points passed to `write` are collected and written
/// together with the header on `flush`. A single written cloud keeps its organization (`WIDTH` and `HEIGHT`),
/// multiple clouds are concatenated into an unorganized cloud. After `flush`, no more points can be written.
pub struct PcdWriter<W: Write> {
    writer: W,
    data_format: PcdDataFormat,
    points: PointCloud<PointXYZ>,
    num_writes: usize,
    finished: bool,
}

impl PcdWriter<BufWriter<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P, data_format: PcdDataFormat) -> Result<Self> {
        let file = File::create(path.as_ref()).with_context(|| {
            format!(
                "Could not open file {} for writing",
                path.as_ref().display()
            )
        })?;
        Self::from_write(BufWriter::new(file), data_format)
    }
}

impl<W: Write> PcdWriter<W> {
    pub fn from_write(write: W, data_format: PcdDataFormat) -> Result<Self> {
        if data_format == PcdDataFormat::BinaryCompressed {
            bail!("Writing binary_compressed PCD data is not supported");
        }
        Ok(Self {
            writer: write,
            data_format,
            points: PointCloud::new(),
            num_writes: 0,
            finished: false,
        })
    }

    pub fn data_format(&self) -> PcdDataFormat {
        self.data_format
    }

    /// Flushes the writer and returns the underlying `Write`
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }

    fn write_header_and_points(&mut self) -> Result<()> {
        let header = PcdHeader::for_xyz(self.points.width(), self.points.height(), self.data_format);
        header.write_to(&mut self.writer)?;
        match self.data_format {
            PcdDataFormat::Ascii => {
                for point in self.points.iter() {
                    writeln!(
                        self.writer,
                        "{} {} {}",
                        format_ascii_value(point.x),
                        format_ascii_value(point.y),
                        format_ascii_value(point.z)
                    )?;
                }
            }
            PcdDataFormat::Binary => {
                for point in self.points.iter() {
                    self.writer.write_f32::<LittleEndian>(point.x)?;
                    self.writer.write_f32::<LittleEndian>(point.y)?;
                    self.writer.write_f32::<LittleEndian>(point.z)?;
                }
            }
            PcdDataFormat::BinaryCompressed => {
                bail!("Writing binary_compressed PCD data is not supported")
            }
        }
        log::debug!(
            "Wrote {} points ({} x {}) as {} PCD",
            self.points.len(),
            header.width,
            header.height,
            self.data_format
        );
        Ok(())
    }
}

impl<W: Write> PointWriter for PcdWriter<W> {
    fn write(&mut self, points: &PointCloud<PointXYZ>) -> Result<()> {
        if self.finished {
            bail!("Can't write points to a PCD file that was already flushed");
        }
        if self.num_writes == 0 {
            self.points = points.clone();
        } else {
            self.points.extend(points.iter().copied());
        }
        self.num_writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.finished {
            self.finished = true;
            self.write_header_and_points()?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Formats a coordinate in its shortest form that parses back to the same `f32`
fn format_ascii_value(value: f32) -> String {
    if value.is_nan() {
        "nan".to_owned()
    } else {
        // `Display` for floats never uses exponents and yields `inf` / `-inf` for infinities
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::{base::PointReader, pcd::PcdReader};

    use super::*;

    fn write_to_memory(clouds: &[PointCloud<PointXYZ>], data_format: PcdDataFormat) -> Result<Vec<u8>> {
        let mut writer = PcdWriter::from_write(Cursor::new(vec![]), data_format)?;
        for cloud in clouds {
            writer.write(cloud)?;
        }
        Ok(writer.into_inner()?.into_inner())
    }

    fn test_points() -> PointCloud<PointXYZ> {
        vec![
            PointXYZ::new(0.1, -2.5, 1e-7),
            PointXYZ::new(f32::NAN, 0.0, -0.0),
            PointXYZ::new(f32::MAX, f32::MIN_POSITIVE, 123456.79),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_ascii_layout() -> Result<()> {
        let bytes = write_to_memory(&[test_points()], PcdDataFormat::Ascii)?;
        let text = String::from_utf8(bytes)?;
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "# .PCD v0.7 - Point Cloud Data file format");
        assert_eq!(lines[1], "VERSION 0.7");
        assert_eq!(lines[2], "FIELDS x y z");
        assert_eq!(lines[6], "WIDTH 3");
        assert_eq!(lines[7], "HEIGHT 1");
        assert_eq!(lines[9], "POINTS 3");
        assert_eq!(lines[10], "DATA ascii");
        assert_eq!(lines[11], "0.1 -2.5 0.0000001");
        assert_eq!(lines[12], "nan 0 -0");
        assert_eq!(lines.len(), 14);
        Ok(())
    }

    #[test]
    fn test_round_trip_is_bit_identical() -> Result<()> {
        let expected = test_points();
        for data_format in [PcdDataFormat::Ascii, PcdDataFormat::Binary] {
            let bytes = write_to_memory(&[expected.clone()], data_format)?;
            let actual = PcdReader::from_read(Cursor::new(bytes))?.read_cloud()?;
            assert_eq!(actual.len(), expected.len());
            for (a, e) in actual.iter().zip(expected.iter()) {
                assert_eq!(a.x.is_nan(), e.x.is_nan());
                if !e.x.is_nan() {
                    assert_eq!(a.x.to_bits(), e.x.to_bits());
                }
                assert_eq!(a.y.to_bits(), e.y.to_bits());
                assert_eq!(a.z.to_bits(), e.z.to_bits());
            }
        }
        Ok(())
    }

    #[test]
    fn test_organized_and_concatenated_writes() -> Result<()> {
        let mut organized = (0..6)
            .map(|i| PointXYZ::new(i as f32, 0.0, 0.0))
            .collect::<PointCloud<PointXYZ>>();
        organized.organize(3, 2)?;

        let bytes = write_to_memory(&[organized.clone()], PcdDataFormat::Binary)?;
        let read = PcdReader::from_read(Cursor::new(bytes))?.read_cloud()?;
        assert_eq!(read, organized);

        let bytes = write_to_memory(&[organized.clone(), organized], PcdDataFormat::Ascii)?;
        let mut reader = PcdReader::from_read(Cursor::new(bytes))?;
        assert_eq!(reader.get_metadata().number_of_points(), Some(12));
        let read = reader.read_cloud()?;
        assert!(!read.is_organized());
        assert_eq!(read.len(), 12);
        Ok(())
    }

    #[test]
    fn test_empty_cloud() -> Result<()> {
        let bytes = write_to_memory(&[PointCloud::new()], PcdDataFormat::Ascii)?;
        let read = PcdReader::from_read(Cursor::new(bytes))?.read_cloud()?;
        assert!(read.is_empty());
        Ok(())
    }

    #[test]
    fn test_write_after_flush_fails() -> Result<()> {
        let mut writer = PcdWriter::from_write(Cursor::new(vec![]), PcdDataFormat::Ascii)?;
        writer.write(&test_points())?;
        writer.flush()?;
        assert!(writer.write(&test_points()).is_err());
        assert!(PcdWriter::from_write(Cursor::new(vec![]), PcdDataFormat::BinaryCompressed).is_err());
        Ok(())
    }
}
