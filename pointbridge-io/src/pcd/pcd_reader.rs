use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use pointbridge_core::{
    containers::{PointCloud, PointXYZ},
    meta::Metadata,
};

use crate::base::PointReader;

use super::{PcdDataFormat, PcdFieldType, PcdHeader, PcdMetadata, PcdScalarLocation};

/// `PointReader` implementation for PCD files with `ascii` or `binary` data. The `x`, `y` and `z` fields are read
/// from any combination of fields, all other fields are skipped.
pub struct PcdReader<R: BufRead> {
    reader: R,
    metadata: PcdMetadata,
    xyz: [PcdScalarLocation; 3],
    /// Indices into `xyz` in the order the coordinates appear within a binary record
    binary_order: [usize; 3],
    record_size: usize,
    current_point_index: usize,
    line_buffer: String,
}

impl PcdReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).with_context(|| {
            format!("Could not open PCD file {}", path.as_ref().display())
        })?;
        Self::from_read(BufReader::new(file))
            .with_context(|| format!("Could not read PCD file {}", path.as_ref().display()))
    }
}

impl<R: BufRead> PcdReader<R> {
    /// Creates a `PcdReader` from the given `read`, parsing the PCD header
    ///
    /// # Errors
    ///
    /// If the header is malformed, has no `x`, `y` or `z` field or the data is stored as `binary_compressed`
    pub fn from_read(mut read: R) -> Result<Self> {
        let header = PcdHeader::read_from(&mut read)?;
        if header.data == PcdDataFormat::BinaryCompressed {
            bail!("Reading binary_compressed PCD data is not supported");
        }
        let locate = |name: &str| {
            header
                .locate_field(name)
                .ok_or_else(|| anyhow!("PCD file has no field {}", name))
        };
        let xyz = [locate("x")?, locate("y")?, locate("z")?];
        log::trace!(
            "Opened PCD file with {} points stored as {}",
            header.points,
            header.data
        );

        let mut binary_order = [0, 1, 2];
        binary_order.sort_by_key(|&axis| xyz[axis].byte_offset);
        let record_size = header.point_record_size();
        Ok(Self {
            reader: read,
            metadata: PcdMetadata::new(header),
            xyz,
            binary_order,
            record_size,
            current_point_index: 0,
            line_buffer: String::new(),
        })
    }

    pub fn header(&self) -> &PcdHeader {
        self.metadata.header()
    }

    /// Number of points that have not been read yet
    pub fn remaining_points(&self) -> usize {
        self.metadata.header().points - self.current_point_index
    }

    /// Reads all remaining points. If no point was read before, the returned cloud carries the `WIDTH` and
    /// `HEIGHT` of the file.
    ///
    /// The cloud grows with the points actually read, a header claiming more points than the file holds fails
    /// once the data runs out
    pub fn read_cloud(&mut self) -> Result<PointCloud<PointXYZ>> {
        let is_whole_file = self.current_point_index == 0;
        let remaining = self.remaining_points();
        let mut cloud = PointCloud::new();
        self.read_into(&mut cloud, remaining)?;
        if is_whole_file && self.metadata.is_organized() {
            cloud.organize(self.metadata.width(), self.metadata.height())?;
        }
        Ok(cloud)
    }

    fn read_ascii_point(&mut self) -> Result<PointXYZ> {
        loop {
            self.line_buffer.clear();
            if self.reader.read_line(&mut self.line_buffer)? == 0 {
                bail!(
                    "PCD file ends after {} of {} points",
                    self.current_point_index,
                    self.metadata.header().points
                );
            }
            if !self.line_buffer.trim().is_empty() {
                break;
            }
        }

        let values = self.line_buffer.split_whitespace().collect::<Vec<_>>();
        let expected = self.metadata.header().point_element_count();
        if values.len() < expected {
            bail!(
                "PCD point {} has {} values, expected {}",
                self.current_point_index,
                values.len(),
                expected
            );
        }
        let mut coordinates = [0.0f32; 3];
        for (coordinate, location) in coordinates.iter_mut().zip(self.xyz.iter()) {
            let value = values[location.element_index];
            *coordinate = parse_ascii_scalar(value, location).with_context(|| {
                format!(
                    "Invalid value {} in PCD point {}",
                    value, self.current_point_index
                )
            })?;
        }
        Ok(coordinates.into())
    }

    fn read_binary_point(&mut self) -> Result<PointXYZ> {
        let current_point_index = self.current_point_index;
        let points = self.metadata.header().points;
        self.read_binary_record()
            .with_context(|| format!("PCD file ends after {} of {} points", current_point_index, points))
    }

    /// Reads the coordinates of one binary record, skipping the bytes of all other fields
    fn read_binary_record(&mut self) -> Result<PointXYZ> {
        let mut coordinates = [0.0f32; 3];
        let mut position = 0;
        for &axis in &self.binary_order {
            let location = self.xyz[axis];
            skip_bytes(&mut self.reader, location.byte_offset - position)?;
            let mut scalar = [0u8; 8];
            self.reader.read_exact(&mut scalar[..location.size])?;
            coordinates[axis] = decode_binary_scalar(&scalar[..location.size], location.field_type) as f32;
            position = location.byte_offset + location.size;
        }
        skip_bytes(&mut self.reader, self.record_size - position)?;
        Ok(coordinates.into())
    }
}

impl<R: BufRead> PointReader for PcdReader<R> {
    fn read_into(&mut self, cloud: &mut PointCloud<PointXYZ>, count: usize) -> Result<usize> {
        let num_to_read = count.min(self.remaining_points());
        for _ in 0..num_to_read {
            let point = match self.metadata.data_format() {
                PcdDataFormat::Ascii => self.read_ascii_point()?,
                PcdDataFormat::Binary => self.read_binary_point()?,
                PcdDataFormat::BinaryCompressed => {
                    bail!("Reading binary_compressed PCD data is not supported")
                }
            };
            cloud.push(point);
            self.current_point_index += 1;
        }
        Ok(num_to_read)
    }

    fn get_metadata(&self) -> &dyn Metadata {
        &self.metadata
    }
}

/// Parses one ASCII value. Accepts the `nan` spellings that C and C++ printf produce. 4-byte floats are parsed
/// as `f32` directly so that values written in shortest round-trip form read back bit-identical
fn parse_ascii_scalar(value: &str, location: &PcdScalarLocation) -> Result<f32> {
    let unsigned = value.trim_start_matches(|c: char| c == '-' || c == '+');
    if unsigned.eq_ignore_ascii_case("nan") {
        return Ok(f32::NAN);
    }
    let parsed = if location.field_type == PcdFieldType::Float && location.size == 4 {
        value.parse::<f32>().map_err(|e| e.to_string())
    } else {
        value
            .parse::<f64>()
            .map(|v| v as f32)
            .map_err(|e| e.to_string())
    };
    parsed.map_err(|e| anyhow!("{} is not a number ({})", value, e))
}

fn skip_bytes<R: Read>(reader: &mut R, count: usize) -> Result<()> {
    let skipped = io::copy(&mut reader.take(count as u64), &mut io::sink())?;
    if skipped != count as u64 {
        bail!("Unexpected end of file");
    }
    Ok(())
}

fn decode_binary_scalar(bytes: &[u8], field_type: PcdFieldType) -> f64 {
    match (field_type, bytes.len()) {
        (PcdFieldType::Float, 4) => LittleEndian::read_f32(bytes) as f64,
        (PcdFieldType::Float, _) => LittleEndian::read_f64(bytes),
        (PcdFieldType::Signed, 1) => bytes[0] as i8 as f64,
        (PcdFieldType::Signed, 2) => LittleEndian::read_i16(bytes) as f64,
        (PcdFieldType::Signed, 4) => LittleEndian::read_i32(bytes) as f64,
        (PcdFieldType::Signed, _) => LittleEndian::read_i64(bytes) as f64,
        (PcdFieldType::Unsigned, 1) => bytes[0] as f64,
        (PcdFieldType::Unsigned, 2) => LittleEndian::read_u16(bytes) as f64,
        (PcdFieldType::Unsigned, 4) => LittleEndian::read_u32(bytes) as f64,
        (PcdFieldType::Unsigned, _) => LittleEndian::read_u64(bytes) as f64,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use byteorder::WriteBytesExt;

    use super::*;

    #[test]
    fn test_read_ascii_with_extra_fields() -> Result<()> {
        let text = "# comment
VERSION 0.7
FIELDS rgb x normal y z
SIZE 4 4 4 4 4
TYPE U F F F F
COUNT 1 1 3 1 1
WIDTH 2
HEIGHT 1
POINTS 2
DATA ascii
4278190080 1.5 0 0 1 -2 3e2

7 nan 0 0 1 -nan 0.25
";
        let mut reader = PcdReader::from_read(Cursor::new(text))?;
        assert_eq!(reader.get_metadata().number_of_points(), Some(2));
        let cloud = reader.read(10)?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud[0], PointXYZ::new(1.5, -2.0, 300.0));
        assert!(cloud[1].x.is_nan());
        assert!(cloud[1].y.is_nan());
        assert_eq!(cloud[1].z, 0.25);
        assert_eq!(reader.remaining_points(), 0);
        Ok(())
    }

    #[test]
    fn test_read_binary_mixed_types() -> Result<()> {
        let mut bytes = b"FIELDS x y z i\nSIZE 8 2 4 1\nTYPE F I U U\nWIDTH 2\nHEIGHT 1\nDATA binary\n".to_vec();
        for (x, y, z) in [(0.5f64, -3i16, 7u32), (-1.25, 12, 0)] {
            bytes.write_f64::<LittleEndian>(x)?;
            bytes.write_i16::<LittleEndian>(y)?;
            bytes.write_u32::<LittleEndian>(z)?;
            bytes.write_u8(255)?;
        }
        let cloud = PcdReader::from_read(Cursor::new(bytes))?.read_cloud()?;
        assert_eq!(
            cloud.into_points(),
            vec![PointXYZ::new(0.5, -3.0, 7.0), PointXYZ::new(-1.25, 12.0, 0.0)]
        );
        Ok(())
    }

    #[test]
    fn test_read_binary_out_of_order_fields() -> Result<()> {
        let mut bytes = b"FIELDS normal z x y\nSIZE 4 4 4 8\nTYPE F F F F\nCOUNT 3 1 1 1\nWIDTH 1\nDATA binary\n".to_vec();
        for normal in [0.0f32, 0.0, 1.0] {
            bytes.write_f32::<LittleEndian>(normal)?;
        }
        bytes.write_f32::<LittleEndian>(3.0)?;
        bytes.write_f32::<LittleEndian>(1.0)?;
        bytes.write_f64::<LittleEndian>(2.0)?;
        let cloud = PcdReader::from_read(Cursor::new(bytes))?.read_cloud()?;
        assert_eq!(cloud.into_points(), vec![PointXYZ::new(1.0, 2.0, 3.0)]);
        Ok(())
    }

    #[test]
    fn test_point_count_beyond_data_fails() -> Result<()> {
        let ascii = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 4000000000000\nHEIGHT 1\nDATA ascii\n0 0 0\n";
        assert!(PcdReader::from_read(Cursor::new(ascii))?.read_cloud().is_err());

        let ascii = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 1000000000000000000\nDATA ascii\n0 0 0\n";
        assert!(PcdReader::from_read(Cursor::new(ascii))?.read_cloud().is_err());

        // a huge field in front of the coordinates is skipped, not buffered
        let mut binary =
            b"FIELDS hist x y z\nSIZE 1 4 4 4\nTYPE U F F F\nCOUNT 1000000000000 1 1 1\nWIDTH 1\nDATA binary\n"
                .to_vec();
        binary.extend_from_slice(&[0u8; 64]);
        assert!(PcdReader::from_read(Cursor::new(binary))?.read_cloud().is_err());
        Ok(())
    }

    #[test]
    fn test_organized_cloud_keeps_dimensions() -> Result<()> {
        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 2\nHEIGHT 2\nDATA ascii\n0 0 0\n1 0 0\n0 1 0\n1 1 0\n";
        let cloud = PcdReader::from_read(Cursor::new(text))?.read_cloud()?;
        assert!(cloud.is_organized());
        assert_eq!((cloud.width(), cloud.height()), (2, 2));
        Ok(())
    }

    #[test]
    fn test_truncated_data() -> Result<()> {
        let ascii = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 3\nDATA ascii\n0 0 0\n1 1 1\n";
        assert!(PcdReader::from_read(Cursor::new(ascii))?.read_cloud().is_err());

        let short_line = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 1\nDATA ascii\n0 0\n";
        assert!(PcdReader::from_read(Cursor::new(short_line))?
            .read_cloud()
            .is_err());

        let mut binary = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 2\nDATA binary\n".to_vec();
        binary.extend_from_slice(&[0u8; 20]);
        assert!(PcdReader::from_read(Cursor::new(binary))?.read_cloud().is_err());
        Ok(())
    }

    #[test]
    fn test_unsupported_files() {
        let compressed = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 0\nDATA binary_compressed\n";
        assert!(PcdReader::from_read(Cursor::new(compressed)).is_err());
        let no_z = "FIELDS x y\nSIZE 4 4\nTYPE F F\nWIDTH 0\nDATA ascii\n";
        assert!(PcdReader::from_read(Cursor::new(no_z)).is_err());
        let garbage = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 1\nDATA ascii\n0 zero 0\n";
        assert!(PcdReader::from_read(Cursor::new(garbage))
            .and_then(|mut reader| reader.read_cloud())
            .is_err());
    }

    #[test]
    fn test_read_in_chunks() -> Result<()> {
        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 5\nDATA ascii\n0 0 0\n1 0 0\n2 0 0\n3 0 0\n4 0 0\n";
        let mut reader = PcdReader::from_read(Cursor::new(text))?;
        let mut cloud = PointCloud::new();
        assert_eq!(reader.read_into(&mut cloud, 2)?, 2);
        assert_eq!(reader.read_into(&mut cloud, 2)?, 2);
        assert_eq!(reader.read_into(&mut cloud, 2)?, 1);
        assert_eq!(reader.read_into(&mut cloud, 2)?, 0);
        assert_eq!(cloud.iter().map(|p| p.x).collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        Ok(())
    }
}
