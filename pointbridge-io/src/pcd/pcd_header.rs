use std::{
    fmt::Display,
    io::{BufRead, Write},
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use itertools::Itertools;

/// How the point records of a PCD file are stored after the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdDataFormat {
    Ascii,
    Binary,
    /// LZF compressed per-field columns. Recognized in headers, but not supported for reading or writing
    BinaryCompressed,
}

impl Display for PcdDataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PcdDataFormat::Ascii => write!(f, "ascii"),
            PcdDataFormat::Binary => write!(f, "binary"),
            PcdDataFormat::BinaryCompressed => write!(f, "binary_compressed"),
        }
    }
}

impl FromStr for PcdDataFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ascii" => Ok(Self::Ascii),
            "binary" => Ok(Self::Binary),
            "binary_compressed" => Ok(Self::BinaryCompressed),
            _ => bail!("Unknown PCD data format {}", s),
        }
    }
}

/// The scalar kind of a PCD field (the `TYPE` header entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdFieldType {
    /// `F`
    Float,
    /// `I`
    Signed,
    /// `U`
    Unsigned,
}

impl PcdFieldType {
    fn from_header_str(s: &str) -> Result<Self> {
        match s {
            "F" | "f" => Ok(Self::Float),
            "I" | "i" => Ok(Self::Signed),
            "U" | "u" => Ok(Self::Unsigned),
            _ => bail!("Unknown PCD field type {}", s),
        }
    }

    fn header_str(&self) -> &'static str {
        match self {
            PcdFieldType::Float => "F",
            PcdFieldType::Signed => "I",
            PcdFieldType::Unsigned => "U",
        }
    }
}

/// One entry of the `FIELDS` header line together with its `SIZE`, `TYPE` and `COUNT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcdField {
    pub name: String,
    /// Size of a single element in bytes
    pub size: usize,
    pub field_type: PcdFieldType,
    /// Number of elements per point
    pub count: usize,
}

impl PcdField {
    pub fn new(name: &str, size: usize, field_type: PcdFieldType, count: usize) -> Self {
        Self {
            name: name.to_owned(),
            size,
            field_type,
            count,
        }
    }

    /// Size in bytes of this field within one binary point record
    pub fn byte_size(&self) -> usize {
        self.size * self.count
    }

    fn is_valid_size(&self) -> bool {
        match self.field_type {
            PcdFieldType::Float => self.size == 4 || self.size == 8,
            PcdFieldType::Signed | PcdFieldType::Unsigned => {
                matches!(self.size, 1 | 2 | 4 | 8)
            }
        }
    }
}

/// Location of a single scalar within a point record: the element index among all whitespace-separated values
/// of an ASCII line and the byte offset within a binary record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcdScalarLocation {
    pub element_index: usize,
    pub byte_offset: usize,
    pub size: usize,
    pub field_type: PcdFieldType,
}

/// The header of a PCD file
#[derive(Debug, Clone, PartialEq)]
pub struct PcdHeader {
    pub version: String,
    pub fields: Vec<PcdField>,
    pub width: usize,
    pub height: usize,
    /// Translation (x y z) followed by the orientation quaternion (w x y z)
    pub viewpoint: [f64; 7],
    pub points: usize,
    pub data: PcdDataFormat,
}

pub const DEFAULT_VIEWPOINT: [f64; 7] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

impl PcdHeader {
    /// Header for `width * height` points with the three float fields `x`, `y` and `z`
    pub fn for_xyz(width: usize, height: usize, data: PcdDataFormat) -> Self {
        Self {
            version: "0.7".to_owned(),
            fields: ["x", "y", "z"]
                .iter()
                .map(|name| PcdField::new(name, 4, PcdFieldType::Float, 1))
                .collect(),
            width,
            height,
            viewpoint: DEFAULT_VIEWPOINT,
            points: width * height,
            data,
        }
    }

    /// Size in bytes of one binary point record
    pub fn point_record_size(&self) -> usize {
        self.fields.iter().map(PcdField::byte_size).sum()
    }

    /// Number of whitespace separated values in one ASCII point record
    pub fn point_element_count(&self) -> usize {
        self.fields.iter().map(|field| field.count).sum()
    }

    /// Location of the first element of the field called `name`
    pub fn locate_field(&self, name: &str) -> Option<PcdScalarLocation> {
        let mut element_index = 0;
        let mut byte_offset = 0;
        for field in &self.fields {
            if field.name == name {
                return Some(PcdScalarLocation {
                    element_index,
                    byte_offset,
                    size: field.size,
                    field_type: field.field_type,
                });
            }
            element_index += field.count;
            byte_offset += field.byte_size();
        }
        None
    }

    /// Reads a header from `reader`, leaving it positioned at the first byte after the `DATA` line
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut version = None;
        let mut names: Option<Vec<String>> = None;
        let mut sizes: Option<Vec<usize>> = None;
        let mut types: Option<Vec<PcdFieldType>> = None;
        let mut counts: Option<Vec<usize>> = None;
        let mut width: Option<usize> = None;
        let mut height = None;
        let mut viewpoint = DEFAULT_VIEWPOINT;
        let mut points = None;
        let mut data = None;

        let mut line = String::new();
        while data.is_none() {
            line.clear();
            let bytes_read = reader
                .read_line(&mut line)
                .context("Could not read PCD header line")?;
            if bytes_read == 0 {
                bail!("Unexpected end of file in PCD header, no DATA line found");
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut tokens = trimmed.split_whitespace();
            let keyword = tokens.next().unwrap_or_default();
            let values = tokens.collect::<Vec<_>>();
            match keyword.to_uppercase().as_str() {
                "VERSION" => version = values.first().map(|v| v.to_string()),
                "FIELDS" | "COLUMNS" => {
                    names = Some(values.iter().map(|v| v.to_string()).collect())
                }
                "SIZE" => sizes = Some(parse_values(keyword, &values)?),
                "TYPE" => {
                    types = Some(
                        values
                            .iter()
                            .map(|v| PcdFieldType::from_header_str(v))
                            .collect::<Result<Vec<_>>>()?,
                    )
                }
                "COUNT" => counts = Some(parse_values(keyword, &values)?),
                "WIDTH" => width = Some(parse_single(keyword, &values)?),
                "HEIGHT" => height = Some(parse_single(keyword, &values)?),
                "POINTS" => points = Some(parse_single(keyword, &values)?),
                "VIEWPOINT" => {
                    let parsed: Vec<f64> = parse_values(keyword, &values)?;
                    if parsed.len() != 7 {
                        bail!(
                            "VIEWPOINT needs 7 values (translation and quaternion), got {}",
                            parsed.len()
                        );
                    }
                    viewpoint.copy_from_slice(&parsed);
                }
                "DATA" => {
                    let format = values
                        .first()
                        .ok_or_else(|| anyhow!("DATA line in PCD header names no data format"))?;
                    data = Some(format.parse::<PcdDataFormat>()?);
                }
                _ => log::warn!("Ignoring unknown PCD header line '{}'", trimmed),
            }
        }

        let names = names.ok_or_else(|| anyhow!("PCD header has no FIELDS line"))?;
        let sizes = sizes.ok_or_else(|| anyhow!("PCD header has no SIZE line"))?;
        let types = types.ok_or_else(|| anyhow!("PCD header has no TYPE line"))?;
        let counts = counts.unwrap_or_else(|| vec![1; names.len()]);
        if sizes.len() != names.len() || types.len() != names.len() || counts.len() != names.len()
        {
            bail!(
                "PCD header declares {} fields, but {} sizes, {} types and {} counts",
                names.len(),
                sizes.len(),
                types.len(),
                counts.len()
            );
        }
        let fields = names
            .iter()
            .zip(sizes)
            .zip(types)
            .zip(counts)
            .map(|(((name, size), field_type), count)| PcdField::new(name, size, field_type, count))
            .collect::<Vec<_>>();
        if let Some(field) = fields.iter().find(|field| !field.is_valid_size()) {
            bail!(
                "PCD field {} has unsupported size {} for type {}",
                field.name,
                field.size,
                field.field_type.header_str()
            );
        }
        if let Some(field) = fields.iter().find(|field| field.count == 0) {
            bail!("PCD field {} has COUNT 0", field.name);
        }
        // record sizes and offsets are summed without overflow checks later on
        fields
            .iter()
            .try_fold((0usize, 0usize), |(bytes, elements), field| {
                let field_bytes = field.size.checked_mul(field.count)?;
                Some((
                    bytes.checked_add(field_bytes)?,
                    elements.checked_add(field.count)?,
                ))
            })
            .ok_or_else(|| anyhow!("PCD field COUNT values are too large"))?;

        let width = width.ok_or_else(|| anyhow!("PCD header has no WIDTH line"))?;
        let height = height.unwrap_or(1);
        let grid_points = width.checked_mul(height).ok_or_else(|| {
            anyhow!(
                "PCD header has WIDTH ({}) x HEIGHT ({}) out of range",
                width,
                height
            )
        })?;
        let points = points.unwrap_or(grid_points);
        if points != grid_points {
            bail!(
                "PCD header has WIDTH ({}) x HEIGHT ({}) != POINTS ({})",
                width,
                height,
                points
            );
        }

        Ok(Self {
            version: version.unwrap_or_else(|| "0.7".to_owned()),
            fields,
            width,
            height,
            viewpoint,
            points,
            // the loop only ends once DATA was parsed
            data: data.unwrap_or(PcdDataFormat::Ascii),
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "# .PCD v{} - Point Cloud Data file format", self.version)?;
        writeln!(writer, "VERSION {}", self.version)?;
        writeln!(
            writer,
            "FIELDS {}",
            self.fields.iter().map(|field| &field.name).join(" ")
        )?;
        writeln!(
            writer,
            "SIZE {}",
            self.fields.iter().map(|field| field.size).join(" ")
        )?;
        writeln!(
            writer,
            "TYPE {}",
            self.fields
                .iter()
                .map(|field| field.field_type.header_str())
                .join(" ")
        )?;
        writeln!(
            writer,
            "COUNT {}",
            self.fields.iter().map(|field| field.count).join(" ")
        )?;
        writeln!(writer, "WIDTH {}", self.width)?;
        writeln!(writer, "HEIGHT {}", self.height)?;
        writeln!(writer, "VIEWPOINT {}", self.viewpoint.iter().join(" "))?;
        writeln!(writer, "POINTS {}", self.points)?;
        writeln!(writer, "DATA {}", self.data)?;
        Ok(())
    }
}

fn parse_values<T: FromStr>(keyword: &str, values: &[&str]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| anyhow!("Invalid value {} in PCD header line {}", value, keyword))
        })
        .collect()
}

fn parse_single<T: FromStr>(keyword: &str, values: &[&str]) -> Result<T> {
    match values {
        [value] => value
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid value {} in PCD header line {}", value, keyword)),
        _ => bail!(
            "PCD header line {} needs exactly one value, got {}",
            keyword,
            values.len()
        ),
    }
}
