use std::{any::Any, fmt::Display};

use itertools::Itertools;
use pointbridge_core::{math::AABB, meta::Metadata};

use super::{PcdDataFormat, PcdHeader};

/// `Metadata` implementation for PCD files. Exposes the header entries as named fields (`VERSION`, `FIELDS`,
/// `WIDTH`, `HEIGHT`, `VIEWPOINT`, `POINTS` and `DATA`)
#[derive(Debug, Clone, PartialEq)]
pub struct PcdMetadata {
    header: PcdHeader,
}

impl PcdMetadata {
    pub fn new(header: PcdHeader) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &PcdHeader {
        &self.header
    }

    pub fn width(&self) -> usize {
        self.header.width
    }

    pub fn height(&self) -> usize {
        self.header.height
    }

    /// `true` if the file stores an organized (image-like) cloud
    pub fn is_organized(&self) -> bool {
        self.header.height > 1
    }

    pub fn data_format(&self) -> PcdDataFormat {
        self.header.data
    }
}

impl Metadata for PcdMetadata {
    fn bounds(&self) -> Option<AABB<f64>> {
        None
    }

    fn number_of_points(&self) -> Option<usize> {
        Some(self.header.points)
    }

    fn get_named_field(&self, field_name: &str) -> Option<Box<dyn Any>> {
        match field_name {
            "VERSION" => Some(Box::new(self.header.version.clone())),
            "FIELDS" => Some(Box::new(
                self.header
                    .fields
                    .iter()
                    .map(|field| field.name.clone())
                    .collect::<Vec<_>>(),
            )),
            "WIDTH" => Some(Box::new(self.header.width)),
            "HEIGHT" => Some(Box::new(self.header.height)),
            "VIEWPOINT" => Some(Box::new(self.header.viewpoint)),
            "POINTS" => Some(Box::new(self.header.points)),
            "DATA" => Some(Box::new(self.header.data)),
            _ => None,
        }
    }

    fn clone_into_box(&self) -> Box<dyn Metadata> {
        Box::new(self.clone())
    }
}

impl Display for PcdMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PCD Metadata")?;
        writeln!(f, "\tversion: {}", self.header.version)?;
        writeln!(
            f,
            "\tfields: {}",
            self.header.fields.iter().map(|field| &field.name).join(" ")
        )?;
        writeln!(f, "\twidth: {}", self.header.width)?;
        writeln!(f, "\theight: {}", self.header.height)?;
        writeln!(f, "\tviewpoint: {}", self.header.viewpoint.iter().join(" "))?;
        writeln!(f, "\tpoints: {}", self.header.points)?;
        writeln!(f, "\tdata: {}", self.header.data)
    }
}
