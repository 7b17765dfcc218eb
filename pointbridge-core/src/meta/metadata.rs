use crate::math::AABB;

use std::{any::Any, fmt::Display};

/// Trait that represents metadata of a point cloud, i.e. everything that is not the point data itself.
/// There are common accessors for the bounding box and the point count, and a generic accessor for
/// named fields that depend on the file format the metadata came from.
pub trait Metadata: Display {
    /// Returns the bounding box of the associated `Metadata`, if the format stores one
    fn bounds(&self) -> Option<AABB<f64>>;
    /// Returns the number of points, if known
    fn number_of_points(&self) -> Option<usize>;
    /// Returns the value of the metadata field named `field_name`, if it exists.
    fn get_named_field(&self, field_name: &str) -> Option<Box<dyn Any>>;
    /// Clone the associated `Metadata` and put it into a `Box`
    fn clone_into_box(&self) -> Box<dyn Metadata>;
}
