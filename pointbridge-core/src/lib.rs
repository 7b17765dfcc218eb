#![warn(clippy::all)]

//! Core data structures for pointbridge
//!
//! pointbridge moves point clouds across a C-style function boundary. This crate holds the pieces that
//! both sides of that boundary agree on: the point records ([PointXYZ](crate::containers::PointXYZ) and
//! [Normal](crate::containers::Normal)), the ordered [PointCloud](crate::containers::PointCloud) container
//! and the conversion between a container and a flat buffer of interleaved `f32` triples.

pub extern crate nalgebra;

pub mod containers;
/// Useful mathematical tools when working with point cloud data
pub mod math;
/// Data structures for handling point cloud metadata
pub mod meta;
