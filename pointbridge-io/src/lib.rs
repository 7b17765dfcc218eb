#![warn(clippy::all)]
//! Support for reading and writing point cloud files.
//!
//! The `base` module contains the traits shared by all readers and writers as well as helpers that pick the right
//! reader or writer from a file extension. The `pcd` module implements the Point Cloud Data format (version 0.7)
//! in its ASCII and binary flavours.

pub mod base;
pub mod pcd;
