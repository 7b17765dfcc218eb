#![warn(clippy::all)]

//! C ABI for pointbridge
//!
//! A foreign caller (typically Python through `ctypes`) passes points as flat `float` buffers and receives new
//! buffers owned by this library. Each call builds its own [PointCloud](pointbridge_core::containers::PointCloud)
//! and search index, runs one operation of a [PointBackend](crate::backend::PointBackend) and reports the outcome
//! as an integer status code (see [status](crate::status)).
//!
//! The safe versions of all operations live in [operations](crate::operations) and can be used from Rust with
//! any backend.

pub mod backend;
pub mod config;
pub mod exports;
mod marshal;
pub mod operations;
pub mod status;

pub use self::backend::{default_backend, DefaultBackend, PointBackend};
pub use self::config::BridgeConfig;
pub use self::exports::*;
pub use self::status::{
    BoundaryError, STATUS_ERROR, STATUS_INTERNAL_ERROR, STATUS_OK, STATUS_SIZE_MISMATCH,
};
