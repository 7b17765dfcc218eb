//! Point records and the container that holds them.
//!
//! # Flat buffers
//!
//! Outside of Rust, a point cloud is a contiguous array of `3 * N` `f32` values with an interleaved
//! `(x, y, z)` layout, so the coordinates of point `i` live at indices `3i`, `3i + 1` and `3i + 2`. The
//! same layout is used for surface normals, where triple `i` is the normal of point `i`.
//!
//! Inside of Rust, points live in a [`PointCloud`]. Decoding a flat buffer ([`PointCloud::from_flat`])
//! always copies the values into a fresh container, it never aliases the caller's memory. Encoding
//! ([`PointCloud::to_flat`]) always produces a new allocation sized exactly to the content:
//!
//! ```
//! # use pointbridge_core::containers::*;
//! let flat = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0];
//! let cloud = PointCloud::from_flat(&flat);
//! assert_eq!(cloud.len(), 2);
//! assert_eq!(cloud[1], PointXYZ::new(1.0, 2.0, 3.0));
//! assert_eq!(cloud.to_flat(), flat.to_vec());
//! ```

mod point_types;
pub use self::point_types::*;

mod point_cloud;
pub use self::point_cloud::*;

mod flat;
pub use self::flat::*;
