//! The `extern "C"` entry points.
//!
//! Points travel as flat `float` buffers of interleaved `(x, y, z)` triples together with an `int` point count.
//! Every buffer written to an output parameter is allocated by this library and must be handed back exactly
//! once, either to [`CopyAndFree`] / [`CopyAndFreeInt`] (copy out, then release) or to [`FreeFloatBuffer`] /
//! [`FreeIntBuffer`], together with the point count that came with it.
//!
//! All functions return `0` on success. On any other status, no output parameter was written.
#![allow(non_snake_case)]

use std::{
    any::Any,
    os::raw::{c_char, c_float, c_int},
    panic::{self, AssertUnwindSafe},
    ptr,
};

use pointbridge_core::containers::FLAT_STRIDE;

use crate::{
    backend::default_backend,
    marshal::{
        c_path, flat_points, into_raw_floats, into_raw_ints, output_slot, point_count, release_floats,
        release_ints, to_c_count,
    },
    operations,
    status::{BoundaryError, Result, STATUS_OK},
};

/// Runs `body`, turning its error or a panic into a status code
fn guarded<F: FnOnce() -> Result<()>>(name: &str, body: F) -> c_int {
    let result = panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(BoundaryError::Panicked(panic_message(&*payload))));
    match result {
        Ok(()) => STATUS_OK,
        Err(e) => {
            log::warn!("{} failed: {}", name, e);
            e.status_code()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Estimates a normal for each of the `n_points_in` points. Exactly one of `k_neighborhood` (number of nearest
/// neighbours) and `radius_neighborhood` (search radius) must be positive. On success, `*normals_out` receives
/// `3 * n_points_in` floats, normal `i` belonging to point `i`.
///
/// Returns `-1` for an invalid neighbourhood and `-2` if the backend produced the wrong number of normals.
///
/// # Safety
///
/// - `points_in` must be valid for reads of `3 * n_points_in` floats
/// - `normals_out` must be valid for writes
#[no_mangle]
pub unsafe extern "C" fn PclComputeNormals(
    points_in: *const c_float,
    n_points_in: c_int,
    k_neighborhood: c_int,
    radius_neighborhood: c_float,
    normals_out: *mut *mut c_float,
) -> c_int {
    guarded("PclComputeNormals", || {
        let normals_slot = output_slot(normals_out, "normalsOut")?;
        let points = flat_points(points_in, n_points_in)?;
        let normals = operations::compute_normals(
            default_backend(),
            points,
            k_neighborhood,
            radius_neighborhood,
        )?;
        *normals_slot = into_raw_floats(normals);
        Ok(())
    })
}

/// Loads the points of the PCD file at `file_name`. On success, `*points_out` receives `3 * *n_points_out`
/// floats.
///
/// # Safety
///
/// - `file_name` must be a NUL-terminated string
/// - `points_out` and `n_points_out` must be valid for writes
#[no_mangle]
pub unsafe extern "C" fn PclLoadPcd(
    file_name: *const c_char,
    points_out: *mut *mut c_float,
    n_points_out: *mut c_int,
) -> c_int {
    guarded("PclLoadPcd", || {
        let points_slot = output_slot(points_out, "pointsOut")?;
        let count_slot = output_slot(n_points_out, "nPointsOut")?;
        let path = c_path(file_name)?;
        let points = operations::load_pcd(default_backend(), path)?;
        let count = to_c_count(points.len() / FLAT_STRIDE)?;
        *points_slot = into_raw_floats(points);
        *count_slot = count;
        Ok(())
    })
}

/// Saves `n_points` points as an ASCII PCD file at `file_name`
///
/// # Safety
///
/// - `file_name` must be a NUL-terminated string
/// - `points` must be valid for reads of `3 * n_points` floats
#[no_mangle]
pub unsafe extern "C" fn PclSavePcd(file_name: *const c_char, points: *const c_float, n_points: c_int) -> c_int {
    guarded("PclSavePcd", || {
        let path = c_path(file_name)?;
        let points = flat_points(points, n_points)?;
        operations::save_pcd(default_backend(), path, points)
    })
}

/// Saves `n_points` points as an organized ASCII PCD file with `height` rows of `width` points.
/// Returns `-1` if `height * width != n_points`.
///
/// # Safety
///
/// - `file_name` must be a NUL-terminated string
/// - `points` must be valid for reads of `3 * n_points` floats
#[no_mangle]
pub unsafe extern "C" fn PclSaveOrganizedPcd(
    file_name: *const c_char,
    points: *const c_float,
    n_points: c_int,
    height: c_int,
    width: c_int,
) -> c_int {
    guarded("PclSaveOrganizedPcd", || {
        let path = c_path(file_name)?;
        let points = flat_points(points, n_points)?;
        operations::save_organized_pcd(default_backend(), path, points, height, width)
    })
}

/// Downsamples the points with a voxel grid of edge length `voxel_size`. On success, `*points_out` receives
/// `3 * *n_points_out` floats. A voxel size that isn't a positive finite number returns a copy of the input.
///
/// # Safety
///
/// - `points_in` must be valid for reads of `3 * n_points_in` floats
/// - `points_out` and `n_points_out` must be valid for writes
#[no_mangle]
pub unsafe extern "C" fn PclVoxelize(
    points_in: *const c_float,
    n_points_in: c_int,
    voxel_size: c_float,
    points_out: *mut *mut c_float,
    n_points_out: *mut c_int,
) -> c_int {
    guarded("PclVoxelize", || {
        let points_slot = output_slot(points_out, "pointsOut")?;
        let count_slot = output_slot(n_points_out, "nPointsOut")?;
        let points = flat_points(points_in, n_points_in)?;
        let filtered = operations::voxelize(default_backend(), points, voxel_size);
        let count = to_c_count(filtered.len() / FLAT_STRIDE)?;
        *points_slot = into_raw_floats(filtered);
        *count_slot = count;
        Ok(())
    })
}

/// Removes statistical outliers using the mean distance to the `mean_k` nearest neighbours and a threshold of
/// `stddev_mul` standard deviations. On success, `*points_out` receives `3 * *n_points_out` floats.
///
/// # Safety
///
/// - `points_in` must be valid for reads of `3 * n_points_in` floats
/// - `points_out` and `n_points_out` must be valid for writes
#[no_mangle]
pub unsafe extern "C" fn PclRemoveStatisticalOutliers(
    points_in: *const c_float,
    n_points_in: c_int,
    mean_k: c_int,
    stddev_mul: c_float,
    points_out: *mut *mut c_float,
    n_points_out: *mut c_int,
) -> c_int {
    guarded("PclRemoveStatisticalOutliers", || {
        let points_slot = output_slot(points_out, "pointsOut")?;
        let count_slot = output_slot(n_points_out, "nPointsOut")?;
        let points = flat_points(points_in, n_points_in)?;
        let filtered = operations::remove_statistical_outliers(default_backend(), points, mean_k, stddev_mul)?;
        let count = to_c_count(filtered.len() / FLAT_STRIDE)?;
        *points_slot = into_raw_floats(filtered);
        *count_slot = count;
        Ok(())
    })
}

/// Fits a plane with RANSAC. On success, `*indices_out` receives the `*n_indices_out` ascending indices of the
/// points within `distance_threshold` of the plane.
///
/// # Safety
///
/// - `points_in` must be valid for reads of `3 * n_points_in` floats
/// - `indices_out` and `n_indices_out` must be valid for writes
#[no_mangle]
pub unsafe extern "C" fn PclSegmentPlane(
    points_in: *const c_float,
    n_points_in: c_int,
    distance_threshold: c_float,
    indices_out: *mut *mut c_int,
    n_indices_out: *mut c_int,
) -> c_int {
    guarded("PclSegmentPlane", || {
        let indices_slot = output_slot(indices_out, "indicesOut")?;
        let count_slot = output_slot(n_indices_out, "nIndicesOut")?;
        let points = flat_points(points_in, n_points_in)?;
        let indices = operations::segment_plane(default_backend(), points, distance_threshold)?;
        let count = to_c_count(indices.len())?;
        *indices_slot = into_raw_ints(indices);
        *count_slot = count;
        Ok(())
    })
}

/// Copies the `3 * n_points` floats of `source` into `destination` and releases `source`. A null `destination`
/// skips the copy, the source is released anyway.
///
/// # Safety
///
/// - `source` must be null or a float buffer returned by this library for `n_points` points, not yet released
/// - `destination` must be null or valid for writes of `3 * n_points` floats, not overlapping `source`
/// - `source` must not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn CopyAndFree(source: *mut c_float, destination: *mut c_float, n_points: c_int) -> c_int {
    guarded("CopyAndFree", || {
        let len = point_count(n_points) * FLAT_STRIDE;
        if !source.is_null() && !destination.is_null() {
            ptr::copy_nonoverlapping(source, destination, len);
        }
        release_floats(source, len);
        Ok(())
    })
}

/// Copies the `n_values` ints of `source` into `destination` and releases `source`. A null `destination` skips
/// the copy, the source is released anyway.
///
/// # Safety
///
/// - `source` must be null or an int buffer returned by this library with `n_values` entries, not yet released
/// - `destination` must be null or valid for writes of `n_values` ints, not overlapping `source`
/// - `source` must not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn CopyAndFreeInt(source: *mut c_int, destination: *mut c_int, n_values: c_int) -> c_int {
    guarded("CopyAndFreeInt", || {
        let len = point_count(n_values);
        if !source.is_null() && !destination.is_null() {
            ptr::copy_nonoverlapping(source, destination, len);
        }
        release_ints(source, len);
        Ok(())
    })
}

/// Releases a float buffer returned by this library for `n_points` points without copying it
///
/// # Safety
///
/// - `buffer` must be null or a float buffer returned by this library for `n_points` points, not yet released
#[no_mangle]
pub unsafe extern "C" fn FreeFloatBuffer(buffer: *mut c_float, n_points: c_int) -> c_int {
    guarded("FreeFloatBuffer", || {
        release_floats(buffer, point_count(n_points) * FLAT_STRIDE);
        Ok(())
    })
}

/// Releases an int buffer returned by this library with `n_values` entries without copying it
///
/// # Safety
///
/// - `buffer` must be null or an int buffer returned by this library with `n_values` entries, not yet released
#[no_mangle]
pub unsafe extern "C" fn FreeIntBuffer(buffer: *mut c_int, n_values: c_int) -> c_int {
    guarded("FreeIntBuffer", || {
        release_ints(buffer, point_count(n_values));
        Ok(())
    })
}
