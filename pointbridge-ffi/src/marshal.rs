//! Conversions between raw C arguments and Rust values. Buffers handed out by this crate are boxed slices whose
//! length is exactly the number of values they hold, so they can be released again from the pointer and the
//! point count the caller received alongside them.

use std::{
    ffi::CStr,
    os::raw::{c_char, c_int},
    path::Path,
    ptr, slice,
};

use pointbridge_core::containers::FLAT_STRIDE;

use crate::status::{BoundaryError, Result};

/// Number of points for a raw count. Negative counts mean no points
pub fn point_count(n: c_int) -> usize {
    n.max(0) as usize
}

/// Converts a number of records into the `int` reported to the caller
pub fn to_c_count(count: usize) -> Result<c_int> {
    // the matching buffer holds 3 * count floats, which must stay addressable from the count alone
    match count.checked_mul(FLAT_STRIDE) {
        Some(values) if values <= c_int::MAX as usize => Ok(count as c_int),
        _ => Err(BoundaryError::InvalidArgument(format!(
            "{} records don't fit into a C int count",
            count
        ))),
    }
}

/// Borrows the `3 * n` floats of a flat point buffer.
///
/// # Safety
///
/// - If `n > 0`, `points` must be valid for reads of `3 * n` floats for the lifetime `'a`
pub unsafe fn flat_points<'a>(points: *const f32, n: c_int) -> Result<&'a [f32]> {
    let count = point_count(n);
    if count == 0 {
        return Ok(&[]);
    }
    if points.is_null() {
        return Err(BoundaryError::InvalidArgument(format!(
            "null point buffer for {} points",
            count
        )));
    }
    Ok(slice::from_raw_parts(points, count * FLAT_STRIDE))
}

/// Reads a NUL-terminated UTF-8 path.
///
/// # Safety
///
/// - `path` must be null or point to a NUL-terminated string that lives for `'a`
pub unsafe fn c_path<'a>(path: *const c_char) -> Result<&'a Path> {
    if path.is_null() {
        return Err(BoundaryError::InvalidArgument("null file path".to_owned()));
    }
    CStr::from_ptr(path)
        .to_str()
        .map(Path::new)
        .map_err(|e| BoundaryError::InvalidArgument(format!("file path is not valid UTF-8: {}", e)))
}

/// Resolves an output parameter. Nothing is written through it here.
///
/// # Safety
///
/// - `slot` must be null or valid for writes for the lifetime `'a`
pub unsafe fn output_slot<'a, T>(slot: *mut T, name: &str) -> Result<&'a mut T> {
    slot.as_mut()
        .ok_or_else(|| BoundaryError::InvalidArgument(format!("null output parameter '{}'", name)))
}

/// Hands ownership of `values` to the caller
pub fn into_raw_floats(values: Box<[f32]>) -> *mut f32 {
    Box::into_raw(values) as *mut f32
}

/// Hands ownership of `values` to the caller
pub fn into_raw_ints(values: Box<[i32]>) -> *mut i32 {
    Box::into_raw(values) as *mut i32
}

/// Takes back a buffer created by [`into_raw_floats`].
///
/// # Safety
///
/// - `buffer` must be null or come from [`into_raw_floats`] with exactly `len` values
/// - `buffer` must not be used afterwards
pub unsafe fn release_floats(buffer: *mut f32, len: usize) {
    if !buffer.is_null() {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(buffer, len)));
    }
}

/// Takes back a buffer created by [`into_raw_ints`].
///
/// # Safety
///
/// - `buffer` must be null or come from [`into_raw_ints`] with exactly `len` values
/// - `buffer` must not be used afterwards
pub unsafe fn release_ints(buffer: *mut i32, len: usize) {
    if !buffer.is_null() {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(buffer, len)));
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::*;

    #[test]
    fn test_point_count() {
        assert_eq!(point_count(-5), 0);
        assert_eq!(point_count(0), 0);
        assert_eq!(point_count(7), 7);
        assert_eq!(to_c_count(7).unwrap(), 7);
        assert!(to_c_count(c_int::MAX as usize).is_err());
    }

    #[test]
    fn test_flat_points() {
        let values = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let borrowed = unsafe { flat_points(values.as_ptr(), 2) }.unwrap();
        assert_eq!(borrowed, &values);
        let empty = unsafe { flat_points(ptr::null(), 0) }.unwrap();
        assert!(empty.is_empty());
        assert!(unsafe { flat_points(ptr::null(), 1) }.is_err());
    }

    #[test]
    fn test_c_path() {
        let path = CString::new("/tmp/cloud.pcd").unwrap();
        assert_eq!(unsafe { c_path(path.as_ptr()) }.unwrap(), Path::new("/tmp/cloud.pcd"));
        assert!(unsafe { c_path(ptr::null()) }.is_err());
        let invalid = CString::new(vec![0xffu8, 0xfe, b'a']).unwrap();
        assert!(unsafe { c_path(invalid.as_ptr()) }.is_err());
    }

    #[test]
    fn test_buffers_round_trip_through_raw_pointers() {
        let raw = into_raw_floats(vec![1.0, 2.0, 3.0].into_boxed_slice());
        assert_eq!(unsafe { slice::from_raw_parts(raw, 3) }, &[1.0, 2.0, 3.0]);
        unsafe { release_floats(raw, 3) };

        let raw = into_raw_ints(vec![].into_boxed_slice());
        assert!(!raw.is_null());
        unsafe { release_ints(raw, 0) };
        unsafe { release_ints(ptr::null_mut(), 0) };
    }
}
