use super::{FlatRecord, PointCloud, PointXYZ};

/// Number of `f32` values per record in a flat point or normal buffer
pub const FLAT_STRIDE: usize = 3;

impl PointCloud<PointXYZ> {
    /// Decodes a flat buffer of interleaved `(x, y, z)` triples into a new `PointCloud`. The values are copied,
    /// the returned cloud does not borrow from `values`. A trailing partial triple is ignored
    pub fn from_flat(values: &[f32]) -> Self {
        debug_assert!(
            values.len() % FLAT_STRIDE == 0,
            "Flat point buffer length {} is not a multiple of {}",
            values.len(),
            FLAT_STRIDE
        );
        let whole_triples = values.len() - (values.len() % FLAT_STRIDE);
        let points: &[PointXYZ] = bytemuck::cast_slice(&values[..whole_triples]);
        Self::from_points(points.to_vec())
    }
}

impl<P: FlatRecord> PointCloud<P> {
    /// Encodes this cloud into a newly allocated flat buffer of exactly `3 * len` values
    pub fn to_flat(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.len() * FLAT_STRIDE);
        for record in self.iter() {
            flat.extend_from_slice(&record.to_triple());
        }
        flat
    }

    /// Like [`to_flat`](PointCloud::to_flat), but hands out a boxed slice whose capacity equals its length.
    /// This is the shape in which buffers leave the process boundary
    pub fn to_flat_boxed(&self) -> Box<[f32]> {
        self.to_flat().into_boxed_slice()
    }
}
