use nalgebra::Vector3;
use static_assertions::const_assert_eq;

/// A single 3D point with `f32` coordinates. The memory layout matches one triple of a flat point buffer
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointXYZ {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

const_assert_eq!(std::mem::size_of::<PointXYZ>(), 3 * std::mem::size_of::<f32>());
const_assert_eq!(std::mem::align_of::<PointXYZ>(), std::mem::align_of::<f32>());

impl PointXYZ {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position of this point as a vector
    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Returns the position of this point widened to `f64`. The backend algorithms accumulate in `f64`
    pub fn position_f64(&self) -> Vector3<f64> {
        Vector3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Returns true if none of the coordinates is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<Vector3<f32>> for PointXYZ {
    fn from(position: Vector3<f32>) -> Self {
        Self::new(position.x, position.y, position.z)
    }
}

impl From<[f32; 3]> for PointXYZ {
    fn from(xyz: [f32; 3]) -> Self {
        Self::new(xyz[0], xyz[1], xyz[2])
    }
}

/// A surface normal together with the surface curvature at the point it was estimated for.
/// A normal that could not be estimated (e.g. too few neighbours) has all components set to NaN
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Normal {
    pub normal_x: f32,
    pub normal_y: f32,
    pub normal_z: f32,
    pub curvature: f32,
}

impl Normal {
    pub const fn new(normal_x: f32, normal_y: f32, normal_z: f32, curvature: f32) -> Self {
        Self {
            normal_x,
            normal_y,
            normal_z,
            curvature,
        }
    }

    /// The marker value for a normal that could not be estimated
    pub const fn nan() -> Self {
        Self::new(f32::NAN, f32::NAN, f32::NAN, f32::NAN)
    }

    pub fn normal(&self) -> Vector3<f32> {
        Vector3::new(self.normal_x, self.normal_y, self.normal_z)
    }

    pub fn is_finite(&self) -> bool {
        self.normal_x.is_finite() && self.normal_y.is_finite() && self.normal_z.is_finite()
    }
}

/// A record that can be written as one `(x, y, z)` triple of a flat buffer
pub trait FlatRecord: Copy {
    fn to_triple(&self) -> [f32; 3];
}

impl FlatRecord for PointXYZ {
    fn to_triple(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl FlatRecord for Normal {
    fn to_triple(&self) -> [f32; 3] {
        [self.normal_x, self.normal_y, self.normal_z]
    }
}
