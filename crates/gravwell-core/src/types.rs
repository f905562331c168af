//! Plain-old-data element types shared between host code and kernels.

use bytemuck::{Pod, Zeroable};
use std::ops::{Add, Mul, Sub};

/// Four packed `f32` lanes, laid out like a WGSL `vec4<f32>`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Float4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Float4 {
    pub const ZERO: Float4 = Float4::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// A point with `w = 1`.
    pub const fn point(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z, 1.0)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn dot(self, other: Float4) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Euclidean length over all four lanes.
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize_or_zero(self) -> Float4 {
        let len = self.length();
        if len > 0.0 { self * (1.0 / len) } else { Float4::ZERO }
    }
}

impl From<[f32; 4]> for Float4 {
    fn from(v: [f32; 4]) -> Self {
        Float4::new(v[0], v[1], v[2], v[3])
    }
}

impl Add for Float4 {
    type Output = Float4;

    fn add(self, rhs: Float4) -> Float4 {
        Float4::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.w + rhs.w)
    }
}

impl Sub for Float4 {
    type Output = Float4;

    fn sub(self, rhs: Float4) -> Float4 {
        Float4::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.w - rhs.w)
    }
}

impl Mul<f32> for Float4 {
    type Output = Float4;

    fn mul(self, rhs: f32) -> Float4 {
        Float4::new(self.x * rhs, self.y * rhs, self.z * rhs, self.w * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_vec4() {
        assert_eq!(std::mem::size_of::<Float4>(), 16);
        let value = Float4::new(1.0, 2.0, 3.0, 4.0);
        let bytes = bytemuck::bytes_of(&value);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &4.0f32.to_ne_bytes());
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Float4::ZERO.normalize_or_zero(), Float4::ZERO);
        let n = Float4::new(3.0, 4.0, 0.0, 0.0).normalize_or_zero();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }
}
