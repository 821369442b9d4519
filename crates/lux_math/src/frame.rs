use crate::{Vec2, Vec3};
use std::f32::consts::PI;

/// Orthonormal shading frame built around a normal.
///
/// Local coordinates put the normal on +Z, so `v.z` is the cosine with the
/// normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    t: Vec3,
    b: Vec3,
    pub n: Vec3,
}

impl Frame {
    /// Build a frame from a unit normal (branchless Duff et al. basis).
    pub fn from_normal(n: Vec3) -> Self {
        let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        Self {
            t: Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
            b: Vec3::new(b, sign + n.y * n.y * a, -n.y),
            n,
        }
    }

    /// World direction to local (shading) coordinates.
    #[inline]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.t), v.dot(self.b), v.dot(self.n))
    }

    /// Local (shading) direction to world coordinates.
    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.t * v.x + self.b * v.y + self.n * v.z
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::from_normal(Vec3::Z)
    }
}

/// Cosine with the frame normal of a local direction.
#[inline]
pub fn cos_theta(v: Vec3) -> f32 {
    v.z
}

/// Absolute cosine with the frame normal of a local direction.
#[inline]
pub fn abs_cos_theta(v: Vec3) -> f32 {
    v.z.abs()
}

/// Mirror reflection about the frame normal, in local coordinates.
#[inline]
pub fn reflect_z(v: Vec3) -> Vec3 {
    Vec3::new(-v.x, -v.y, v.z)
}

/// Cosine-weighted hemisphere sample in local coordinates (Malley's method).
///
/// Solid-angle PDF is `cos(theta) / pi`.
pub fn cosine_sample_hemisphere(u: Vec2) -> Vec3 {
    let r = u.x.sqrt();
    let phi = 2.0 * PI * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - u.x).max(0.0).sqrt())
}

/// Uniform sample on the unit sphere. Solid-angle PDF is `1 / 4pi`.
pub fn uniform_sample_sphere(u: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Uniform barycentric coordinates on a triangle.
pub fn uniform_sample_triangle(u: Vec2) -> Vec2 {
    let s = u.x.sqrt();
    Vec2::new(1.0 - s, u.y * s)
}

/// Relative luminance of a linear RGB value (Rec. 709 weights).
#[inline]
pub fn luminance(c: Vec3) -> f32 {
    0.212671 * c.x + 0.715160 * c.y + 0.072169 * c.z
}
