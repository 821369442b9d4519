// Re-export glam for convenience
pub use glam::*;

// lux math types
mod aabb;
mod distribution;
mod frame;
mod pdf;
mod ray;

pub use aabb::Aabb;
pub use distribution::DiscreteDistribution1D;
pub use frame::{
    abs_cos_theta, cos_theta, cosine_sample_hemisphere, luminance, reflect_z,
    uniform_sample_sphere, uniform_sample_triangle, Frame,
};
pub use pdf::{Measure, PdfEval};
pub use ray::Ray;

/// General-purpose epsilon, also used to offset ray origins off surfaces.
pub const EPS: f32 = 1e-4;

/// Looser epsilon for comparisons that accumulate floating-point error
/// (PDF ratio checks, delta-direction matching).
pub const EPS_LARGE: f32 = 1e-3;

/// 1 / pi.
pub const INV_PI: f32 = std::f32::consts::FRAC_1_PI;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
    }
}
