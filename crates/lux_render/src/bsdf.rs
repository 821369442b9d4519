//! Generalized directional scattering.
//!
//! Materials, cameras and lights all expose the same directional interface:
//! a capability set (`BsdfType`), direction sampling in one or both
//! transport directions, and evaluation of the scattering value and its PDF.
//! This lets the subpath sampler and the bidirectional connections treat
//! surface scattering and emitter directionality uniformly.

use std::ops::{BitAnd, BitOr, Index, IndexMut};

use lux_math::{PdfEval, Vec2, Vec3};

use crate::geometry::SurfaceGeometry;

/// Direction light flows in while a subpath is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportDirection {
    /// Light to eye (light subpaths, emitted radiance).
    LE = 0,
    /// Eye to light (eye subpaths, sensor importance).
    EL = 1,
}

impl TransportDirection {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            TransportDirection::LE => TransportDirection::EL,
            TransportDirection::EL => TransportDirection::LE,
        }
    }
}

/// A pair of values indexed by transport direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerDirection<T>(pub [T; 2]);

impl<T> Index<TransportDirection> for PerDirection<T> {
    type Output = T;

    #[inline]
    fn index(&self, d: TransportDirection) -> &T {
        &self.0[d as usize]
    }
}

impl<T> IndexMut<TransportDirection> for PerDirection<T> {
    #[inline]
    fn index_mut(&mut self, d: TransportDirection) -> &mut T {
        &mut self.0[d as usize]
    }
}

/// Bit-set of scattering component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BsdfType(u32);

impl BsdfType {
    pub const NONE: BsdfType = BsdfType(0);
    pub const DIFFUSE_REFLECTION: BsdfType = BsdfType(1 << 0);
    pub const DIFFUSE_TRANSMISSION: BsdfType = BsdfType(1 << 1);
    pub const SPECULAR_REFLECTION: BsdfType = BsdfType(1 << 2);
    pub const SPECULAR_TRANSMISSION: BsdfType = BsdfType(1 << 3);
    /// Non-delta directional component of a camera.
    pub const NON_DELTA_EYE_DIRECTION: BsdfType = BsdfType(1 << 4);
    /// Directional component of a light.
    pub const LIGHT_DIRECTION: BsdfType = BsdfType(1 << 5);

    pub const DIFFUSE: BsdfType =
        BsdfType(Self::DIFFUSE_REFLECTION.0 | Self::DIFFUSE_TRANSMISSION.0);
    pub const SPECULAR: BsdfType =
        BsdfType(Self::SPECULAR_REFLECTION.0 | Self::SPECULAR_TRANSMISSION.0);
    pub const ALL_BSDF: BsdfType = BsdfType(Self::DIFFUSE.0 | Self::SPECULAR.0);
    pub const ALL_EMITTER: BsdfType =
        BsdfType(Self::NON_DELTA_EYE_DIRECTION.0 | Self::LIGHT_DIRECTION.0);
    pub const ALL: BsdfType = BsdfType(Self::ALL_BSDF.0 | Self::ALL_EMITTER.0);

    /// Whether the two sets share any component.
    #[inline]
    pub fn intersects(self, other: BsdfType) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_specular(self) -> bool {
        self.intersects(Self::SPECULAR)
    }
}

impl BitOr for BsdfType {
    type Output = BsdfType;

    fn bitor(self, rhs: BsdfType) -> BsdfType {
        BsdfType(self.0 | rhs.0)
    }
}

impl BitAnd for BsdfType {
    type Output = BsdfType;

    fn bitand(self, rhs: BsdfType) -> BsdfType {
        BsdfType(self.0 & rhs.0)
    }
}

/// Inputs for direction sampling.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSampleQuery {
    /// Two uniform numbers driving the directional sample.
    pub sample: Vec2,
    /// Uniform number for component selection.
    pub u_comp: f32,
    /// Incident direction (toward the previous vertex). Unused by emitters.
    pub wi: Vec3,
    /// Requested component types.
    pub ty: BsdfType,
    pub transport_dir: TransportDirection,
}

/// Result of direction sampling.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSampleResult {
    /// Sampled outgoing direction (toward the next vertex).
    pub wo: Vec3,
    /// The component that was actually sampled.
    pub sampled_type: BsdfType,
    /// Directional PDF: projected solid angle on non-degenerate supports,
    /// delta-coefficient for specular components.
    pub pdf: PdfEval,
}

/// Result of direction sampling with both-direction PDFs and weights, so a
/// single sample serves both importance flows in BPT.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSampleBidirResult {
    pub wo: Vec3,
    pub sampled_type: BsdfType,
    pub pdf: PerDirection<PdfEval>,
    pub weight: PerDirection<Vec3>,
}

/// Inputs for value/PDF evaluation with both directions fixed.
#[derive(Debug, Clone, Copy)]
pub struct BsdfEvalQuery {
    pub ty: BsdfType,
    pub transport_dir: TransportDirection,
    pub wi: Vec3,
    pub wo: Vec3,
}

impl BsdfEvalQuery {
    pub fn new(ty: BsdfType, transport_dir: TransportDirection, wi: Vec3, wo: Vec3) -> Self {
        Self {
            ty,
            transport_dir,
            wi,
            wo,
        }
    }

    /// Evaluation query for the directions of a sample just taken.
    pub fn from_sample(query: &BsdfSampleQuery, result: &BsdfSampleResult) -> Self {
        Self {
            ty: result.sampled_type,
            transport_dir: query.transport_dir,
            wi: query.wi,
            wo: result.wo,
        }
    }
}

/// The unified directional-scattering capability set.
///
/// A sampling call may legitimately fail (zero-weight region, wrong
/// half-space, disallowed component); it returns `None` and the caller
/// terminates the path cleanly.
pub trait GeneralizedBsdf: Send + Sync {
    /// The component types this implementation provides.
    fn bsdf_types(&self) -> BsdfType;

    /// Whether the directional support is a measure-zero set (delta).
    fn degenerated(&self) -> bool {
        false
    }

    /// Sample an outgoing direction.
    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult>;

    /// Sample a direction and return the throughput weight
    /// `f * |cos| / p_{sigma-perp}` including the shading-normal correction.
    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Vec3)>;

    /// As above, but with PDFs and weights for both transport directions.
    fn sample_and_estimate_direction_bidir(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleBidirResult>;

    /// The scattering value `f(wi, wo)` for the requested components,
    /// including the shading-normal correction. For specular components the
    /// value is non-zero only when `wo` coincides with the delta direction.
    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Vec3;

    /// The projected-solid-angle PDF of sampling `wo` given `wi`.
    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval;
}

/// Marker for surface scattering functions attachable to primitives.
pub trait Bsdf: GeneralizedBsdf {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_unions() {
        assert!(BsdfType::ALL.intersects(BsdfType::LIGHT_DIRECTION));
        assert!(BsdfType::ALL_BSDF.intersects(BsdfType::SPECULAR_REFLECTION));
        assert!(!BsdfType::ALL_BSDF.intersects(BsdfType::ALL_EMITTER));
        assert!(BsdfType::SPECULAR_TRANSMISSION.is_specular());
        assert!(!BsdfType::DIFFUSE_REFLECTION.is_specular());
    }

    #[test]
    fn test_per_direction_indexing() {
        let mut p: PerDirection<f32> = PerDirection([0.0; 2]);
        p[TransportDirection::LE] = 1.0;
        p[TransportDirection::EL] = 2.0;
        assert_eq!(p[TransportDirection::LE], 1.0);
        assert_eq!(p[TransportDirection::LE.opposite()], 2.0);
    }
}
