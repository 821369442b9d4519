//! lux - CPU light-transport engine
//!
//! A research-oriented physically-based renderer. A scene (meshes, BSDFs,
//! emitters, camera, film) is rendered by one of a family of Monte-Carlo
//! path-space estimators that share a single measurement contract: path
//! probability densities in the correct measures, shading-normal
//! correction, Russian-roulette survival and multiple importance sampling.

pub mod assets;
pub mod bpt;
pub mod bsdf;
pub mod bvh;
pub mod camera;
pub mod diffuse;
pub mod emitter;
pub mod fullpath;
pub mod geometry;
pub mod light;
pub mod lighttrace;
pub mod mirror;
pub mod mis;
pub mod pathtrace;
pub mod photonmap;
pub mod pm;
pub mod pool;
pub mod primitive;
pub mod pssmlt;
pub mod pssmlt_sampler;
pub mod raycast;
pub mod renderer;
pub mod sampler;
pub mod scene;
pub mod subpath;

#[cfg(test)]
pub(crate) mod testutil;

pub use assets::Assets;
pub use bsdf::{
    Bsdf, BsdfEvalQuery, BsdfSampleBidirResult, BsdfSampleQuery, BsdfSampleResult, BsdfType,
    GeneralizedBsdf, PerDirection, TransportDirection,
};
pub use camera::PerspectiveCamera;
pub use diffuse::DiffuseBsdf;
pub use emitter::{Camera, Emitter, EmitterShape, Light};
pub use geometry::{
    generalized_geometry_term, geometry_term_with_visibility, shading_normal_correction,
    Intersection, SurfaceGeometry,
};
pub use light::{AreaLight, DirectionalLight, EnvironmentLight, PointLight};
pub use mirror::MirrorBsdf;
pub use primitive::Primitive;
pub use renderer::{create_renderer, render_with_config, ProgressFn, Renderer};
pub use sampler::{RandomSampler, RestorableSampler, Sampler};
pub use scene::{PrimitiveDesc, Scene, SceneBuilder};
