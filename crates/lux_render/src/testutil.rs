//! Shared fixtures for unit tests.

use std::sync::Arc;

use lux_core::mesh::TriangleMesh;
use lux_math::{Mat4, Vec3};

use crate::bsdf::Bsdf;
use crate::camera::PerspectiveCamera;
use crate::diffuse::DiffuseBsdf;
use crate::light::AreaLight;
use crate::mirror::MirrorBsdf;
use crate::scene::{PrimitiveDesc, Scene, SceneBuilder};

/// A 0.2 x 0.2 quad in the xz-plane whose faces wind toward -y.
pub fn quad_mesh() -> Arc<TriangleMesh> {
    Arc::new(TriangleMesh::new(
        vec![
            Vec3::new(-0.1, 0.0, -0.1),
            Vec3::new(-0.1, 0.0, 0.1),
            Vec3::new(0.1, 0.0, 0.1),
            Vec3::new(0.1, 0.0, -0.1),
        ],
        vec![[0, 2, 1], [0, 3, 2]],
        Some(vec![-Vec3::Y; 4]),
    ))
}

pub fn white_diffuse() -> Arc<dyn Bsdf> {
    Arc::new(DiffuseBsdf::new(Vec3::splat(0.9)))
}

fn camera_prim() -> PrimitiveDesc {
    PrimitiveDesc {
        transform: Mat4::look_at_rh(
            Vec3::new(0.0, 0.1, 0.3),
            Vec3::new(0.0, 0.1, 0.0),
            Vec3::Y,
        ),
        mesh: None,
        bsdf: white_diffuse(),
        camera_id: Some("camera_1".into()),
        light_id: None,
    }
}

fn light_prim() -> PrimitiveDesc {
    PrimitiveDesc {
        transform: Mat4::from_translation(Vec3::new(0.0, 0.2, 0.0)),
        mesh: Some(quad_mesh()),
        bsdf: Arc::new(DiffuseBsdf::new(Vec3::ZERO)),
        camera_id: None,
        light_id: Some("light_1".into()),
    }
}

/// The two-quad test scene: a white backdrop quad facing the camera and a
/// light quad at y=0.2 facing down, seen from (0, 0.1, 0.3).
pub fn two_quad_scene() -> Scene {
    let mut builder = SceneBuilder::new();
    builder.set_film(lux_core::film::Film::new(100, 100));
    builder.add_camera("camera_1", Box::new(PerspectiveCamera::new(45.0, 1.0)));
    builder.add_light("light_1", Box::new(AreaLight::new(Vec3::splat(2.0))));

    builder.add_primitive(camera_prim());

    // Backdrop: quad rotated into the xy-plane at z = -0.1, facing +z
    builder.add_primitive(PrimitiveDesc {
        transform: Mat4::from_translation(Vec3::new(0.0, 0.1, -0.1))
            * Mat4::from_axis_angle(Vec3::X, -90f32.to_radians()),
        mesh: Some(quad_mesh()),
        bsdf: white_diffuse(),
        camera_id: None,
        light_id: None,
    });

    builder.add_primitive(light_prim());

    builder.build(None).unwrap()
}

/// Variant of the two-quad scene whose backdrop is a perfect mirror, plus
/// a diffuse side panel so mirror bounces have something to see.
pub fn mirror_scene() -> Scene {
    let mut builder = SceneBuilder::new();
    builder.set_film(lux_core::film::Film::new(100, 100));
    builder.add_camera("camera_1", Box::new(PerspectiveCamera::new(45.0, 1.0)));
    builder.add_light("light_1", Box::new(AreaLight::new(Vec3::splat(2.0))));

    builder.add_primitive(camera_prim());

    builder.add_primitive(PrimitiveDesc {
        transform: Mat4::from_translation(Vec3::new(0.0, 0.1, -0.1))
            * Mat4::from_axis_angle(Vec3::X, -90f32.to_radians()),
        mesh: Some(quad_mesh()),
        bsdf: Arc::new(MirrorBsdf::new(Vec3::splat(0.9))),
        camera_id: None,
        light_id: None,
    });

    // Diffuse panel at y = 0 facing up
    builder.add_primitive(PrimitiveDesc {
        transform: Mat4::from_axis_angle(Vec3::X, 180f32.to_radians()),
        mesh: Some(quad_mesh()),
        bsdf: white_diffuse(),
        camera_id: None,
        light_id: None,
    });

    builder.add_primitive(light_prim());

    builder.build(None).unwrap()
}
