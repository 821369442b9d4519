//! Scene: primitive registry, emitter binding, light selection and
//! ray-scene intersection.

use std::collections::HashMap;
use std::sync::Arc;

use lux_core::config::ConfigError;
use lux_core::film::Film;
use lux_core::mesh::TriangleMesh;
use lux_math::{Aabb, DiscreteDistribution1D, Measure, PdfEval, Ray, Vec2, Vec3};

use crate::bsdf::Bsdf;
use crate::bvh::Bvh;
use crate::emitter::{Camera, EmitterPrimitiveData, EmitterShape, Light};
use crate::geometry::{Intersection, SurfaceGeometry};
use crate::primitive::Primitive;
use crate::renderer::ProgressFn;

/// A primitive description before the scene is built: object-space mesh,
/// BSDF and optional emitter references by asset id.
pub struct PrimitiveDesc {
    pub transform: lux_math::Mat4,
    pub mesh: Option<Arc<TriangleMesh>>,
    pub bsdf: Arc<dyn Bsdf>,
    pub camera_id: Option<String>,
    pub light_id: Option<String>,
}

/// Collects primitives and emitter instances, then builds the immutable
/// scene.
///
/// Emitters and primitives reference each other; the cycle is broken by a
/// two-phase build: primitives are registered first, then each emitter
/// receives the (world-space) data of the primitives it is attached to, and
/// finally emitters that depend on scene bounds are post-configured.
pub struct SceneBuilder {
    primitives: Vec<PrimitiveDesc>,
    cameras: HashMap<String, Box<dyn Camera>>,
    lights: HashMap<String, Box<dyn Light>>,
    film: Option<Film>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self {
            primitives: Vec::new(),
            cameras: HashMap::new(),
            lights: HashMap::new(),
            film: None,
        }
    }

    /// The film the main camera renders into. Required.
    pub fn set_film(&mut self, film: Film) {
        self.film = Some(film);
    }

    pub fn add_primitive(&mut self, desc: PrimitiveDesc) {
        self.primitives.push(desc);
    }

    pub fn add_camera(&mut self, id: impl Into<String>, camera: Box<dyn Camera>) {
        self.cameras.insert(id.into(), camera);
    }

    pub fn add_light(&mut self, id: impl Into<String>, light: Box<dyn Light>) {
        self.lights.insert(id.into(), light);
    }

    pub fn build(self, progress: Option<&ProgressFn>) -> Result<Scene, ConfigError> {
        let SceneBuilder {
            primitives: descs,
            mut cameras,
            mut lights,
            film,
        } = self;

        let film = film.ok_or_else(|| ConfigError::InvalidScene {
            reason: "scene requires a film".into(),
        })?;

        // Phase 1: primitives with world-space meshes; emitter ids resolve
        // to dense indices in first-reference order.
        let mut primitives = Vec::with_capacity(descs.len());
        let mut camera_order: Vec<String> = Vec::new();
        let mut light_order: Vec<String> = Vec::new();
        let mut camera_prims: HashMap<String, Vec<usize>> = HashMap::new();
        let mut light_prims: HashMap<String, Vec<usize>> = HashMap::new();

        for desc in descs {
            let world_mesh = desc.mesh.as_ref().map(|m| {
                let mut mesh = m.transformed(desc.transform);
                mesh.ensure_normals();
                Arc::new(mesh)
            });
            let mut prim = Primitive::new(desc.transform, world_mesh, desc.bsdf);

            if let Some(id) = &desc.camera_id {
                if !cameras.contains_key(id) {
                    return Err(ConfigError::UnknownReference {
                        kind: "camera",
                        id: id.clone(),
                    });
                }
                if desc.light_id.is_some() {
                    return Err(ConfigError::InvalidScene {
                        reason: format!(
                            "primitive referencing camera '{id}' also references a light"
                        ),
                    });
                }
                let idx = index_of(&mut camera_order, id);
                prim.camera = Some(idx);
                camera_prims.entry(id.clone()).or_default().push(primitives.len());
            }
            if let Some(id) = &desc.light_id {
                if !lights.contains_key(id) {
                    return Err(ConfigError::UnknownReference {
                        kind: "light",
                        id: id.clone(),
                    });
                }
                let idx = index_of(&mut light_order, id);
                prim.light = Some(idx);
                light_prims.entry(id.clone()).or_default().push(primitives.len());
            }

            primitives.push(prim);
        }

        if camera_order.len() != 1 {
            return Err(ConfigError::InvalidScene {
                reason: format!(
                    "scene requires exactly one camera primitive, found {}",
                    camera_order.len()
                ),
            });
        }

        // Phase 2: hand each emitter the data of its primitives.
        let register = |prim_indices: &[usize], primitives: &[Primitive]| {
            prim_indices
                .iter()
                .map(|&i| EmitterPrimitiveData {
                    transform: primitives[i].transform,
                    mesh: primitives[i].mesh.clone(),
                })
                .collect::<Vec<_>>()
        };

        let mut scene_cameras = Vec::with_capacity(camera_order.len());
        for id in &camera_order {
            let mut camera = cameras.remove(id).unwrap();
            let data = register(&camera_prims[id], &primitives);
            camera.register_primitives(&data)?;
            scene_cameras.push(camera);
        }

        let mut scene_lights = Vec::with_capacity(light_order.len());
        for id in &light_order {
            let mut light = lights.remove(id).unwrap();
            let data = register(&light_prims[id], &primitives);
            light.register_primitives(&data)?;
            scene_lights.push(light);
        }

        if scene_lights.is_empty() {
            log::warn!("scene has no lights; images will be black");
        }

        // Phase 3: world bounds and bound-dependent emitter state. The
        // bounds include the camera position so that bounding-sphere
        // emitters enclose the eye rays' origins.
        let mut bounds = Aabb::EMPTY;
        for prim in &primitives {
            if let Some(mesh) = &prim.mesh {
                bounds = bounds.union(&mesh.bounds);
            }
            if prim.camera.is_some() {
                let eye = prim.transform.inverse().transform_point3(Vec3::ZERO);
                bounds = bounds.union_point(eye);
            }
        }
        for light in &mut scene_lights {
            light.post_configure(&bounds);
        }
        for camera in &mut scene_cameras {
            camera.post_configure(&bounds);
        }

        let emitter_shapes: Vec<(EmitterShape, usize)> = primitives
            .iter()
            .enumerate()
            .filter_map(|(i, prim)| {
                let light = prim.light?;
                scene_lights[light].emitter_shape().map(|s| (s, i))
            })
            .collect();

        // Uniform light selection
        let mut light_selection = DiscreteDistribution1D::new();
        for _ in 0..scene_lights.len() {
            light_selection.add(1.0);
        }
        light_selection.normalize();

        log::info!(
            "building scene: {} primitives, {} lights",
            primitives.len(),
            scene_lights.len()
        );
        let bvh = Bvh::build(&primitives, progress);

        Ok(Scene {
            primitives,
            cameras: scene_cameras,
            lights: scene_lights,
            light_selection,
            bvh,
            bounds,
            emitter_shapes,
            film,
        })
    }
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn index_of(order: &mut Vec<String>, id: &str) -> usize {
    match order.iter().position(|x| x == id) {
        Some(i) => i,
        None => {
            order.push(id.to_string());
            order.len() - 1
        }
    }
}

// --------------------------------------------------------------------------------

/// The immutable, thread-shared scene.
pub struct Scene {
    primitives: Vec<Primitive>,
    cameras: Vec<Box<dyn Camera>>,
    lights: Vec<Box<dyn Light>>,
    light_selection: DiscreteDistribution1D,
    bvh: Bvh,
    bounds: Aabb,
    emitter_shapes: Vec<(EmitterShape, usize)>,
    film: Film,
}

impl Scene {
    /// The film template of the main camera. Renderers clone it for the
    /// master and per-worker films.
    pub fn film(&self) -> &Film {
        &self.film
    }

    pub fn num_primitives(&self) -> usize {
        self.primitives.len()
    }

    pub fn primitive(&self, i: usize) -> &Primitive {
        &self.primitives[i]
    }

    /// The main camera (scenes carry exactly one).
    pub fn main_camera(&self) -> &dyn Camera {
        self.cameras[0].as_ref()
    }

    pub fn num_lights(&self) -> usize {
        self.lights.len()
    }

    pub fn light(&self, i: usize) -> &dyn Light {
        self.lights[i].as_ref()
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Sample a light index from the light-selection distribution.
    pub fn sample_light_selection(&self, u: f32) -> (usize, PdfEval) {
        debug_assert!(!self.lights.is_empty());
        let i = self.light_selection.sample(u);
        (i, PdfEval::new(self.light_selection.pdf(i), Measure::Discrete))
    }

    /// Selection probability of a light index.
    pub fn light_selection_pdf(&self, i: usize) -> PdfEval {
        PdfEval::new(self.light_selection.pdf(i), Measure::Discrete)
    }

    /// Closest intersection along the ray. On a hit, `ray.max_t` is
    /// clamped to the hit parameter and the returned record back-references
    /// the hit primitive.
    pub fn intersect(&self, ray: &mut Ray) -> Option<Intersection<'_>> {
        if let Some(hit) = self.bvh.intersect(ray) {
            let ta = self.bvh.triaccel(hit.tri);
            let prim_index = ta.prim_index as usize;
            let face_index = ta.face_index as usize;
            let prim = &self.primitives[prim_index];
            let geom = self.surface_geometry(prim, ta.p0, ta.e1, ta.e2, face_index, hit.b);
            return Some(Intersection {
                geom,
                primitive: prim,
                prim_index,
                face_index,
                t: hit.t,
            });
        }

        // Fallback: emitter stand-in shapes (environment lights)
        let mut best: Option<Intersection<'_>> = None;
        for (shape, prim_index) in &self.emitter_shapes {
            if let Some((t, p, inward)) = shape.intersect(ray) {
                ray.max_t = t;
                best = Some(Intersection {
                    geom: SurfaceGeometry::on_surface(p, inward, inward, Vec2::ZERO),
                    primitive: &self.primitives[*prim_index],
                    prim_index: *prim_index,
                    face_index: 0,
                    t,
                });
            }
        }
        best
    }

    /// Fill an intersection record from barycentric coordinates on a face.
    fn surface_geometry(
        &self,
        prim: &Primitive,
        p0: Vec3,
        e1: Vec3,
        e2: Vec3,
        face_index: usize,
        b: Vec2,
    ) -> SurfaceGeometry {
        let mesh = prim.mesh.as_ref().expect("hit primitive has a mesh");
        let p = p0 + e1 * b.x + e2 * b.y;
        let gn = e1.cross(e2).normalize();

        let face = mesh.faces[face_index];
        let sn = match &mesh.normals {
            Some(ns) => {
                let n = ns[face[0] as usize] * (1.0 - b.x - b.y)
                    + ns[face[1] as usize] * b.x
                    + ns[face[2] as usize] * b.y;
                n.normalize_or_zero()
            }
            None => gn,
        };
        let sn = if sn == Vec3::ZERO { gn } else { sn };

        let uv = match &mesh.uvs {
            Some(uvs) => {
                uvs[face[0] as usize] * (1.0 - b.x - b.y)
                    + uvs[face[1] as usize] * b.x
                    + uvs[face[2] as usize] * b.y
            }
            None => b,
        };

        SurfaceGeometry::on_surface(p, gn, sn, uv)
    }
}
