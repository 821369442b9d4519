//! Asset registry and scene building from configuration trees.
//!
//! Assets are declared in an `assets` node with one group per category
//! (`triangle_meshes`, `bsdfs`, `films`, `cameras`, `lights`), each entry
//! carrying a unique `id` and a `type` factory key. The `scene` node is a
//! tree of `node` elements with composable `transform` children whose
//! leaves reference assets by id.

use std::collections::HashMap;
use std::sync::Arc;

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;
use lux_core::mesh::TriangleMesh;
use lux_math::{Mat4, Vec3};

use crate::bsdf::Bsdf;
use crate::camera::PerspectiveCamera;
use crate::diffuse::DiffuseBsdf;
use crate::emitter::{Camera, Light};
use crate::light::{AreaLight, DirectionalLight, EnvironmentLight, PointLight};
use crate::mirror::MirrorBsdf;
use crate::renderer::ProgressFn;
use crate::scene::{PrimitiveDesc, Scene, SceneBuilder};

#[derive(Clone)]
enum CameraDesc {
    Perspective { fovy: f32, film: String },
}

#[derive(Clone)]
enum LightDesc {
    Area { luminance: Vec3 },
    Point { intensity: Vec3 },
    Directional { irradiance: Vec3, direction: Vec3 },
    Environment { luminance: Vec3 },
}

/// Registry of assets parsed from a configuration tree.
pub struct Assets {
    meshes: HashMap<String, Arc<TriangleMesh>>,
    bsdfs: HashMap<String, Arc<dyn Bsdf>>,
    films: HashMap<String, Film>,
    cameras: HashMap<String, CameraDesc>,
    lights: HashMap<String, LightDesc>,
}

fn entry_id(node: &ConfigNode) -> Result<String, ConfigError> {
    Ok(node.require_attribute("id")?.to_string())
}

fn check_duplicate<T>(map: &HashMap<String, T>, id: &str) -> Result<(), ConfigError> {
    if map.contains_key(id) {
        return Err(ConfigError::DuplicateId { id: id.to_string() });
    }
    Ok(())
}

impl Assets {
    /// Parse all asset groups under an `assets` node.
    pub fn load(node: &ConfigNode) -> Result<Assets, ConfigError> {
        let mut assets = Assets {
            meshes: HashMap::new(),
            bsdfs: HashMap::new(),
            films: HashMap::new(),
            cameras: HashMap::new(),
            lights: HashMap::new(),
        };

        if let Some(group) = node.child("triangle_meshes") {
            for entry in group.children_named("triangle_mesh") {
                let id = entry_id(entry)?;
                check_duplicate(&assets.meshes, &id)?;
                assets.meshes.insert(id, Arc::new(load_mesh(entry)?));
            }
        }

        if let Some(group) = node.child("bsdfs") {
            for entry in group.children_named("bsdf") {
                let id = entry_id(entry)?;
                check_duplicate(&assets.bsdfs, &id)?;
                assets.bsdfs.insert(id, load_bsdf(entry)?);
            }
        }

        if let Some(group) = node.child("films") {
            for entry in group.children_named("film") {
                let id = entry_id(entry)?;
                check_duplicate(&assets.films, &id)?;
                assets.films.insert(id, load_film(entry)?);
            }
        }

        if let Some(group) = node.child("cameras") {
            for entry in group.children_named("camera") {
                let id = entry_id(entry)?;
                check_duplicate(&assets.cameras, &id)?;
                assets.cameras.insert(id, load_camera_desc(entry)?);
            }
        }

        if let Some(group) = node.child("lights") {
            for entry in group.children_named("light") {
                let id = entry_id(entry)?;
                check_duplicate(&assets.lights, &id)?;
                assets.lights.insert(id, load_light_desc(entry)?);
            }
        }

        // Textures are reserved in the schema but no texture type exists
        if let Some(group) = node.child("textures") {
            if let Some(entry) = group.children().first() {
                return Err(ConfigError::UnknownType {
                    kind: "texture",
                    ty: entry.attribute("type").unwrap_or_default().to_string(),
                });
            }
        }

        log::info!(
            "loaded assets: {} meshes, {} bsdfs, {} films, {} cameras, {} lights",
            assets.meshes.len(),
            assets.bsdfs.len(),
            assets.films.len(),
            assets.cameras.len(),
            assets.lights.len()
        );
        Ok(assets)
    }

    pub fn mesh(&self, id: &str) -> Result<Arc<TriangleMesh>, ConfigError> {
        self.meshes
            .get(id)
            .cloned()
            .ok_or(ConfigError::UnknownReference {
                kind: "triangle_mesh",
                id: id.to_string(),
            })
    }

    pub fn bsdf(&self, id: &str) -> Result<Arc<dyn Bsdf>, ConfigError> {
        self.bsdfs
            .get(id)
            .cloned()
            .ok_or(ConfigError::UnknownReference {
                kind: "bsdf",
                id: id.to_string(),
            })
    }

    pub fn film(&self, id: &str) -> Result<&Film, ConfigError> {
        self.films.get(id).ok_or(ConfigError::UnknownReference {
            kind: "film",
            id: id.to_string(),
        })
    }

    /// Instantiate a camera and return it with its film.
    pub fn create_camera(&self, id: &str) -> Result<(Box<dyn Camera>, Film), ConfigError> {
        let desc = self.cameras.get(id).ok_or(ConfigError::UnknownReference {
            kind: "camera",
            id: id.to_string(),
        })?;
        match desc {
            CameraDesc::Perspective { fovy, film } => {
                let film = self.film(film)?.clone();
                let aspect = film.width() as f32 / film.height() as f32;
                Ok((Box::new(PerspectiveCamera::new(*fovy, aspect)), film))
            }
        }
    }

    /// Instantiate a light.
    pub fn create_light(&self, id: &str) -> Result<Box<dyn Light>, ConfigError> {
        let desc = self.lights.get(id).ok_or(ConfigError::UnknownReference {
            kind: "light",
            id: id.to_string(),
        })?;
        Ok(match desc {
            LightDesc::Area { luminance } => Box::new(AreaLight::new(*luminance)),
            LightDesc::Point { intensity } => Box::new(PointLight::new(*intensity)),
            LightDesc::Directional {
                irradiance,
                direction,
            } => Box::new(DirectionalLight::new(*irradiance, *direction)),
            LightDesc::Environment { luminance } => Box::new(EnvironmentLight::new(*luminance)),
        })
    }
}

fn load_mesh(node: &ConfigNode) -> Result<TriangleMesh, ConfigError> {
    let ty = node.require_attribute("type")?;
    if ty != "raw" {
        return Err(ConfigError::UnknownType {
            kind: "triangle_mesh",
            ty: ty.to_string(),
        });
    }

    let positions = node
        .child("positions")
        .ok_or(ConfigError::MissingKey {
            key: "positions".into(),
        })?
        .parse_floats()?;
    if positions.len() % 3 != 0 {
        return Err(ConfigError::InvalidValue {
            key: "positions".into(),
            value: format!("{} components", positions.len()),
        });
    }
    let positions: Vec<Vec3> = positions
        .chunks(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect();

    let normals = match node.child("normals") {
        Some(child) => {
            let comps = child.parse_floats()?;
            if comps.len() != positions.len() * 3 {
                return Err(ConfigError::InvalidValue {
                    key: "normals".into(),
                    value: format!("{} components", comps.len()),
                });
            }
            Some(
                comps
                    .chunks(3)
                    .map(|c| Vec3::new(c[0], c[1], c[2]))
                    .collect(),
            )
        }
        None => None,
    };

    let indices = node
        .child("faces")
        .ok_or(ConfigError::MissingKey {
            key: "faces".into(),
        })?
        .parse_indices()?;
    if indices.len() % 3 != 0 {
        return Err(ConfigError::InvalidValue {
            key: "faces".into(),
            value: format!("{} indices", indices.len()),
        });
    }
    let max_index = positions.len() as u32;
    if indices.iter().any(|&i| i >= max_index) {
        return Err(ConfigError::InvalidValue {
            key: "faces".into(),
            value: "index out of range".into(),
        });
    }
    let faces = indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();

    Ok(TriangleMesh::new(positions, faces, normals))
}

fn load_bsdf(node: &ConfigNode) -> Result<Arc<dyn Bsdf>, ConfigError> {
    match node.require_attribute("type")? {
        "diffuse" => {
            let reflectance = node.child_vec3_or("diffuse_reflectance", Vec3::splat(1.0))?;
            Ok(Arc::new(DiffuseBsdf::new(reflectance)))
        }
        "mirror" => {
            let reflectance = node.child_vec3_or("specular_reflectance", Vec3::splat(1.0))?;
            Ok(Arc::new(MirrorBsdf::new(reflectance)))
        }
        ty => Err(ConfigError::UnknownType {
            kind: "bsdf",
            ty: ty.to_string(),
        }),
    }
}

fn load_film(node: &ConfigNode) -> Result<Film, ConfigError> {
    let ty = node.require_attribute("type")?;
    if ty != "hdr" {
        return Err(ConfigError::UnknownType {
            kind: "film",
            ty: ty.to_string(),
        });
    }
    let width = node.child_value::<u32>("width")?;
    let height = node.child_value::<u32>("height")?;
    let image_type = node.child_value_or("imagetype", "radiancehdr".to_string())?;
    if image_type != "radiancehdr" {
        return Err(ConfigError::InvalidValue {
            key: "imagetype".into(),
            value: image_type,
        });
    }
    Ok(Film::new(width, height))
}

fn load_camera_desc(node: &ConfigNode) -> Result<CameraDesc, ConfigError> {
    match node.require_attribute("type")? {
        "perspective" => {
            let fovy = node.child_value::<f32>("fovy")?;
            let film = node
                .child("film")
                .and_then(|f| f.attribute("ref"))
                .ok_or(ConfigError::MissingKey { key: "film".into() })?
                .to_string();
            Ok(CameraDesc::Perspective { fovy, film })
        }
        ty => Err(ConfigError::UnknownType {
            kind: "camera",
            ty: ty.to_string(),
        }),
    }
}

fn load_light_desc(node: &ConfigNode) -> Result<LightDesc, ConfigError> {
    match node.require_attribute("type")? {
        "area" => Ok(LightDesc::Area {
            luminance: node.child_vec3("luminance")?,
        }),
        "point" => Ok(LightDesc::Point {
            intensity: node.child_vec3("intensity")?,
        }),
        "directional" => Ok(LightDesc::Directional {
            irradiance: node.child_vec3("irradiance")?,
            direction: node.child_vec3("direction")?,
        }),
        "environment" => Ok(LightDesc::Environment {
            luminance: node.child_vec3("luminance")?,
        }),
        ty => Err(ConfigError::UnknownType {
            kind: "light",
            ty: ty.to_string(),
        }),
    }
}

// --------------------------------------------------------------------------------

/// Parse a `transform` node: `lookat`, `translate`, `rotate`, `scale` and
/// `matrix` children compose in order (later children apply after earlier
/// ones).
fn parse_transform(node: &ConfigNode) -> Result<Mat4, ConfigError> {
    let mut m = Mat4::IDENTITY;
    for child in node.children() {
        let local = match child.name() {
            "lookat" => {
                let position = child.child_vec3("position")?;
                let center = child.child_vec3("center")?;
                let up = child.child_vec3("up")?;
                Mat4::look_at_rh(position, center, up)
            }
            "translate" => Mat4::from_translation(child.parse_vec3()?),
            "rotate" => {
                let angle = child.child_value::<f32>("angle")?;
                let axis = child.child_vec3("axis")?;
                Mat4::from_axis_angle(axis.normalize(), angle.to_radians())
            }
            "scale" => Mat4::from_scale(child.parse_vec3()?),
            "matrix" => {
                let comps = child.parse_floats()?;
                if comps.len() != 16 {
                    return Err(ConfigError::InvalidValue {
                        key: "matrix".into(),
                        value: format!("{} components", comps.len()),
                    });
                }
                Mat4::from_cols_array(&comps.try_into().unwrap()).transpose()
            }
            other => {
                return Err(ConfigError::UnknownType {
                    kind: "transform",
                    ty: other.to_string(),
                })
            }
        };
        m = local * m;
    }
    Ok(m)
}

fn build_node(
    node: &ConfigNode,
    parent_transform: Mat4,
    assets: &Assets,
    builder: &mut SceneBuilder,
    film: &mut Option<Film>,
) -> Result<(), ConfigError> {
    let transform = match node.child("transform") {
        Some(t) => parent_transform * parse_transform(t)?,
        None => parent_transform,
    };

    let mesh = node
        .child("triangle_mesh")
        .and_then(|n| n.attribute("ref"))
        .map(|id| assets.mesh(id))
        .transpose()?;
    let bsdf_id = node.child("bsdf").and_then(|n| n.attribute("ref"));
    let camera_id = node.child("camera").and_then(|n| n.attribute("ref"));
    let light_id = node.child("light").and_then(|n| n.attribute("ref"));

    if mesh.is_some() || bsdf_id.is_some() || camera_id.is_some() || light_id.is_some() {
        let bsdf = match bsdf_id {
            Some(id) => assets.bsdf(id)?,
            // Emitter-only primitives get a black diffuse surface
            None => Arc::new(DiffuseBsdf::new(Vec3::ZERO)) as Arc<dyn Bsdf>,
        };

        if let Some(id) = camera_id {
            let (camera, camera_film) = assets.create_camera(id)?;
            builder.add_camera(id, camera);
            *film = Some(camera_film);
        }
        if let Some(id) = light_id {
            builder.add_light(id, assets.create_light(id)?);
        }

        builder.add_primitive(PrimitiveDesc {
            transform,
            mesh,
            bsdf,
            camera_id: camera_id.map(String::from),
            light_id: light_id.map(String::from),
        });
    }

    for child in node.children_named("node") {
        build_node(child, transform, assets, builder, film)?;
    }
    Ok(())
}

/// Build a scene from a `scene` node and loaded assets.
pub fn build_scene(
    node: &ConfigNode,
    assets: &Assets,
    progress: Option<&ProgressFn>,
) -> Result<Scene, ConfigError> {
    let root = node.child("root").ok_or(ConfigError::MissingKey {
        key: "root".into(),
    })?;

    let mut builder = SceneBuilder::new();
    let mut film = None;
    for child in root.children_named("node") {
        build_node(child, Mat4::IDENTITY, assets, &mut builder, &mut film)?;
    }

    if let Some(film) = film {
        builder.set_film(film);
    }
    builder.build(progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh_node(id: &str) -> ConfigNode {
        ConfigNode::new("triangle_mesh")
            .with_attribute("id", id)
            .with_attribute("type", "raw")
            .with_child(ConfigNode::leaf(
                "positions",
                "-0.1 0 -0.1  -0.1 0 0.1  0.1 0 0.1  0.1 0 -0.1",
            ))
            .with_child(ConfigNode::leaf(
                "normals",
                "0 -1 0  0 -1 0  0 -1 0  0 -1 0",
            ))
            .with_child(ConfigNode::leaf("faces", "0 2 1 0 3 2"))
    }

    fn assets_node() -> ConfigNode {
        ConfigNode::new("assets")
            .with_child(
                ConfigNode::new("triangle_meshes").with_child(quad_mesh_node("quad")),
            )
            .with_child(
                ConfigNode::new("bsdfs")
                    .with_child(
                        ConfigNode::new("bsdf")
                            .with_attribute("id", "diffuse_white")
                            .with_attribute("type", "diffuse")
                            .with_child(ConfigNode::leaf("diffuse_reflectance", "0.9 0.9 0.9")),
                    )
                    .with_child(
                        ConfigNode::new("bsdf")
                            .with_attribute("id", "diffuse_black")
                            .with_attribute("type", "diffuse")
                            .with_child(ConfigNode::leaf("diffuse_reflectance", "0 0 0")),
                    ),
            )
            .with_child(
                ConfigNode::new("films").with_child(
                    ConfigNode::new("film")
                        .with_attribute("id", "film_1")
                        .with_attribute("type", "hdr")
                        .with_child(ConfigNode::leaf("width", 64))
                        .with_child(ConfigNode::leaf("height", 64))
                        .with_child(ConfigNode::leaf("imagetype", "radiancehdr")),
                ),
            )
            .with_child(
                ConfigNode::new("cameras").with_child(
                    ConfigNode::new("camera")
                        .with_attribute("id", "camera_1")
                        .with_attribute("type", "perspective")
                        .with_child(ConfigNode::new("film").with_attribute("ref", "film_1"))
                        .with_child(ConfigNode::leaf("fovy", 45)),
                ),
            )
            .with_child(
                ConfigNode::new("lights").with_child(
                    ConfigNode::new("light")
                        .with_attribute("id", "light_1")
                        .with_attribute("type", "area")
                        .with_child(ConfigNode::leaf("luminance", "2 2 2")),
                ),
            )
    }

    fn scene_node() -> ConfigNode {
        ConfigNode::new("scene")
            .with_attribute("type", "bvh")
            .with_child(
                ConfigNode::new("root")
                    .with_child(
                        ConfigNode::new("node")
                            .with_child(
                                ConfigNode::new("transform").with_child(
                                    ConfigNode::new("lookat")
                                        .with_child(ConfigNode::leaf("position", "0 0.1 0.3"))
                                        .with_child(ConfigNode::leaf("center", "0 0.1 0"))
                                        .with_child(ConfigNode::leaf("up", "0 1 0")),
                                ),
                            )
                            .with_child(
                                ConfigNode::new("camera").with_attribute("ref", "camera_1"),
                            ),
                    )
                    .with_child(
                        ConfigNode::new("node")
                            .with_child(
                                ConfigNode::new("transform")
                                    .with_child(
                                        ConfigNode::new("rotate")
                                            .with_child(ConfigNode::leaf("angle", -90))
                                            .with_child(ConfigNode::leaf("axis", "1 0 0")),
                                    )
                                    .with_child(ConfigNode::leaf("translate", "0 0.1 -0.1")),
                            )
                            .with_child(
                                ConfigNode::new("triangle_mesh").with_attribute("ref", "quad"),
                            )
                            .with_child(
                                ConfigNode::new("bsdf").with_attribute("ref", "diffuse_white"),
                            ),
                    )
                    .with_child(
                        ConfigNode::new("node")
                            .with_child(
                                ConfigNode::new("transform")
                                    .with_child(ConfigNode::leaf("translate", "0 0.2 0")),
                            )
                            .with_child(
                                ConfigNode::new("triangle_mesh").with_attribute("ref", "quad"),
                            )
                            .with_child(
                                ConfigNode::new("light").with_attribute("ref", "light_1"),
                            )
                            .with_child(
                                ConfigNode::new("bsdf").with_attribute("ref", "diffuse_black"),
                            ),
                    ),
            )
    }

    #[test]
    fn test_load_assets() {
        let assets = Assets::load(&assets_node()).unwrap();
        assert!(assets.mesh("quad").is_ok());
        assert!(assets.bsdf("diffuse_white").is_ok());
        assert_eq!(assets.film("film_1").unwrap().width(), 64);
        assert!(assets.create_camera("camera_1").is_ok());
        assert!(assets.create_light("light_1").is_ok());
        assert!(matches!(
            assets.mesh("nope"),
            Err(ConfigError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let node = ConfigNode::new("assets").with_child(
            ConfigNode::new("triangle_meshes")
                .with_child(quad_mesh_node("quad"))
                .with_child(quad_mesh_node("quad")),
        );
        assert!(matches!(
            Assets::load(&node),
            Err(ConfigError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_unknown_bsdf_type_rejected() {
        let node = ConfigNode::new("assets").with_child(
            ConfigNode::new("bsdfs").with_child(
                ConfigNode::new("bsdf")
                    .with_attribute("id", "x")
                    .with_attribute("type", "disney"),
            ),
        );
        assert!(matches!(
            Assets::load(&node),
            Err(ConfigError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_mesh_index_out_of_range_rejected() {
        let bad = ConfigNode::new("triangle_mesh")
            .with_attribute("id", "bad")
            .with_attribute("type", "raw")
            .with_child(ConfigNode::leaf("positions", "0 0 0  1 0 0  0 1 0"))
            .with_child(ConfigNode::leaf("faces", "0 1 3"));
        let node =
            ConfigNode::new("assets").with_child(ConfigNode::new("triangle_meshes").with_child(bad));
        assert!(Assets::load(&node).is_err());
    }

    #[test]
    fn test_build_scene_from_config() {
        let assets = Assets::load(&assets_node()).unwrap();
        let scene = build_scene(&scene_node(), &assets, None).unwrap();
        assert_eq!(scene.num_primitives(), 3);
        assert_eq!(scene.num_lights(), 1);
        assert_eq!(scene.film().width(), 64);

        // The composed transform places the light quad at y = 0.2
        let mut ray = lux_math::Ray::infinite(Vec3::new(0.0, 0.1, 0.0), Vec3::Y);
        let isect = scene.intersect(&mut ray).expect("light quad");
        assert!((isect.geom.p.y - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_nested_transforms_compose() {
        let assets = Assets::load(&assets_node()).unwrap();
        // Wrap the quad in an outer node that lifts everything by 1
        let scene_node = ConfigNode::new("scene").with_child(
            ConfigNode::new("root").with_child(
                ConfigNode::new("node")
                    .with_child(
                        ConfigNode::new("transform")
                            .with_child(ConfigNode::leaf("translate", "0 1 0")),
                    )
                    .with_child(
                        ConfigNode::new("node")
                            .with_child(
                                ConfigNode::new("transform")
                                    .with_child(ConfigNode::leaf("translate", "0 0.2 0")),
                            )
                            .with_child(
                                ConfigNode::new("triangle_mesh").with_attribute("ref", "quad"),
                            )
                            .with_child(
                                ConfigNode::new("bsdf").with_attribute("ref", "diffuse_white"),
                            ),
                    )
                    .with_child(
                        ConfigNode::new("node").with_child(
                            ConfigNode::new("camera").with_attribute("ref", "camera_1"),
                        ),
                    ),
            ),
        );
        let scene = build_scene(&scene_node, &assets, None).unwrap();
        let mut ray = lux_math::Ray::infinite(Vec3::new(0.0, 0.0, 0.0), Vec3::Y);
        let isect = scene.intersect(&mut ray).expect("lifted quad");
        assert!((isect.geom.p.y - 1.2).abs() < 1e-4);
    }
}
