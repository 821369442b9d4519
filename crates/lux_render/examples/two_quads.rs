//! Render the two-quad test scene with BPT and write an HDR image.
//!
//! Run with: cargo run --release --example two_quads

use anyhow::Result;
use lux_core::config::ConfigNode;
use lux_render::render_with_config;

fn quad_mesh() -> ConfigNode {
    ConfigNode::new("triangle_mesh")
        .with_attribute("id", "quad")
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

fn main() -> Result<()> {
    let root = ConfigNode::new("lux")
        .with_child(
            ConfigNode::new("assets")
                .with_child(ConfigNode::new("triangle_meshes").with_child(quad_mesh()))
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
                            .with_child(ConfigNode::leaf("width", 500))
                            .with_child(ConfigNode::leaf("height", 500)),
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
                ),
        )
        .with_child(
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
                ),
        )
        .with_child(
            ConfigNode::new("renderer")
                .with_attribute("type", "bpt")
                .with_child(ConfigNode::leaf("num_samples", 1_000_000))
                .with_child(ConfigNode::leaf("rr_depth", 3))
                .with_child(ConfigNode::leaf("samples_per_block", 10_000)),
        );

    let film = render_with_config(&root)?;
    film.save_hdr("two_quads.hdr")?;
    film.save_png("two_quads.png")?;
    println!(
        "rendered {}x{}, mean luminance {}",
        film.width(),
        film.height(),
        film.mean_luminance()
    );
    Ok(())
}
