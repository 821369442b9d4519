//! Scene data, film and configuration for the lux renderer.
//!
//! This crate provides:
//!
//! - **Mesh**: triangle mesh geometry shared by primitives
//! - **Film**: RGB accumulation buffer with HDR/PNG output
//! - **Config**: the opaque configuration node tree consumed by the engine

pub mod config;
pub mod film;
pub mod mesh;

pub use config::{ConfigError, ConfigNode};
pub use film::{Film, FilmError};
pub use mesh::TriangleMesh;
