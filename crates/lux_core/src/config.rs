//! Opaque configuration node tree.
//!
//! Renderers and the asset registry are configured from a tree of nodes,
//! each with a name, an optional text value, attributes and children. The
//! tree itself is the interface; how it is produced (built in code, parsed
//! from a file by an outer layer) is not this crate's concern.

use std::str::FromStr;

use lux_math::Vec3;
use thiserror::Error;

/// Configuration and asset-build errors.
///
/// All of these abort before rendering starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required element '{key}'")]
    MissingKey { key: String },

    #[error("missing required attribute '{name}'")]
    MissingAttribute { name: String },

    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("unknown {kind} type '{ty}'")]
    UnknownType { kind: &'static str, ty: String },

    #[error("duplicate asset id '{id}'")]
    DuplicateId { id: String },

    #[error("unresolved reference to {kind} '{id}'")]
    UnknownReference { kind: &'static str, id: String },

    #[error("invalid scene: {reason}")]
    InvalidScene { reason: String },
}

/// A node in the configuration tree.
#[derive(Clone, Debug, Default)]
pub struct ConfigNode {
    name: String,
    value: String,
    attributes: Vec<(String, String)>,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A node with only a text value, e.g. `<width>500</width>`.
    pub fn leaf(name: impl Into<String>, value: impl ToString) -> Self {
        Self::new(name).with_value(value)
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((name.into(), value.to_string()));
        self
    }

    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn push_child(&mut self, child: ConfigNode) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Required attribute, e.g. the `type` factory key.
    pub fn require_attribute(&self, name: &str) -> Result<&str, ConfigError> {
        self.attribute(name).ok_or_else(|| ConfigError::MissingAttribute {
            name: name.to_string(),
        })
    }

    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn require_child(&self, name: &str) -> Result<&ConfigNode, ConfigError> {
        self.child(name).ok_or_else(|| ConfigError::MissingKey {
            key: name.to_string(),
        })
    }

    /// Parse this node's own value.
    pub fn parse<T: FromStr>(&self) -> Result<T, ConfigError> {
        self.value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: self.name.clone(),
                value: self.value.clone(),
            })
    }

    /// Required child value, parsed.
    pub fn child_value<T: FromStr>(&self, name: &str) -> Result<T, ConfigError> {
        self.require_child(name)?.parse()
    }

    /// Optional child value with a default. A present but malformed value
    /// is still an error.
    pub fn child_value_or<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        match self.child(name) {
            Some(c) => c.parse(),
            None => Ok(default),
        }
    }

    /// This node's value as a vector: either one component (splatted) or
    /// three whitespace-separated components.
    pub fn parse_vec3(&self) -> Result<Vec3, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: self.name.clone(),
            value: self.value.clone(),
        };
        let comps: Vec<f32> = self
            .value
            .split_whitespace()
            .map(|s| s.parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;
        match comps.as_slice() {
            [v] => Ok(Vec3::splat(*v)),
            [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
            _ => Err(invalid()),
        }
    }

    /// Required child vector value.
    pub fn child_vec3(&self, name: &str) -> Result<Vec3, ConfigError> {
        self.require_child(name)?.parse_vec3()
    }

    /// Optional child vector value with a default.
    pub fn child_vec3_or(&self, name: &str, default: Vec3) -> Result<Vec3, ConfigError> {
        match self.child(name) {
            Some(c) => c.parse_vec3(),
            None => Ok(default),
        }
    }

    /// This node's value as a whitespace-separated list of floats.
    pub fn parse_floats(&self) -> Result<Vec<f32>, ConfigError> {
        self.value
            .split_whitespace()
            .map(|s| s.parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ConfigError::InvalidValue {
                key: self.name.clone(),
                value: self.value.clone(),
            })
    }

    /// This node's value as a whitespace-separated list of indices.
    pub fn parse_indices(&self) -> Result<Vec<u32>, ConfigError> {
        self.value
            .split_whitespace()
            .map(|s| s.parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ConfigError::InvalidValue {
                key: self.name.clone(),
                value: self.value.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer_node() -> ConfigNode {
        ConfigNode::new("renderer")
            .with_attribute("type", "bpt")
            .with_child(ConfigNode::leaf("num_samples", 100))
            .with_child(ConfigNode::leaf("luminance", "2 2 2"))
    }

    #[test]
    fn test_child_value() {
        let node = renderer_node();
        assert_eq!(node.child_value::<u64>("num_samples").unwrap(), 100);
        assert_eq!(node.child_value_or::<u64>("rr_depth", 1).unwrap(), 1);
        assert!(matches!(
            node.child_value::<u64>("absent"),
            Err(ConfigError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_attribute() {
        let node = renderer_node();
        assert_eq!(node.require_attribute("type").unwrap(), "bpt");
        assert!(node.attribute("missing").is_none());
    }

    #[test]
    fn test_vec3_parsing() {
        let node = renderer_node();
        assert_eq!(node.child_vec3("luminance").unwrap(), Vec3::splat(2.0));

        let splat = ConfigNode::leaf("v", "0.5");
        assert_eq!(splat.parse_vec3().unwrap(), Vec3::splat(0.5));

        let bad = ConfigNode::leaf("v", "1 2");
        assert!(bad.parse_vec3().is_err());
    }

    #[test]
    fn test_malformed_value_is_error() {
        let node = ConfigNode::new("r").with_child(ConfigNode::leaf("num_samples", "ten"));
        assert!(matches!(
            node.child_value_or::<u64>("num_samples", 1),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
