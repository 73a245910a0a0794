//! Abstract material graph and the builder that assembles it.
//!
//! The builder never touches a host. It turns normalized textures plus one
//! backend descriptor into node specifications, connections and a fixed grid
//! placement. Output order is a pure function of the input: nodes are the
//! surface, then one source per mapped role in the backend's mapping order,
//! then the wrapper if the backend has one.
//!
//! Types:
//!
//! - `ParamValue` is a typed node parameter.
//! - `NodeSpec`/`ConnectionSpec` describe nodes and wires by stable id.
//! - `Position` is a 2-D network editor coordinate.
//! - `LayoutOptions` holds the grid spacing.
//! - `MaterialGraphSpec` is the immutable build result.
//!
//! Functions:
//!
//! - `build` assembles a `MaterialGraphSpec`.
//! - `clean_node_name` sanitizes a material name into a host-safe node name.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{BackendDescriptor, BackendId};
use crate::sequence::TextureSet;
use crate::texture::TextureRole;

pub const SURFACE_ID: &str = "surface";
pub const WRAPPER_ID: &str = "wrapper";

const MAX_NODE_NAME: usize = 30;
const FALLBACK_NODE_NAME: &str = "default_node";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vec3([f64; 3]),
    Str(String),
    /// Id of another node in the same graph.
    NodeRef(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub params: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub source: String,
    pub output: String,
    pub target: String,
    pub input: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Distance from the surface to the source column, to the left.
    pub column_offset: f64,
    pub row_spacing: f64,
    /// Distance from the surface to the wrapper, to the right.
    pub wrapper_offset: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            column_offset: 4.0,
            row_spacing: 2.0,
            wrapper_offset: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialGraphSpec {
    pub name: String,
    pub backend: BackendId,
    pub nodes: Vec<NodeSpec>,
    pub connections: Vec<ConnectionSpec>,
    pub positions: BTreeMap<String, Position>,
}

impl MaterialGraphSpec {
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn surface(&self) -> Option<&NodeSpec> {
        self.node(SURFACE_ID)
    }

    pub fn wrapper(&self) -> Option<&NodeSpec> {
        self.node(WRAPPER_ID)
    }

    /// The node a caller assigns to geometry: the wrapper if any, else the surface.
    pub fn main_node(&self) -> Option<&NodeSpec> {
        self.wrapper().or_else(|| self.surface())
    }

    pub fn sources(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes
            .iter()
            .filter(|node| node.id != SURFACE_ID && node.id != WRAPPER_ID)
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }
}

pub fn source_id(role: TextureRole) -> String {
    format!("tex_{}", role.as_str())
}

pub fn build(
    name: &str,
    textures: &TextureSet,
    backend: &BackendDescriptor,
    layout: &LayoutOptions,
) -> MaterialGraphSpec {
    let base_name = clean_node_name(name);
    let mut surface_params: BTreeMap<String, ParamValue> = backend
        .surface_params
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();

    let mut sources = Vec::new();
    let mut roles = Vec::new();
    let mut connections = Vec::new();
    for mapping in &backend.mappings {
        let Some(descriptor) = textures.get(mapping.role) else {
            continue;
        };
        let id = source_id(mapping.role);
        let mut params = BTreeMap::new();
        params.insert(
            backend.source_file_param.to_string(),
            ParamValue::Str(descriptor.path().to_string()),
        );
        params.insert(
            backend.source_colorspace_param.to_string(),
            ParamValue::Str(mapping.color_space.as_str().to_string()),
        );
        if let Some(signature) = mapping.signature {
            params.insert("signature".to_string(), ParamValue::Str(signature.to_string()));
        }
        for toggle in mapping.enable_params {
            surface_params.insert(toggle.to_string(), ParamValue::Bool(true));
        }
        if descriptor.is_sequence() && !backend.supports_tiles {
            debug!(
                backend = %backend.id,
                role = %mapping.role,
                "backend has no native tile support; wiring templated path as-is"
            );
        }
        connections.push(ConnectionSpec {
            source: id.clone(),
            output: backend.source_output.to_string(),
            target: SURFACE_ID.to_string(),
            input: mapping.input.to_string(),
        });
        roles.push(mapping.role);
        sources.push(NodeSpec {
            id,
            kind: backend.source_kind.to_string(),
            name: format!("{base_name}_{}", mapping.role.as_str()),
            params,
        });
    }

    let surface_name = if backend.wrapper.is_some() {
        format!("{base_name}_surface")
    } else {
        base_name.clone()
    };
    let mut nodes = Vec::with_capacity(sources.len() + 2);
    nodes.push(NodeSpec {
        id: SURFACE_ID.to_string(),
        kind: backend.surface_kind.to_string(),
        name: surface_name,
        params: surface_params,
    });

    let mut positions = BTreeMap::new();
    positions.insert(SURFACE_ID.to_string(), Position::default());
    // rows follow role priority, not mapping order
    let mut rows: Vec<(TextureRole, &str)> = roles
        .iter()
        .copied()
        .zip(sources.iter().map(|source| source.id.as_str()))
        .collect();
    rows.sort_by_key(|(role, _)| *role);
    let centre = (rows.len() as f64 - 1.0) / 2.0;
    for (row, (_, id)) in rows.iter().enumerate() {
        positions.insert(
            id.to_string(),
            Position {
                x: -layout.column_offset,
                y: (centre - row as f64) * layout.row_spacing,
            },
        );
    }
    nodes.extend(sources);

    if let Some(wrapper) = &backend.wrapper {
        let mut params = BTreeMap::new();
        params.insert(
            wrapper.surface_param.to_string(),
            ParamValue::NodeRef(SURFACE_ID.to_string()),
        );
        nodes.push(NodeSpec {
            id: WRAPPER_ID.to_string(),
            kind: wrapper.kind.to_string(),
            name: base_name,
            params,
        });
        positions.insert(
            WRAPPER_ID.to_string(),
            Position {
                x: layout.wrapper_offset,
                y: 0.0,
            },
        );
    }

    debug!(
        material = name,
        backend = %backend.id,
        nodes = nodes.len(),
        connections = connections.len(),
        "built material graph"
    );

    MaterialGraphSpec {
        name: name.to_string(),
        backend: backend.id,
        nodes,
        connections,
        positions,
    }
}

/// Reduces `name` to ASCII letters, digits and single underscores, never
/// starting with a digit and at most 30 characters long.
pub fn clean_node_name(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        cleaned.insert_str(0, "n_");
    }
    cleaned.truncate(MAX_NODE_NAME);

    let mut collapsed = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }
    let trimmed = collapsed.trim_matches('_');
    if trimmed.len() < 2 {
        return FALLBACK_NODE_NAME.to_string();
    }
    trimmed.to_string()
}
