//! Boundary to the application that owns the real node network.
//!
//! A host exposes three primitives and nothing else. `materialize` walks a
//! `MaterialGraphSpec` in order: nodes first (resolving `NodeRef` parameters to
//! host handles), then connections, then positions. The first host failure
//! stops the walk and is reported as one `GraphMaterializationError`; whatever
//! the host already created stays the host's responsibility.
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::graph::{MaterialGraphSpec, ParamValue, Position};

/// A parameter value after node references have been resolved to host handles.
#[derive(Debug, Clone, PartialEq)]
pub enum HostParam<H> {
    Value(ParamValue),
    Node(H),
}

pub trait HostGraph {
    type Handle: Clone;

    fn create_node(
        &mut self,
        kind: &str,
        name: &str,
        params: &[(String, HostParam<Self::Handle>)],
    ) -> Result<Self::Handle, String>;

    fn connect(
        &mut self,
        source: &Self::Handle,
        output: &str,
        target: &Self::Handle,
        input: &str,
    ) -> Result<(), String>;

    fn set_position(&mut self, node: &Self::Handle, position: Position) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphMaterializationError {
    #[error("host failed to create node '{node}' of kind '{kind}': {message}")]
    CreateNode {
        node: String,
        kind: String,
        message: String,
    },
    #[error("host failed to connect {source_node}.{output} -> {target_node}.{input}: {message}")]
    Connect {
        source_node: String,
        output: String,
        target_node: String,
        input: String,
        message: String,
    },
    #[error("host failed to position node '{node}': {message}")]
    Position { node: String, message: String },
    #[error("graph references unknown node '{0}'")]
    UnknownNode(String),
    #[error("graph has no surface node")]
    MissingSurface,
}

/// Creates the graph through `host` and returns the handle of the main node.
pub fn materialize<H: HostGraph>(
    spec: &MaterialGraphSpec,
    host: &mut H,
) -> Result<H::Handle, GraphMaterializationError> {
    let mut handles: BTreeMap<&str, H::Handle> = BTreeMap::new();

    for node in &spec.nodes {
        let params = node
            .params
            .iter()
            .map(|(key, value)| -> Result<_, GraphMaterializationError> {
                let resolved = match value {
                    ParamValue::NodeRef(target) => handles
                        .get(target.as_str())
                        .cloned()
                        .map(HostParam::Node)
                        .ok_or_else(|| GraphMaterializationError::UnknownNode(target.clone()))?,
                    other => HostParam::Value(other.clone()),
                };
                Ok((key.clone(), resolved))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let handle = host
            .create_node(&node.kind, &node.name, &params)
            .map_err(|message| GraphMaterializationError::CreateNode {
                node: node.id.clone(),
                kind: node.kind.clone(),
                message,
            })?;
        handles.insert(node.id.as_str(), handle);
    }

    for connection in &spec.connections {
        let lookup = |id: &str| {
            handles
                .get(id)
                .ok_or_else(|| GraphMaterializationError::UnknownNode(id.to_string()))
        };
        let source = lookup(&connection.source)?;
        let target = lookup(&connection.target)?;
        host.connect(source, &connection.output, target, &connection.input)
            .map_err(|message| GraphMaterializationError::Connect {
                source_node: connection.source.clone(),
                output: connection.output.clone(),
                target_node: connection.target.clone(),
                input: connection.input.clone(),
                message,
            })?;
    }

    for (id, position) in &spec.positions {
        let handle = handles
            .get(id.as_str())
            .ok_or_else(|| GraphMaterializationError::UnknownNode(id.clone()))?;
        host.set_position(handle, *position)
            .map_err(|message| GraphMaterializationError::Position {
                node: id.clone(),
                message,
            })?;
    }

    let main = spec
        .main_node()
        .ok_or(GraphMaterializationError::MissingSurface)?;
    debug!(material = %spec.name, nodes = handles.len(), "materialized graph");
    handles
        .get(main.id.as_str())
        .cloned()
        .ok_or_else(|| GraphMaterializationError::UnknownNode(main.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendDescriptor, BackendId};
    use crate::graph::{build, LayoutOptions};
    use crate::sequence::TextureSet;
    use crate::texture::{PixelFormat, TextureDescriptor, TextureRole};

    #[derive(Default)]
    struct Recorder {
        created: Vec<(String, String)>,
        wires: Vec<(usize, String, usize, String)>,
        moves: Vec<(usize, Position)>,
        node_refs: Vec<(usize, usize)>,
        fail_kind: Option<String>,
    }

    impl HostGraph for Recorder {
        type Handle = usize;

        fn create_node(
            &mut self,
            kind: &str,
            name: &str,
            params: &[(String, HostParam<usize>)],
        ) -> Result<usize, String> {
            if self.fail_kind.as_deref() == Some(kind) {
                return Err(format!("no node type {kind}"));
            }
            let handle = self.created.len();
            for (_, param) in params {
                if let HostParam::Node(target) = param {
                    self.node_refs.push((handle, *target));
                }
            }
            self.created.push((kind.to_string(), name.to_string()));
            Ok(handle)
        }

        fn connect(&mut self, source: &usize, output: &str, target: &usize, input: &str) -> Result<(), String> {
            self.wires.push((*source, output.to_string(), *target, input.to_string()));
            Ok(())
        }

        fn set_position(&mut self, node: &usize, position: Position) -> Result<(), String> {
            self.moves.push((*node, position));
            Ok(())
        }
    }

    fn spec(backend: BackendId) -> MaterialGraphSpec {
        let textures = TextureSet::from_descriptors([TextureDescriptor::literal(
            TextureRole::Normal,
            "/t/n.png",
            PixelFormat::Png,
        )]);
        build(
            "crate",
            &textures,
            &BackendDescriptor::builtin(backend, true),
            &LayoutOptions::default(),
        )
    }

    #[test]
    fn materializes_nodes_wires_and_positions() {
        let mut host = Recorder::default();
        let main = materialize(&spec(BackendId::MaterialX), &mut host).unwrap();

        assert_eq!(host.created.len(), 3);
        assert_eq!(host.created[main].0, "material");
        assert_eq!(host.wires, vec![(1, "out".to_string(), 0, "normal".to_string())]);
        assert_eq!(host.node_refs, vec![(2, 0)]);
        assert_eq!(host.moves.len(), 3);
    }

    #[test]
    fn surface_is_main_node_without_wrapper() {
        let mut host = Recorder::default();
        let main = materialize(&spec(BackendId::Principled), &mut host).unwrap();
        assert_eq!(host.created[main].0, "principledshader::2.0");
    }

    #[test]
    fn host_failure_is_reported_once() {
        let mut host = Recorder {
            fail_kind: Some("mtlximage".into()),
            ..Recorder::default()
        };
        let err = materialize(&spec(BackendId::MaterialX), &mut host).unwrap_err();
        assert!(matches!(err, GraphMaterializationError::CreateNode { ref node, .. } if node == "tex_normal"));
        assert!(host.wires.is_empty());
    }
}
