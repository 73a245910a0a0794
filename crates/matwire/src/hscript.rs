//! A `HostGraph` that records the network as an hscript. Sourcing the script
//! inside the host recreates the nodes, wires and layout.
//!
//! Types:
//!
//! - `HscriptHost` accumulates commands for one parent network.
//!
//! Functions:
//!
//! - `HscriptHost::finish` returns the script text.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use matgraph::{HostGraph, HostParam, ParamValue, Position};

#[derive(Debug)]
pub struct HscriptHost {
    parent: String,
    script: String,
    used_names: BTreeSet<String>,
}

impl HscriptHost {
    pub fn new(parent: impl Into<String>) -> Self {
        let parent = parent.into();
        let mut script = String::new();
        let _ = writeln!(script, "opcf {}", quote(&parent));
        Self {
            parent,
            script,
            used_names: BTreeSet::new(),
        }
    }

    pub fn comment(&mut self, text: &str) {
        for line in text.lines() {
            let _ = writeln!(self.script, "# {line}");
        }
    }

    pub fn finish(self) -> String {
        self.script
    }

    /// The host renames clashing nodes by appending a counter; mirror that.
    fn unique_name(&mut self, name: &str) -> String {
        if self.used_names.insert(name.to_string()) {
            return name.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{name}{counter}");
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn node_path(&self, name: &str) -> String {
        format!("{}/{}", self.parent.trim_end_matches('/'), name)
    }
}

impl HostGraph for HscriptHost {
    type Handle = String;

    fn create_node(
        &mut self,
        kind: &str,
        name: &str,
        params: &[(String, HostParam<String>)],
    ) -> Result<String, String> {
        if kind.trim().is_empty() {
            return Err("node kind must not be empty".to_string());
        }
        let name = self.unique_name(name);
        let _ = writeln!(self.script, "opadd -n {kind} {name}");
        for (parm, value) in params {
            let rendered = match value {
                HostParam::Value(value) => render_value(value),
                HostParam::Node(handle) => quote(&self.node_path(handle)),
            };
            let _ = writeln!(self.script, "opparm {name} {parm} ( {rendered} )");
        }
        Ok(name)
    }

    fn connect(
        &mut self,
        source: &String,
        output: &str,
        target: &String,
        input: &str,
    ) -> Result<(), String> {
        let _ = writeln!(self.script, "opwire -n -o {output} {source} -{input} {target}");
        Ok(())
    }

    fn set_position(&mut self, node: &String, position: Position) -> Result<(), String> {
        let _ = writeln!(
            self.script,
            "opmove -x {} -y {} {node}",
            position.x, position.y
        );
        Ok(())
    }
}

fn render_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(flag) => String::from(if *flag { "1" } else { "0" }),
        ParamValue::Int(number) => number.to_string(),
        ParamValue::Float(number) => number.to_string(),
        ParamValue::Vec3([x, y, z]) => format!("{x} {y} {z}"),
        ParamValue::Str(text) | ParamValue::NodeRef(text) => quote(text),
    }
}

fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use matgraph::{
        build, materialize, BackendDescriptor, BackendId, LayoutOptions, PixelFormat,
        TextureDescriptor, TextureRole, TextureSet,
    };

    #[test]
    fn emits_script_for_materialx_graph() {
        let textures = TextureSet::from_descriptors([TextureDescriptor::literal(
            TextureRole::Normal,
            "/t/crate_normal.png",
            PixelFormat::Png,
        )]);
        let spec = build(
            "crate",
            &textures,
            &BackendDescriptor::builtin(BackendId::MaterialX, true),
            &LayoutOptions::default(),
        );
        let mut host = HscriptHost::new("/mat");
        let main = materialize(&spec, &mut host).unwrap();
        let script = host.finish();

        assert_eq!(main, "crate");
        assert!(script.starts_with("opcf \"/mat\"\n"));
        assert!(script.contains("opadd -n mtlxstandardsurface crate_surface\n"));
        assert!(script.contains("opparm crate_normal file ( \"/t/crate_normal.png\" )\n"));
        assert!(script.contains("opwire -n -o out crate_normal -normal crate_surface\n"));
        assert!(script.contains("opparm crate surface ( \"/mat/crate_surface\" )\n"));
        assert!(script.contains("opmove -x -4 -y 0 crate_normal\n"));
    }

    #[test]
    fn clashing_names_get_a_counter() {
        let mut host = HscriptHost::new("/mat");
        let first = host.create_node("material", "wood", &[]).unwrap();
        let second = host.create_node("material", "wood", &[]).unwrap();
        assert_eq!(first, "wood");
        assert_eq!(second, "wood1");
    }

    #[test]
    fn renders_parameter_values() {
        assert_eq!(render_value(&ParamValue::Bool(true)), "1");
        assert_eq!(render_value(&ParamValue::Vec3([1.0, 1.0, 1.0])), "1 1 1");
        assert_eq!(render_value(&ParamValue::Str("a \"b\"".into())), "\"a \\\"b\\\"\"");
    }
}
