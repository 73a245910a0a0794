//! Static description of the shading backends the engine can target and which
//! of them the host can actually materialize this session.
//!
//! Each backend carries a hand-authored table mapping texture roles to surface
//! inputs with the color space that input requires. Availability is not
//! discovered here: a `CapabilityProbe` supplied by the host layer answers it
//! once when the model is built, and the model is read-only afterwards. The
//! order of descriptors in the model is the global selection priority.
//!
//! Types:
//!
//! - `BackendId` names the built-in backends.
//! - `ColorSpace` is the color space a source node must declare.
//! - `ChannelMapping` binds one role to one surface input.
//! - `BackendDescriptor` is the full capability record of a backend.
//! - `CapabilityProbe` is the availability seam implemented by hosts.
//! - `BackendCapabilityModel` validates and serves descriptors.
//! - `CapabilitiesReport` is the serializable diagnostics view.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::graph::ParamValue;
use crate::texture::TextureRole;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    #[serde(rename = "materialx")]
    MaterialX,
    #[serde(rename = "principledshader")]
    Principled,
    Redshift,
}

impl BackendId {
    pub const ALL: [BackendId; 3] = [BackendId::MaterialX, BackendId::Principled, BackendId::Redshift];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaterialX => "materialx",
            Self::Principled => "principledshader",
            Self::Redshift => "redshift",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "materialx" | "mtlx" => Ok(Self::MaterialX),
            "principledshader" | "principled" => Ok(Self::Principled),
            "redshift" | "redshift::material" => Ok(Self::Redshift),
            other => Err(format!(
                "unknown backend '{other}'; expected materialx, principledshader or redshift"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    #[serde(rename = "sRGB")]
    Srgb,
    Raw,
}

impl ColorSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Srgb => "sRGB",
            Self::Raw => "Raw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMapping {
    pub role: TextureRole,
    pub input: &'static str,
    pub color_space: ColorSpace,
    /// Output type hint for typed image nodes (MaterialX `signature`).
    pub signature: Option<&'static str>,
    /// Surface toggles that must be switched on once the input is wired.
    pub enable_params: &'static [&'static str],
}

impl ChannelMapping {
    const fn new(role: TextureRole, input: &'static str, color_space: ColorSpace) -> Self {
        Self {
            role,
            input,
            color_space,
            signature: None,
            enable_params: &[],
        }
    }

    const fn typed(mut self, signature: &'static str) -> Self {
        self.signature = Some(signature);
        self
    }

    const fn enabling(mut self, params: &'static [&'static str]) -> Self {
        self.enable_params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrapperSpec {
    pub kind: &'static str,
    /// Parameter on the wrapper holding the surface reference.
    pub surface_param: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendDescriptor {
    pub id: BackendId,
    pub surface_kind: &'static str,
    pub source_kind: &'static str,
    pub source_output: &'static str,
    /// Parameter on the source node that receives the file path.
    pub source_file_param: &'static str,
    pub source_colorspace_param: &'static str,
    pub wrapper: Option<WrapperSpec>,
    pub mappings: Vec<ChannelMapping>,
    pub surface_params: Vec<(&'static str, ParamValue)>,
    pub supports_tiles: bool,
    pub available: bool,
}

impl BackendDescriptor {
    pub fn mapping(&self, role: TextureRole) -> Option<&ChannelMapping> {
        self.mappings.iter().find(|mapping| mapping.role == role)
    }

    pub fn builtin(id: BackendId, available: bool) -> Self {
        use ColorSpace::{Raw, Srgb};
        use TextureRole::*;

        match id {
            BackendId::MaterialX => Self {
                id,
                surface_kind: "mtlxstandardsurface",
                source_kind: "mtlximage",
                source_output: "out",
                source_file_param: "file",
                source_colorspace_param: "filecolorspace",
                wrapper: Some(WrapperSpec {
                    kind: "material",
                    surface_param: "surface",
                }),
                mappings: vec![
                    ChannelMapping::new(BaseColor, "base_color", Srgb).typed("color3"),
                    ChannelMapping::new(Normal, "normal", Raw).typed("vector3"),
                    ChannelMapping::new(Roughness, "specular_roughness", Raw).typed("float"),
                    ChannelMapping::new(Metallic, "metalness", Raw).typed("float"),
                    ChannelMapping::new(Emissive, "emission_color", Srgb).typed("color3"),
                    ChannelMapping::new(Opacity, "opacity", Raw).typed("float"),
                    ChannelMapping::new(Height, "displacement", Raw).typed("float"),
                ],
                surface_params: Vec::new(),
                supports_tiles: true,
                available,
            },
            BackendId::Principled => Self {
                id,
                surface_kind: "principledshader::2.0",
                source_kind: "texture::2.0",
                source_output: "clr",
                source_file_param: "map",
                source_colorspace_param: "colorspace",
                wrapper: None,
                mappings: vec![
                    ChannelMapping::new(BaseColor, "basecolor", Srgb)
                        .enabling(&["basecolor_useTexture"]),
                    ChannelMapping::new(Normal, "baseN", Raw)
                        .enabling(&["baseBumpAndNormal_enable", "baseNormal_useTexture"]),
                    ChannelMapping::new(Roughness, "rough", Raw).enabling(&["rough_useTexture"]),
                    ChannelMapping::new(Metallic, "metallic", Raw)
                        .enabling(&["metallic_useTexture"]),
                    ChannelMapping::new(AmbientOcclusion, "baseAO", Raw)
                        .enabling(&["baseAO_enable"]),
                    ChannelMapping::new(Emissive, "emitcolor", Srgb)
                        .enabling(&["emissive_useTexture"]),
                    ChannelMapping::new(Opacity, "opac", Raw).enabling(&["opac_useTexture"]),
                    ChannelMapping::new(Height, "dispTex", Raw).enabling(&["dispTex_enable"]),
                ],
                surface_params: vec![("basecolor", ParamValue::Vec3([1.0, 1.0, 1.0]))],
                supports_tiles: false,
                available,
            },
            BackendId::Redshift => Self {
                id,
                surface_kind: "redshift::StandardMaterial",
                source_kind: "redshift::TextureSampler",
                source_output: "outColor",
                source_file_param: "tex0",
                source_colorspace_param: "tex0_colorSpace",
                wrapper: Some(WrapperSpec {
                    kind: "redshift_vopnet",
                    surface_param: "surface",
                }),
                mappings: vec![
                    ChannelMapping::new(BaseColor, "base_color", Srgb),
                    ChannelMapping::new(Normal, "bump_input", Raw),
                    ChannelMapping::new(Roughness, "refl_roughness", Raw),
                    ChannelMapping::new(Metallic, "metalness", Raw),
                    ChannelMapping::new(Emissive, "emission_color", Srgb),
                    ChannelMapping::new(Opacity, "opacity_color", Raw),
                ],
                // GGX
                surface_params: vec![("refl_brdf", ParamValue::Int(1))],
                supports_tiles: true,
                available,
            },
        }
    }
}

/// Answers "can the host materialize this backend" once per session.
pub trait CapabilityProbe {
    fn is_available(&self, backend: BackendId) -> bool;
}

impl<F> CapabilityProbe for F
where
    F: Fn(BackendId) -> bool,
{
    fn is_available(&self, backend: BackendId) -> bool {
        self(backend)
    }
}

impl CapabilityProbe for BTreeMap<BackendId, bool> {
    fn is_available(&self, backend: BackendId) -> bool {
        self.get(&backend).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("backend '{0}' is declared more than once")]
    DuplicateBackend(BackendId),
    #[error("backend '{backend}' maps role '{role}' to more than one input")]
    DuplicateRole { backend: BackendId, role: TextureRole },
    #[error("backend '{backend}' maps the unclassified role")]
    UnclassifiedMapping { backend: BackendId },
}

#[derive(Debug, Clone)]
pub struct BackendCapabilityModel {
    backends: Vec<BackendDescriptor>,
}

impl BackendCapabilityModel {
    /// Descriptor order becomes the selection priority.
    pub fn new(backends: Vec<BackendDescriptor>) -> Result<Self, CapabilityError> {
        let mut seen = BTreeSet::new();
        for backend in &backends {
            if !seen.insert(backend.id) {
                return Err(CapabilityError::DuplicateBackend(backend.id));
            }
            let mut roles = BTreeSet::new();
            for mapping in &backend.mappings {
                if !mapping.role.is_channel() {
                    return Err(CapabilityError::UnclassifiedMapping {
                        backend: backend.id,
                    });
                }
                if !roles.insert(mapping.role) {
                    return Err(CapabilityError::DuplicateRole {
                        backend: backend.id,
                        role: mapping.role,
                    });
                }
            }
        }
        Ok(Self { backends })
    }

    /// Built-in backends in the given priority order, availability from `probe`.
    pub fn with_priority(
        priority: &[BackendId],
        probe: &dyn CapabilityProbe,
    ) -> Result<Self, CapabilityError> {
        let descriptors = priority
            .iter()
            .map(|&id| {
                let available = probe.is_available(id);
                debug!(backend = %id, available, "probed backend availability");
                BackendDescriptor::builtin(id, available)
            })
            .collect();
        Self::new(descriptors)
    }

    /// Built-in backends in default priority: MaterialX, Principled, Redshift.
    pub fn builtin(probe: &dyn CapabilityProbe) -> Self {
        let descriptors = BackendId::ALL
            .iter()
            .map(|&id| BackendDescriptor::builtin(id, probe.is_available(id)))
            .collect();
        Self {
            backends: descriptors,
        }
    }

    pub fn descriptor(&self, id: BackendId) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|backend| backend.id == id)
    }

    pub fn is_available(&self, id: BackendId) -> bool {
        self.descriptor(id).map(|backend| backend.available).unwrap_or(false)
    }

    pub fn supports_tiles(&self, id: BackendId) -> bool {
        self.descriptor(id)
            .map(|backend| backend.supports_tiles)
            .unwrap_or(false)
    }

    pub fn mapping_for(&self, id: BackendId) -> Option<&[ChannelMapping]> {
        self.descriptor(id).map(|backend| backend.mappings.as_slice())
    }

    /// Backends in priority order.
    pub fn priority(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.iter()
    }

    pub fn available(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.iter().filter(|backend| backend.available)
    }

    pub fn report(&self) -> CapabilitiesReport {
        CapabilitiesReport {
            priority: self.backends.iter().map(|backend| backend.id).collect(),
            backends: self
                .backends
                .iter()
                .map(|backend| BackendReport {
                    id: backend.id,
                    available: backend.available,
                    supports_tiles: backend.supports_tiles,
                    uses_wrapper: backend.wrapper.is_some(),
                    roles: backend.mappings.iter().map(|mapping| mapping.role).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitiesReport {
    pub priority: Vec<BackendId>,
    pub backends: Vec<BackendReport>,
}

impl CapabilitiesReport {
    pub fn available(&self) -> Vec<BackendId> {
        self.backends
            .iter()
            .filter(|backend| backend.available)
            .map(|backend| backend.id)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendReport {
    pub id: BackendId,
    pub available: bool,
    pub supports_tiles: bool,
    pub uses_wrapper: bool,
    pub roles: Vec<TextureRole>,
}
