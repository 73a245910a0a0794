//! Backend choice for one material.
//!
//! The policy is a data table, not a cascade of attempts: an explicit request
//! wins when that backend is available; otherwise tile sequences pull towards
//! the first tile-capable backend in priority order, and everything else takes
//! the first available backend. The reason travels with the answer so callers
//! can show why a backend was picked.
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{BackendCapabilityModel, BackendId};
use crate::sequence::TextureSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedBackend {
    #[default]
    Auto,
    Backend(BackendId),
}

impl fmt::Display for RequestedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Backend(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for RequestedBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        raw.parse().map(Self::Backend)
    }
}

impl From<BackendId> for RequestedBackend {
    fn from(id: BackendId) -> Self {
        Self::Backend(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// The requested backend was available.
    Requested,
    /// Tile sequences present and this is the first tile-capable backend.
    TileSupport,
    /// First available backend in priority order.
    Priority,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Requested => "requested",
            Self::TileSupport => "tile sequences need native tile support",
            Self::Priority => "first available backend by priority",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Selection {
    pub backend: BackendId,
    pub reason: SelectionReason,
    /// Set when an explicitly requested backend was unavailable.
    pub fallback_from: Option<BackendId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no shading backend is available in this session")]
    NoBackendAvailable,
}

pub fn select(
    requested: RequestedBackend,
    textures: &TextureSet,
    capabilities: &BackendCapabilityModel,
) -> Result<Selection, SelectError> {
    let mut fallback_from = None;
    if let RequestedBackend::Backend(id) = requested {
        if capabilities.is_available(id) {
            debug!(backend = %id, "using requested backend");
            return Ok(Selection {
                backend: id,
                reason: SelectionReason::Requested,
                fallback_from: None,
            });
        }
        warn!(backend = %id, "requested backend unavailable; falling back to automatic selection");
        fallback_from = Some(id);
    }

    if textures.has_sequences() {
        if let Some(backend) = capabilities
            .available()
            .find(|backend| backend.supports_tiles)
        {
            return Ok(Selection {
                backend: backend.id,
                reason: SelectionReason::TileSupport,
                fallback_from,
            });
        }
        debug!("no tile-capable backend available; sequences will be wired as templated paths");
    }

    capabilities
        .available()
        .next()
        .map(|backend| Selection {
            backend: backend.id,
            reason: SelectionReason::Priority,
            fallback_from,
        })
        .ok_or(SelectError::NoBackendAvailable)
}
