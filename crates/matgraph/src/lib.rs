//! Turns loose texture file lists into backend-appropriate material graphs.
//!
//! The pipeline runs leaves first: `classify` assigns a shading role to each
//! file, `sequence` collapses UDIM tiles into templated descriptors, `select`
//! picks a backend from the session's `BackendCapabilityModel`, and `graph`
//! assembles an abstract node network that a `HostGraph` implementation turns
//! into real nodes. `MaterialEngine` composes the stages and caches results.
mod backend;
mod cache;
mod classify;
mod engine;
pub mod error;
mod graph;
mod host;
mod select;
mod sequence;
mod texture;

pub use backend::{
    BackendCapabilityModel, BackendDescriptor, BackendId, BackendReport, CapabilitiesReport,
    CapabilityError, CapabilityProbe, ChannelMapping, ColorSpace, WrapperSpec,
};
pub use cache::{CacheStats, ResultCache, DEFAULT_CAPACITY};
pub use classify::{classify, classify_path, Classification, Classifier, Pattern};
pub use engine::{CreatedMaterial, EngineCacheInfo, EngineSettings, MaterialEngine};
pub use error::MaterialError;
pub use graph::{
    build, clean_node_name, source_id, ConnectionSpec, LayoutOptions, MaterialGraphSpec,
    NodeSpec, ParamValue, Position, SURFACE_ID, WRAPPER_ID,
};
pub use host::{materialize, GraphMaterializationError, HostGraph, HostParam};
pub use select::{select, RequestedBackend, SelectError, Selection, SelectionReason};
pub use sequence::{
    normalize, tile_statistics, ConflictError, ConflictPolicy, NormalizeOptions, RejectedGroup,
    TextureSet, TileStatistics, DEFAULT_MIN_TILES,
};
pub use texture::{
    is_supported_texture, split_tile, PixelFormat, RawTextureFile, TextureDescriptor, TextureFile,
    TextureRole, TileSplit, SUPPORTED_TEXTURE_EXTENSIONS, TILE_PLACEHOLDER, TILE_RANGE,
};
