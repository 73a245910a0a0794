//! End-to-end entry points composing classification, sequence detection,
//! backend selection and graph assembly.
//!
//! A `MaterialEngine` owns the read-only capability model for the session and
//! two caches: classified directory listings and built graphs. It is `Send +
//! Sync`, so batch drivers share one engine across worker threads.
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::backend::{BackendCapabilityModel, BackendId, CapabilitiesReport};
use crate::cache::{CacheStats, ResultCache, DEFAULT_CAPACITY};
use crate::classify::Classifier;
use crate::error::MaterialError;
use crate::graph::{build, LayoutOptions, MaterialGraphSpec};
use crate::host::{materialize, HostGraph};
use crate::select::{select, RequestedBackend, Selection};
use crate::sequence::{normalize, NormalizeOptions, TextureSet};
use crate::texture::{RawTextureFile, TextureDescriptor, TextureFile, TextureRole};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub normalize: NormalizeOptions,
    pub layout: LayoutOptions,
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub extra_keywords: BTreeMap<TextureRole, Vec<String>>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            normalize: NormalizeOptions::default(),
            layout: LayoutOptions::default(),
            cache_enabled: true,
            cache_capacity: DEFAULT_CAPACITY,
            extra_keywords: BTreeMap::new(),
        }
    }
}

/// Graph cache key: everything `build` depends on besides the engine's layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GraphKey {
    name: String,
    backend: BackendId,
    textures: Vec<TextureDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedMaterial {
    pub spec: Arc<MaterialGraphSpec>,
    pub selection: Selection,
    pub textures: TextureSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineCacheInfo {
    pub graphs: CacheStats,
    pub listings: CacheStats,
}

#[derive(Debug)]
pub struct MaterialEngine {
    capabilities: BackendCapabilityModel,
    classifier: Classifier,
    normalize: NormalizeOptions,
    layout: LayoutOptions,
    graphs: ResultCache<GraphKey, Arc<MaterialGraphSpec>>,
    listings: ResultCache<Vec<TextureFile>, Arc<Vec<RawTextureFile>>>,
}

impl MaterialEngine {
    pub fn new(capabilities: BackendCapabilityModel, settings: EngineSettings) -> Self {
        let classifier = if settings.extra_keywords.is_empty() {
            Classifier::default()
        } else {
            Classifier::with_extra_keywords(&settings.extra_keywords)
        };
        let graphs = ResultCache::new(settings.cache_capacity);
        let listings = ResultCache::new(settings.cache_capacity);
        graphs.set_enabled(settings.cache_enabled);
        listings.set_enabled(settings.cache_enabled);
        Self {
            capabilities,
            classifier,
            normalize: settings.normalize,
            layout: settings.layout,
            graphs,
            listings,
        }
    }

    pub fn capabilities(&self) -> &BackendCapabilityModel {
        &self.capabilities
    }

    /// Classifies an enumeration result; identical listings hit the cache.
    pub fn classify_listing(&self, files: &[TextureFile]) -> Arc<Vec<RawTextureFile>> {
        let mut key = files.to_vec();
        key.sort();
        key.dedup();
        let result = self.listings.get_or_build(key.clone(), || {
            Ok::<_, Infallible>(Arc::new(self.classifier.classify_files(&key)))
        });
        match result {
            Ok(raw) => raw,
            Err(never) => match never {},
        }
    }

    pub fn texture_set(&self, files: &[TextureFile]) -> Result<TextureSet, MaterialError> {
        let raw = self.classify_listing(files);
        Ok(normalize(&raw, &self.normalize)?)
    }

    pub fn create_material(
        &self,
        name: &str,
        files: &[TextureFile],
        requested: RequestedBackend,
    ) -> Result<CreatedMaterial, MaterialError> {
        let textures = self.texture_set(files)?;
        let selection = select(requested, &textures, &self.capabilities)?;
        let descriptor = self
            .capabilities
            .descriptor(selection.backend)
            .ok_or(MaterialError::MissingDescriptor(selection.backend))?;

        let key = GraphKey {
            name: name.to_string(),
            backend: selection.backend,
            textures: textures.descriptors().values().cloned().collect(),
        };
        let result = self.graphs.get_or_build(key, || {
            Ok::<_, Infallible>(Arc::new(build(name, &textures, descriptor, &self.layout)))
        });
        let spec = match result {
            Ok(spec) => spec,
            Err(never) => match never {},
        };

        info!(
            material = name,
            backend = %selection.backend,
            reason = %selection.reason,
            sources = spec.sources().count(),
            rejected = textures.rejected().len(),
            "created material"
        );
        Ok(CreatedMaterial {
            spec,
            selection,
            textures,
        })
    }

    /// Builds the material and hands it to `host`, returning the main node handle.
    pub fn create_and_materialize<H: HostGraph>(
        &self,
        name: &str,
        files: &[TextureFile],
        requested: RequestedBackend,
        host: &mut H,
    ) -> Result<(CreatedMaterial, H::Handle), MaterialError> {
        let created = self.create_material(name, files, requested)?;
        let handle = materialize(&created.spec, host)?;
        Ok((created, handle))
    }

    /// Automatic backend choice for a file list, for previews.
    pub fn get_recommended_backend(&self, files: &[TextureFile]) -> Result<Selection, MaterialError> {
        let textures = self.texture_set(files)?;
        Ok(select(RequestedBackend::Auto, &textures, &self.capabilities)?)
    }

    pub fn capabilities_info(&self) -> CapabilitiesReport {
        self.capabilities.report()
    }

    pub fn cache_info(&self) -> EngineCacheInfo {
        EngineCacheInfo {
            graphs: self.graphs.size_info(),
            listings: self.listings.size_info(),
        }
    }

    pub fn clear_caches(&self) {
        self.graphs.clear();
        self.listings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CapabilityProbe;

    fn engine(probe: &dyn CapabilityProbe) -> MaterialEngine {
        MaterialEngine::new(BackendCapabilityModel::builtin(probe), EngineSettings::default())
    }

    fn files(names: &[&str]) -> Vec<TextureFile> {
        names.iter().map(|name| TextureFile::new(format!("/t/{name}"))).collect()
    }

    #[test]
    fn repeated_builds_share_cached_graph() {
        let engine = engine(&|_: BackendId| true);
        let input = files(&["wood_normal.png", "wood_roughness.png"]);
        let first = engine.create_material("wood", &input, RequestedBackend::Auto).unwrap();
        let mut reversed = input.clone();
        reversed.reverse();
        let second = engine.create_material("wood", &reversed, RequestedBackend::Auto).unwrap();

        assert!(Arc::ptr_eq(&first.spec, &second.spec));
        let info = engine.cache_info();
        assert_eq!(info.graphs.entries, 1);
        assert_eq!(info.graphs.hits, 1);
        assert_eq!(info.listings.hits, 1);

        engine.clear_caches();
        assert_eq!(engine.cache_info().graphs.entries, 0);
    }

    #[test]
    fn material_name_is_part_of_graph_key() {
        let engine = engine(&|_: BackendId| true);
        let input = files(&["wood_normal.png"]);
        let a = engine.create_material("a", &input, RequestedBackend::Auto).unwrap();
        let b = engine.create_material("b", &input, RequestedBackend::Auto).unwrap();
        assert_ne!(a.spec.name, b.spec.name);
        assert_eq!(engine.cache_info().graphs.entries, 2);
    }

    #[test]
    fn strict_mode_surfaces_conflicts() {
        let settings = EngineSettings {
            normalize: NormalizeOptions {
                policy: crate::sequence::ConflictPolicy::Reject,
                ..NormalizeOptions::default()
            },
            ..EngineSettings::default()
        };
        let engine = MaterialEngine::new(
            BackendCapabilityModel::builtin(&|_: BackendId| true),
            settings,
        );
        let input = files(&["oak_normal.png", "pine_normal.png"]);
        let err = engine
            .create_material("wood", &input, RequestedBackend::Auto)
            .unwrap_err();
        assert!(matches!(err, MaterialError::Conflict(_)));
    }

    #[test]
    fn no_backend_is_an_error() {
        let engine = engine(&|_: BackendId| false);
        let err = engine
            .create_material("wood", &files(&["wood_normal.png"]), RequestedBackend::Auto)
            .unwrap_err();
        assert_eq!(err, MaterialError::Select(crate::select::SelectError::NoBackendAvailable));
    }
}
