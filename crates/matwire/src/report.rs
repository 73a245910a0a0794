//! JSON shapes printed by the CLI. They borrow from engine results so a report
//! is built and serialised in one step.

use std::path::Path;

use matbatch::{BatchReport, BatchSummary, MatchStrategy};
use matgraph::{
    BackendId, CreatedMaterial, MaterialGraphSpec, RejectedGroup, SelectionReason, TextureRole,
    TextureSet, TileStatistics,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TextureEntry<'a> {
    pub role: TextureRole,
    pub path: &'a str,
    #[serde(skip_serializing_if = "<[u16]>::is_empty")]
    pub tiles: &'a [u16],
}

#[derive(Debug, Serialize)]
pub struct MaterialReport<'a> {
    pub name: &'a str,
    pub backend: BackendId,
    pub reason: SelectionReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<BackendId>,
    pub textures: Vec<TextureEntry<'a>>,
    #[serde(skip_serializing_if = "<[RejectedGroup]>::is_empty")]
    pub rejected: &'a [RejectedGroup],
    pub graph: &'a MaterialGraphSpec,
}

impl<'a> MaterialReport<'a> {
    pub fn new(name: &'a str, created: &'a CreatedMaterial) -> Self {
        Self {
            name,
            backend: created.selection.backend,
            reason: created.selection.reason,
            fallback_from: created.selection.fallback_from,
            textures: texture_entries(&created.textures),
            rejected: created.textures.rejected(),
            graph: &created.spec,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendReport<'a> {
    pub backend: BackendId,
    pub reason: SelectionReason,
    pub textures: Vec<TextureEntry<'a>>,
    pub tiles: TileStatistics,
}

impl<'a> RecommendReport<'a> {
    pub fn new(
        backend: BackendId,
        reason: SelectionReason,
        textures: &'a TextureSet,
        tiles: TileStatistics,
    ) -> Self {
        Self {
            backend,
            reason,
            textures: texture_entries(textures),
            tiles,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Created,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct BatchEntry<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MatchStrategy>,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialReport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchJson<'a> {
    pub summary: BatchSummary,
    pub materials: Vec<BatchEntry<'a>>,
}

impl<'a> BatchJson<'a> {
    pub fn new(report: &'a BatchReport) -> Self {
        let materials = report
            .outcomes
            .iter()
            .map(|outcome| {
                let item = &outcome.item;
                let (status, material, error) = match &outcome.result {
                    Ok(created) => (
                        ItemStatus::Created,
                        Some(MaterialReport::new(&item.name, created)),
                        None,
                    ),
                    Err(err) => (ItemStatus::Failed, None, Some(err.to_string())),
                };
                BatchEntry {
                    name: &item.name,
                    model: item.model.as_deref(),
                    strategy: item.strategy,
                    status,
                    material,
                    error,
                }
            })
            .collect();
        Self {
            summary: report.summary(),
            materials,
        }
    }
}

fn texture_entries(textures: &TextureSet) -> Vec<TextureEntry<'_>> {
    textures
        .descriptors()
        .values()
        .map(|descriptor| TextureEntry {
            role: descriptor.role(),
            path: descriptor.path(),
            tiles: descriptor.tiles(),
        })
        .collect()
}
