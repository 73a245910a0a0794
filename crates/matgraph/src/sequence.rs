//! Collapses classified files into at most one `TextureDescriptor` per role,
//! detecting UDIM-style tile sequences on the way.
//!
//! Files are grouped by role, then by their path with the tile digits replaced
//! by `<UDIM>`. A group holding at least `min_tiles` distinct tile ids becomes a
//! templated sequence (gaps are kept as-is); anything else becomes a literal
//! path. When one role ends up with several candidate groups the largest wins
//! and ties go to the alphabetically first path. Losers are returned in
//! `TextureSet::rejected`, or the whole call fails with `ConflictError` under
//! `ConflictPolicy::Reject`.
//!
//! Types:
//!
//! - `ConflictPolicy` selects between precedence and strict rejection.
//! - `NormalizeOptions` carries the policy and the minimum tile count.
//! - `TextureSet` holds the chosen descriptors and the rejected groups.
//! - `RejectedGroup` / `ConflictError` describe discarded candidates.
//! - `TileStatistics` summarises tile usage across a file list.
//!
//! Functions:
//!
//! - `normalize` is the detector entry point.
//! - `tile_statistics` powers CLI reporting.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::texture::{split_tile, PixelFormat, RawTextureFile, TextureDescriptor, TextureRole};

pub const DEFAULT_MIN_TILES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the largest group, ties broken by the alphabetically first path.
    #[default]
    PreferLargest,
    /// Fail with `ConflictError` instead of discarding candidates.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub policy: ConflictPolicy,
    pub min_tiles: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::default(),
            min_tiles: DEFAULT_MIN_TILES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RejectedGroup {
    pub role: TextureRole,
    pub base: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{role} textures have several base names: {candidates:?}")]
pub struct ConflictError {
    pub role: TextureRole,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureSet {
    descriptors: BTreeMap<TextureRole, TextureDescriptor>,
    rejected: Vec<RejectedGroup>,
}

impl TextureSet {
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = TextureDescriptor>) -> Self {
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|descriptor| (descriptor.role(), descriptor))
                .collect(),
            rejected: Vec::new(),
        }
    }

    pub fn get(&self, role: TextureRole) -> Option<&TextureDescriptor> {
        self.descriptors.get(&role)
    }

    pub fn descriptors(&self) -> &BTreeMap<TextureRole, TextureDescriptor> {
        &self.descriptors
    }

    pub fn rejected(&self) -> &[RejectedGroup] {
        &self.rejected
    }

    pub fn has_sequences(&self) -> bool {
        self.descriptors.values().any(TextureDescriptor::is_sequence)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Files sharing one base (template or literal path) within a role.
#[derive(Debug)]
struct Candidate<'a> {
    base: String,
    files: BTreeMap<String, &'a RawTextureFile>,
}

impl Candidate<'_> {
    fn first_path(&self) -> &str {
        self.files.keys().next().map(String::as_str).unwrap_or("")
    }

    fn tiles(&self) -> BTreeMap<u16, &RawTextureFile> {
        self.files
            .iter()
            .filter_map(|(_, file)| file.tile.map(|tile| (tile, *file)))
            .collect()
    }
}

pub fn normalize(
    files: &[RawTextureFile],
    options: &NormalizeOptions,
) -> Result<TextureSet, ConflictError> {
    let mut by_role: BTreeMap<TextureRole, Vec<&RawTextureFile>> = BTreeMap::new();
    for file in files {
        if !file.role.is_channel() {
            debug!(path = %file.path.display(), "skipping unclassified texture");
            continue;
        }
        by_role.entry(file.role).or_default().push(file);
    }

    let mut set = TextureSet::default();
    for (role, role_files) in by_role {
        let mut candidates = group_candidates(&role_files, options.min_tiles);
        // largest first, then alphabetical by first path
        candidates.sort_by(|a, b| {
            b.files
                .len()
                .cmp(&a.files.len())
                .then_with(|| a.first_path().cmp(b.first_path()))
        });

        if candidates.len() > 1 && options.policy == ConflictPolicy::Reject {
            return Err(ConflictError {
                role,
                candidates: candidates.iter().map(|c| c.base.clone()).collect(),
            });
        }

        let mut candidates = candidates.into_iter();
        let Some(winner) = candidates.next() else {
            continue;
        };
        for loser in candidates {
            warn!(
                role = %role,
                kept = %winner.base,
                discarded = %loser.base,
                files = loser.files.len(),
                "multiple base names for one role; applying precedence"
            );
            set.rejected.push(RejectedGroup {
                role,
                base: loser.base,
                files: loser.files.into_keys().collect(),
            });
        }

        let descriptor = describe(role, winner, options.min_tiles);
        debug!(
            role = %role,
            path = descriptor.path(),
            tiles = descriptor.tiles().len(),
            "normalized texture"
        );
        set.descriptors.insert(role, descriptor);
    }

    Ok(set)
}

/// Tile runs shorter than `min_tiles` are split back into one candidate per
/// file, so precedence and strict mode see every file.
fn group_candidates<'a>(files: &[&'a RawTextureFile], min_tiles: usize) -> Vec<Candidate<'a>> {
    let mut groups: BTreeMap<String, BTreeMap<String, &'a RawTextureFile>> = BTreeMap::new();
    for file in files {
        let path = file.path.to_string_lossy().into_owned();
        let base = file
            .tile
            .and_then(|_| split_tile(&path))
            .map(|split| split.template())
            .unwrap_or_else(|| path.clone());
        groups.entry(base).or_default().insert(path, *file);
    }

    let mut candidates = Vec::with_capacity(groups.len());
    for (base, files) in groups {
        let tiled = files.values().filter(|file| file.tile.is_some()).count();
        if tiled > 1 && tiled < min_tiles.max(1) {
            debug!(
                template = %base,
                tiles = tiled,
                min_tiles,
                "too few tiles; keeping files separate"
            );
            candidates.extend(files.into_iter().map(|(path, file)| Candidate {
                base: path.clone(),
                files: BTreeMap::from([(path, file)]),
            }));
        } else {
            candidates.push(Candidate { base, files });
        }
    }
    candidates
}

fn describe(role: TextureRole, candidate: Candidate<'_>, min_tiles: usize) -> TextureDescriptor {
    let tiles = candidate.tiles();
    if tiles.len() >= min_tiles.max(1) {
        let formats: BTreeSet<&PixelFormat> = tiles.values().map(|file| &file.format).collect();
        if formats.len() > 1 {
            warn!(role = %role, template = %candidate.base, ?formats, "mixed formats in tile sequence");
        }
        let format = tiles
            .values()
            .next()
            .map(|file| file.format.clone())
            .unwrap_or(PixelFormat::Other(String::new()));
        if let Some(descriptor) =
            TextureDescriptor::sequence(role, candidate.base.clone(), tiles.keys().copied(), format)
        {
            return descriptor;
        }
    }
    drop(tiles);

    // a lone tile or a plain file: keep the concrete path
    let (path, file) = candidate
        .files
        .into_iter()
        .next()
        .map(|(path, file)| (path, Some(file)))
        .unwrap_or((candidate.base, None));
    let format = file
        .map(|file| file.format.clone())
        .unwrap_or(PixelFormat::Other(String::new()));
    TextureDescriptor::literal(role, path, format)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TileStatistics {
    pub sequences: usize,
    pub tiles: usize,
    pub single_textures: usize,
    pub total_files: usize,
    pub tile_percentage: f64,
}

/// Counts sequences regardless of role, the way a directory preview would.
pub fn tile_statistics(paths: &[String], min_tiles: usize) -> TileStatistics {
    let mut groups: BTreeMap<String, BTreeSet<u16>> = BTreeMap::new();
    let mut singles = 0usize;
    for path in paths {
        match split_tile(path) {
            Some(split) => {
                groups.entry(split.template()).or_default().insert(split.tile);
            }
            None => singles += 1,
        }
    }

    let mut stats = TileStatistics {
        total_files: paths.len(),
        ..TileStatistics::default()
    };
    for tiles in groups.values() {
        if tiles.len() >= min_tiles.max(1) {
            stats.sequences += 1;
            stats.tiles += tiles.len();
        } else {
            singles += tiles.len();
        }
    }
    stats.single_textures = singles;
    if !paths.is_empty() {
        stats.tile_percentage = stats.tiles as f64 / paths.len() as f64 * 100.0;
    }
    stats
}
