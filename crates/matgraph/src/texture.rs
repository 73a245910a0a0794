//! Shared texture vocabulary used by every stage of the pipeline: the closed set
//! of shading roles, declared pixel formats, the raw files produced by directory
//! enumeration and classification, and the normalized descriptors the graph
//! builder consumes.
//!
//! Types:
//!
//! - `TextureRole` enumerates shading channels in classifier priority order.
//! - `PixelFormat` records the declared image format of a file.
//! - `TextureFile` is what an enumeration collaborator hands to the engine.
//! - `RawTextureFile` is a classified file with its tile id, if any.
//! - `TextureDescriptor` is the sequence-aware unit one graph source node is
//!   built from.
//!
//! Functions:
//!
//! - `split_tile` locates a `.1001`/`_1001` tile token inside a path so the
//!   sequence detector can template it and the classifier can ignore it.
//! - `is_supported_texture` filters enumeration results by extension.
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const TILE_PLACEHOLDER: &str = "<UDIM>";
pub const TILE_RANGE: RangeInclusive<u16> = 1001..=1100;

pub const SUPPORTED_TEXTURE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "tga", "tif", "tiff", "exr", "hdr", "pic", "rat",
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TextureRole {
    Normal,
    Metallic,
    Roughness,
    AmbientOcclusion,
    Emissive,
    Opacity,
    Height,
    BaseColor,
    Unclassified,
}

impl TextureRole {
    /// Channel roles in classifier priority order; `Unclassified` is excluded.
    pub const CHANNELS: [TextureRole; 8] = [
        TextureRole::Normal,
        TextureRole::Metallic,
        TextureRole::Roughness,
        TextureRole::AmbientOcclusion,
        TextureRole::Emissive,
        TextureRole::Opacity,
        TextureRole::Height,
        TextureRole::BaseColor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BaseColor => "base_color",
            Self::Normal => "normal",
            Self::Roughness => "roughness",
            Self::Metallic => "metallic",
            Self::AmbientOcclusion => "ambient_occlusion",
            Self::Emissive => "emissive",
            Self::Opacity => "opacity",
            Self::Height => "height",
            Self::Unclassified => "unclassified",
        }
    }

    pub fn is_channel(self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl fmt::Display for TextureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextureRole {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "base_color" | "basecolor" | "basemap" | "albedo" | "diffuse" => Ok(Self::BaseColor),
            "normal" => Ok(Self::Normal),
            "roughness" => Ok(Self::Roughness),
            "metallic" | "metalness" => Ok(Self::Metallic),
            "ambient_occlusion" | "ao" => Ok(Self::AmbientOcclusion),
            "emissive" | "emission" => Ok(Self::Emissive),
            "opacity" | "alpha" => Ok(Self::Opacity),
            "height" | "displacement" => Ok(Self::Height),
            "unclassified" => Ok(Self::Unclassified),
            other => Err(format!("unknown texture role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Png,
    Jpeg,
    Tga,
    Tiff,
    Exr,
    Hdr,
    Pic,
    Rat,
    Other(String),
}

impl PixelFormat {
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "tga" => Self::Tga,
            "tif" | "tiff" => Self::Tiff,
            "exr" => Self::Exr,
            "hdr" => Self::Hdr,
            "pic" => Self::Pic,
            "rat" => Self::Rat,
            _ => Self::Other(ext),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or_else(|| Self::Other(String::new()))
    }
}

pub fn is_supported_texture(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            SUPPORTED_TEXTURE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// A file as reported by directory enumeration, before classification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextureFile {
    pub path: PathBuf,
    pub format: PixelFormat,
}

impl TextureFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = PixelFormat::from_path(&path);
        Self { path, format }
    }

    pub fn with_format(path: impl Into<PathBuf>, format: PixelFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTextureFile {
    pub path: PathBuf,
    pub role: TextureRole,
    pub tile: Option<u16>,
    pub format: PixelFormat,
}

/// One logical texture per role: either a literal path or a `<UDIM>` template
/// with the tile ids actually present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureDescriptor {
    role: TextureRole,
    path: String,
    tiles: Vec<u16>,
    format: PixelFormat,
}

impl TextureDescriptor {
    pub fn literal(role: TextureRole, path: impl Into<String>, format: PixelFormat) -> Self {
        Self {
            role,
            path: path.into(),
            tiles: Vec::new(),
            format,
        }
    }

    /// Returns `None` unless `template` holds exactly one placeholder and at
    /// least one tile is given.
    pub fn sequence(
        role: TextureRole,
        template: impl Into<String>,
        tiles: impl IntoIterator<Item = u16>,
        format: PixelFormat,
    ) -> Option<Self> {
        let template = template.into();
        if template.matches(TILE_PLACEHOLDER).count() != 1 {
            return None;
        }
        let mut tiles: Vec<u16> = tiles.into_iter().collect();
        tiles.sort_unstable();
        tiles.dedup();
        if tiles.is_empty() {
            return None;
        }
        Some(Self {
            role,
            path: template,
            tiles,
            format,
        })
    }

    pub fn role(&self) -> TextureRole {
        self.role
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tiles(&self) -> &[u16] {
        &self.tiles
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn is_sequence(&self) -> bool {
        !self.tiles.is_empty()
    }

    pub fn tile_path(&self, tile: u16) -> Option<String> {
        if !self.tiles.contains(&tile) {
            return None;
        }
        Some(self.path.replacen(TILE_PLACEHOLDER, &format!("{tile:04}"), 1))
    }

    /// Concrete file paths this descriptor stands for.
    pub fn concrete_paths(&self) -> Vec<String> {
        if self.tiles.is_empty() {
            return vec![self.path.clone()];
        }
        self.tiles
            .iter()
            .filter_map(|tile| self.tile_path(*tile))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSplit<'a> {
    /// Everything before the four tile digits, separator included.
    pub head: &'a str,
    pub tile: u16,
    /// Everything after the tile digits, starting with the extension dot.
    pub tail: &'a str,
}

impl TileSplit<'_> {
    pub fn template(&self) -> String {
        format!("{}{}{}", self.head, TILE_PLACEHOLDER, self.tail)
    }
}

/// Finds a tile token directly before the extension of the file name in
/// `path`. Only `.NNNN` and `_NNNN` within `TILE_RANGE` count; anything else is
/// ordinary filename digits.
pub fn split_tile(path: &str) -> Option<TileSplit<'_>> {
    if path.contains(TILE_PLACEHOLDER) {
        return None;
    }
    let name_start = path.rfind(['/', '\\']).map(|idx| idx + 1).unwrap_or(0);
    let name = &path[name_start..];
    let ext_dot = name.rfind('.')?;
    let stem = name[..ext_dot].as_bytes();
    // at least one base character, a separator and four digits
    if stem.len() < 6 {
        return None;
    }
    let digits = &stem[stem.len() - 4..];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let separator = stem[stem.len() - 5];
    if separator != b'.' && separator != b'_' {
        return None;
    }
    let tile = digits
        .iter()
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));
    if !TILE_RANGE.contains(&tile) {
        return None;
    }
    let digits_start = name_start + stem.len() - 4;
    let digits_end = name_start + stem.len();
    Some(TileSplit {
        head: &path[..digits_start],
        tile,
        tail: &path[digits_end..],
    })
}

/// The file name without directory, extension or trailing tile token.
pub(crate) fn classification_stem(filename: &str) -> &str {
    let name_start = filename
        .rfind(['/', '\\'])
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let name = &filename[name_start..];
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    };
    if let Some(split) = split_tile(name) {
        // head ends with the separator
        let head = split.head;
        return &head[..head.len().saturating_sub(1)];
    }
    stem
}
