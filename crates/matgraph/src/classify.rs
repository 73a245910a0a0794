//! Maps texture filenames onto shading roles using an ordered keyword table.
//!
//! Roles are tried in a fixed priority order (distinctive tokens such as
//! "normal" before generic ones such as "color"), and inside a role the most
//! specific patterns are tried first: `_n`-style suffixes, then whole tokens,
//! then substrings. The first role that matches wins. Matching is
//! case-insensitive and runs on the file stem with any trailing tile token
//! removed, so `wood_n.1001.exr` is still a normal map.
//!
//! Types:
//!
//! - `Pattern` describes one suffix, token or substring rule.
//! - `Classification` reports the role and the pattern that produced it.
//! - `Classifier` owns the rule table; `Classifier::default()` carries the
//!   built-in keywords and `with_extra_keywords` appends user keywords.
//!
//! Functions:
//!
//! - `classify` is the total, side-effect free entry point using the built-in
//!   table.
use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::texture::{classification_stem, split_tile, RawTextureFile, TextureFile, TextureRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Suffix(String),
    Token(String),
    Substring(String),
}

impl Pattern {
    fn specificity(&self) -> u8 {
        match self {
            Self::Suffix(_) => 0,
            Self::Token(_) => 1,
            Self::Substring(_) => 2,
        }
    }

    fn matches(&self, stem: &str, tokens: &[&str]) -> bool {
        match self {
            Self::Suffix(suffix) => stem.len() > suffix.len() && stem.ends_with(suffix.as_str()),
            Self::Token(token) => tokens.iter().any(|candidate| candidate == token),
            Self::Substring(needle) => stem.contains(needle.as_str()),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Suffix(text) | Self::Token(text) | Self::Substring(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub role: TextureRole,
    pub matched: Option<Pattern>,
}

#[derive(Debug, Clone)]
struct RoleRules {
    role: TextureRole,
    patterns: Vec<Pattern>,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<RoleRules>,
}

const SUFFIXES: &[(TextureRole, &[&str])] = &[
    (TextureRole::Normal, &["_n", "-n", "_nrm", "_nor"]),
    (TextureRole::Metallic, &["_m", "-m", "_met"]),
    (TextureRole::Roughness, &["_r", "-r", "_rgh"]),
    (TextureRole::AmbientOcclusion, &["_ao", "-ao"]),
    (TextureRole::Emissive, &["_e", "-e"]),
    (TextureRole::Opacity, &["_a", "-a", "_o", "-o"]),
    (TextureRole::Height, &["_h", "-h"]),
    (TextureRole::BaseColor, &["_d", "-d", "_c", "-c", "_bc"]),
];

const TOKENS: &[(TextureRole, &[&str])] = &[
    (TextureRole::Normal, &["nrm", "nml", "nor", "bump"]),
    (TextureRole::Metallic, &["met", "metal", "spec"]),
    (TextureRole::Roughness, &["rgh", "gloss"]),
    (TextureRole::AmbientOcclusion, &["ao", "occ"]),
    (TextureRole::Emissive, &["emit", "glow"]),
    (TextureRole::Opacity, &["alpha", "mask"]),
    (TextureRole::Height, &["disp", "h", "parallax"]),
    (TextureRole::BaseColor, &["col", "diff", "dif", "alb", "bc", "base"]),
];

const SUBSTRINGS: &[(TextureRole, &[&str])] = &[
    (TextureRole::Normal, &["normal", "norm", "bumpmap"]),
    (TextureRole::Metallic, &["metallic", "metalness", "metal", "specular"]),
    (
        TextureRole::Roughness,
        &["roughness", "rough", "glossiness", "smoothness"],
    ),
    (
        TextureRole::AmbientOcclusion,
        &["ambientocclusion", "ambient_occlusion", "occlusion", "ambient"],
    ),
    (
        TextureRole::Emissive,
        &["emissive", "emission", "selfillum"],
    ),
    (
        TextureRole::Opacity,
        &["opacity", "transparency", "transparent", "alphamap"],
    ),
    (
        TextureRole::Height,
        &["heightmap", "height", "displacement", "parallax"],
    ),
    (
        TextureRole::BaseColor,
        &[
            "basecolor",
            "base_color",
            "albedo",
            "diffuse",
            "basemap",
            "colormap",
            "colour",
            "color",
        ],
    ),
];

fn table_entry<'a>(table: &'a [(TextureRole, &'a [&'a str])], role: TextureRole) -> &'a [&'a str] {
    table
        .iter()
        .find(|(candidate, _)| *candidate == role)
        .map(|(_, items)| *items)
        .unwrap_or(&[])
}

impl Default for Classifier {
    fn default() -> Self {
        let rules = TextureRole::CHANNELS
            .iter()
            .map(|&role| {
                let mut patterns = Vec::new();
                patterns.extend(
                    table_entry(SUFFIXES, role)
                        .iter()
                        .map(|s| Pattern::Suffix(s.to_string())),
                );
                patterns.extend(
                    table_entry(TOKENS, role)
                        .iter()
                        .map(|s| Pattern::Token(s.to_string())),
                );
                patterns.extend(
                    table_entry(SUBSTRINGS, role)
                        .iter()
                        .map(|s| Pattern::Substring(s.to_string())),
                );
                RoleRules { role, patterns }
            })
            .collect();
        Self { rules }
    }
}

impl Classifier {
    /// Extends the built-in table with user substrings. Extras keep the role
    /// priority order and are tried after that role's built-in patterns.
    pub fn with_extra_keywords(extra: &BTreeMap<TextureRole, Vec<String>>) -> Self {
        let mut classifier = Self::default();
        for rules in &mut classifier.rules {
            if let Some(keywords) = extra.get(&rules.role) {
                for keyword in keywords {
                    let keyword = keyword.trim().to_ascii_lowercase();
                    if keyword.is_empty() {
                        continue;
                    }
                    let pattern = Pattern::Substring(keyword);
                    if !rules.patterns.contains(&pattern) {
                        rules.patterns.push(pattern);
                    }
                }
            }
            rules
                .patterns
                .sort_by_key(|pattern| pattern.specificity());
        }
        classifier
    }

    pub fn classify(&self, filename: &str) -> TextureRole {
        self.classify_detailed(filename).role
    }

    pub fn classify_detailed(&self, filename: &str) -> Classification {
        let stem = classification_stem(filename).to_ascii_lowercase();
        let tokens: Vec<&str> = stem
            .split(['_', '-', '.', ' '])
            .filter(|token| !token.is_empty())
            .collect();

        for rules in &self.rules {
            if let Some(pattern) = rules
                .patterns
                .iter()
                .find(|pattern| pattern.matches(&stem, &tokens))
            {
                return Classification {
                    role: rules.role,
                    matched: Some(pattern.clone()),
                };
            }
        }

        Classification {
            role: TextureRole::Unclassified,
            matched: None,
        }
    }

    /// Classifies enumeration results and records tile ids for the sequence
    /// detector.
    pub fn classify_files(&self, files: &[TextureFile]) -> Vec<RawTextureFile> {
        files
            .iter()
            .map(|file| {
                let shown = file.path.to_string_lossy();
                let classification = self.classify_detailed(&shown);
                let tile = split_tile(&shown).map(|split| split.tile);
                debug!(
                    path = %shown,
                    role = %classification.role,
                    pattern = classification.matched.as_ref().map(Pattern::text).unwrap_or("-"),
                    tile = ?tile,
                    "classified texture"
                );
                RawTextureFile {
                    path: file.path.clone(),
                    role: classification.role,
                    tile,
                    format: file.format.clone(),
                }
            })
            .collect()
    }
}

/// Classifies a single filename with the built-in keyword table.
pub fn classify(filename: &str) -> TextureRole {
    Classifier::default().classify(filename)
}

pub fn classify_path(path: &Path) -> TextureRole {
    classify(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_keywords_map_to_their_role() {
        let cases = [
            ("foo_roughness.png", TextureRole::Roughness),
            ("foo_normal.png", TextureRole::Normal),
            ("foo_metallic.tif", TextureRole::Metallic),
            ("foo_ambient_occlusion.png", TextureRole::AmbientOcclusion),
            ("foo_emissive.exr", TextureRole::Emissive),
            ("foo_opacity.png", TextureRole::Opacity),
            ("foo_height.exr", TextureRole::Height),
            ("foo_basecolor.jpg", TextureRole::BaseColor),
            ("Foo_Albedo.JPG", TextureRole::BaseColor),
            ("wood_diffuse.tga", TextureRole::BaseColor),
        ];
        for (name, role) in cases {
            assert_eq!(classify(name), role, "{name}");
        }
    }

    #[test]
    fn unknown_names_are_unclassified() {
        for name in ["foo.png", "scan_0042.jpg", "", ".png", "readme"] {
            assert_eq!(classify(name), TextureRole::Unclassified, "{name:?}");
        }
    }

    #[test]
    fn suffix_patterns_catch_short_names() {
        assert_eq!(classify("brick_n.png"), TextureRole::Normal);
        assert_eq!(classify("brick-r.png"), TextureRole::Roughness);
        assert_eq!(classify("brick_d.1003.exr"), TextureRole::BaseColor);
        assert_eq!(classify("brick_ao.png"), TextureRole::AmbientOcclusion);
    }

    #[test]
    fn bare_ambient_is_occlusion() {
        assert_eq!(classify("rock_ambient.png"), TextureRole::AmbientOcclusion);
        assert_eq!(classify("rock_Ambient.1001.exr"), TextureRole::AmbientOcclusion);
    }

    #[test]
    fn short_tokens_do_not_fire_inside_words() {
        // "ao" inside "chaos", "h" inside "wood"
        assert_eq!(classify("chaos_basecolor.png"), TextureRole::BaseColor);
        assert_eq!(classify("wood_color.png"), TextureRole::BaseColor);
    }

    #[test]
    fn earlier_role_wins_ties() {
        assert_eq!(classify("rock_normal_ao.png"), TextureRole::Normal);
        assert_eq!(classify("rock_roughness_basecolor.png"), TextureRole::Roughness);
        assert_eq!(classify("metal_rough.png"), TextureRole::Metallic);
    }

    #[test]
    fn directories_do_not_influence_role() {
        assert_eq!(
            classify("/assets/normal_maps/wood_basecolor.png"),
            TextureRole::BaseColor
        );
    }

    #[test]
    fn extra_keywords_extend_roles() {
        let mut extra = BTreeMap::new();
        extra.insert(TextureRole::Opacity, vec!["Cutout".to_string()]);
        let classifier = Classifier::with_extra_keywords(&extra);
        assert_eq!(classifier.classify("leaf_cutout.png"), TextureRole::Opacity);
        assert_eq!(classify("leaf_cutout.png"), TextureRole::Unclassified);
    }

    #[test]
    fn detailed_result_names_the_pattern() {
        let result = Classifier::default().classify_detailed("wall_nrm.png");
        assert_eq!(result.role, TextureRole::Normal);
        assert_eq!(result.matched, Some(Pattern::Suffix("_nrm".into())));
    }

    #[test]
    fn classify_files_records_tiles() {
        let files = vec![
            TextureFile::new("/t/wood_basecolor.1002.jpg"),
            TextureFile::new("/t/wood_normal.png"),
        ];
        let raw = Classifier::default().classify_files(&files);
        assert_eq!(raw[0].role, TextureRole::BaseColor);
        assert_eq!(raw[0].tile, Some(1002));
        assert_eq!(raw[1].role, TextureRole::Normal);
        assert_eq!(raw[1].tile, None);
    }
}
