//! Turns a folder's worth of models and textures into batch items.
//!
//! Every model file becomes one material named after the model. Its textures
//! are picked by progressively looser name matching:
//!
//! 1. texture file names containing the full model name,
//! 2. names containing any model-name token of three or more characters,
//! 3. names sharing the model's leading `_` prefix,
//! 4. every texture in the folder.
//!
//! The first stage that finds anything wins.
use std::path::{Path, PathBuf};

use matgraph::{RequestedBackend, TextureFile};
use serde::Serialize;

pub const SUPPORTED_MODEL_EXTENSIONS: &[&str] = &[".fbx", ".obj", ".abc", ".bgeo", ".bgeo.sc", ".ply"];

const MIN_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    FullName,
    Token,
    Prefix,
    AllTextures,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub name: String,
    pub model: Option<PathBuf>,
    pub files: Vec<TextureFile>,
    pub requested: RequestedBackend,
    pub strategy: Option<MatchStrategy>,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, files: Vec<TextureFile>) -> Self {
        Self {
            name: name.into(),
            model: None,
            files,
            requested: RequestedBackend::Auto,
            strategy: None,
        }
    }

    pub fn with_backend(mut self, requested: RequestedBackend) -> Self {
        self.requested = requested;
        self
    }
}

pub fn is_model_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    SUPPORTED_MODEL_EXTENSIONS
        .iter()
        .any(|ext| name.len() > ext.len() && name.ends_with(ext))
}

/// Model file name without its (possibly double) extension.
pub fn model_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = name.to_ascii_lowercase();
    SUPPORTED_MODEL_EXTENSIONS
        .iter()
        .filter(|ext| lower.len() > ext.len() && lower.ends_with(*ext))
        .map(|ext| name[..name.len() - ext.len()].to_string())
        .min_by_key(String::len)
        .unwrap_or(name)
}

fn file_name_lower(file: &TextureFile) -> String {
    file.path
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn match_textures(model_name: &str, textures: &[TextureFile]) -> (Vec<TextureFile>, MatchStrategy) {
    let model = model_name.to_ascii_lowercase().replace(' ', "_");
    let names: Vec<String> = textures.iter().map(file_name_lower).collect();
    let pick = |keep: &dyn Fn(&str) -> bool| -> Vec<TextureFile> {
        textures
            .iter()
            .zip(&names)
            .filter(|(_, name)| keep(name))
            .map(|(file, _)| file.clone())
            .collect()
    };

    if !model.is_empty() {
        let found = pick(&|name| name.contains(model.as_str()));
        if !found.is_empty() {
            return (found, MatchStrategy::FullName);
        }
    }

    let tokens: Vec<&str> = model
        .split(['_', '-', '.', ' '])
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .collect();
    if !tokens.is_empty() {
        let found = pick(&|name| tokens.iter().any(|token| name.contains(token)));
        if !found.is_empty() {
            return (found, MatchStrategy::Token);
        }
    }

    if let Some(prefix) = model.split('_').next().filter(|prefix| !prefix.is_empty()) {
        let found = pick(&|name| name.split('_').next() == Some(prefix));
        if !found.is_empty() {
            return (found, MatchStrategy::Prefix);
        }
    }

    (textures.to_vec(), MatchStrategy::AllTextures)
}

/// One item per model, textures matched by name.
pub fn plan_models(
    models: &[PathBuf],
    textures: &[TextureFile],
    requested: RequestedBackend,
) -> Vec<BatchItem> {
    models
        .iter()
        .map(|model| {
            let name = model_stem(model);
            let (files, strategy) = match_textures(&name, textures);
            BatchItem {
                name,
                model: Some(model.clone()),
                files,
                requested,
                strategy: Some(strategy),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textures(names: &[&str]) -> Vec<TextureFile> {
        names.iter().map(|name| TextureFile::new(format!("/t/{name}"))).collect()
    }

    #[test]
    fn recognises_model_extensions() {
        assert!(is_model_file(Path::new("/m/crate.FBX")));
        assert!(is_model_file(Path::new("/m/rock.bgeo.sc")));
        assert!(!is_model_file(Path::new("/m/rock.png")));
        assert!(!is_model_file(Path::new("/m/.obj")));
        assert_eq!(model_stem(Path::new("/m/rock.bgeo.sc")), "rock");
        assert_eq!(model_stem(Path::new("/m/Old Crate.obj")), "Old Crate");
    }

    #[test]
    fn full_name_match_comes_first() {
        let all = textures(&["crate_basecolor.png", "crate_lid_normal.png", "barrel_normal.png"]);
        let (found, strategy) = match_textures("crate", &all);
        assert_eq!(strategy, MatchStrategy::FullName);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn falls_back_to_tokens_then_prefix_then_everything() {
        let all = textures(&["wood_basecolor.png", "metal_roughness.png"]);
        let (found, strategy) = match_textures("old_wood_table", &all);
        assert_eq!(strategy, MatchStrategy::Token);
        assert_eq!(found, textures(&["wood_basecolor.png"]));

        let all = textures(&["ab_basecolor.png", "cd_normal.png"]);
        let (found, strategy) = match_textures("ab_x", &all);
        assert_eq!(strategy, MatchStrategy::Prefix);
        assert_eq!(found.len(), 1);

        let (found, strategy) = match_textures("zz", &all);
        assert_eq!(strategy, MatchStrategy::AllTextures);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn plans_one_item_per_model() {
        let models = vec![PathBuf::from("/m/crate.fbx"), PathBuf::from("/m/barrel.obj")];
        let all = textures(&["crate_normal.png", "barrel_normal.png"]);
        let items = plan_models(&models, &all, RequestedBackend::Auto);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "crate");
        assert_eq!(items[0].files, textures(&["crate_normal.png"]));
        assert_eq!(items[1].model.as_deref(), Some(Path::new("/m/barrel.obj")));
    }
}
