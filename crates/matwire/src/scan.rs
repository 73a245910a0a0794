//! Directory enumeration: the collaborator that hands the engine its file
//! list. Results are sorted so runs are reproducible.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use matbatch::is_model_file;
use matgraph::{is_supported_texture, TextureFile};

pub fn scan_textures(dir: &Path, recursive: bool) -> Result<Vec<TextureFile>> {
    let mut files = Vec::new();
    collect(dir, recursive, &mut |path| {
        if is_supported_texture(path) {
            files.push(TextureFile::new(path));
        }
    })?;
    files.sort();
    tracing::debug!(dir = %dir.display(), count = files.len(), "scanned textures");
    Ok(files)
}

pub fn scan_models(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut models = Vec::new();
    collect(dir, false, &mut |path| {
        if is_model_file(path) {
            models.push(path.to_path_buf());
        }
    })?;
    models.sort();
    tracing::debug!(dir = %dir.display(), count = models.len(), "scanned models");
    Ok(models)
}

fn collect(dir: &Path, recursive: bool, visit: &mut dyn FnMut(&Path)) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to inspect {}", path.display()))?;
        if file_type.is_dir() {
            if recursive {
                collect(&path, true, visit)?;
            }
        } else {
            visit(&path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn filters_by_extension_and_sorts() {
        let root = TempDir::new().unwrap();
        for name in ["b_normal.png", "a_albedo.JPG", "notes.txt", "crate.fbx"] {
            fs::write(root.path().join(name), b"").unwrap();
        }
        fs::create_dir(root.path().join("nested")).unwrap();
        fs::write(root.path().join("nested/c_rough.exr"), b"").unwrap();

        let flat = scan_textures(root.path(), false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|file| file.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_albedo.JPG", "b_normal.png"]);

        let deep = scan_textures(root.path(), true).unwrap();
        assert_eq!(deep.len(), 3);

        let models = scan_models(root.path()).unwrap();
        assert_eq!(models, vec![root.path().join("crate.fbx")]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let root = TempDir::new().unwrap();
        assert!(scan_textures(&root.path().join("absent"), false).is_err());
    }
}
