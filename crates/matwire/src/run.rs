//! Runs the subcommands: loads configuration, applies command-line overrides,
//! builds the `MaterialEngine` and prints the results.
//!
//! Types:
//!
//! - `Session` bundles the loaded configuration with the engine built from it.
//!
//! Functions:
//!
//! - `initialise_tracing` configures logging on stderr.
//! - `run_build`, `run_recommend`, `run_capabilities`, `run_batch` and
//!   `run_where` back the subcommands.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use matbatch::{plan_models, BatchDriver};
use matconfig::ImportConfig;
use matgraph::{materialize, tile_statistics, MaterialEngine, RequestedBackend, TextureFile};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{BatchArgs, BuildArgs, EmitFormat, EngineArgs, RecommendArgs};
use crate::hscript::HscriptHost;
use crate::paths::AppPaths;
use crate::report::{BatchJson, MaterialReport, RecommendReport};
use crate::scan::{scan_models, scan_textures};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,matwire=info,matgraph=info,matbatch=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

pub fn resolve_paths(config: Option<&Path>) -> Result<AppPaths> {
    Ok(AppPaths::discover()?.with_override(config))
}

struct Session {
    config: ImportConfig,
    engine: MaterialEngine,
}

impl Session {
    fn open(config_file: Option<&Path>, overrides: &EngineArgs) -> Result<Self> {
        let paths = resolve_paths(config_file)?;
        let mut config = ImportConfig::load_or_default(paths.config_file())
            .with_context(|| format!("failed to load {}", paths.config_file().display()))?;
        tracing::debug!(
            config = %paths.config_file().display(),
            source = paths.source().describe(),
            "resolved matwire configuration"
        );
        apply_overrides(&mut config, overrides)?;

        let capabilities = config.capability_model()?;
        let engine = MaterialEngine::new(capabilities, config.engine_settings());
        Ok(Self { config, engine })
    }

    fn requested(&self, flag: Option<RequestedBackend>) -> RequestedBackend {
        flag.unwrap_or(self.config.backends.requested)
    }
}

fn apply_overrides(config: &mut ImportConfig, overrides: &EngineArgs) -> Result<()> {
    if let Some(available) = &overrides.available {
        let priority = config.backends.priority.clone();
        for id in priority {
            config.backends.available.insert(id, available.contains(&id));
        }
    }
    if overrides.strict {
        config.engine.strict = true;
    }
    if let Some(min_tiles) = overrides.min_tiles {
        config.engine.min_tiles = min_tiles;
    }
    if overrides.no_cache {
        config.cache.enabled = false;
    }
    config.validate()?;
    Ok(())
}

pub fn run_build(config_file: Option<&Path>, args: BuildArgs) -> Result<()> {
    let session = Session::open(config_file, &args.engine)?;
    let files = scan_textures(&args.dir, args.recursive)?;
    let name = args.name.unwrap_or_else(|| dir_name(&args.dir));
    let requested = session.requested(args.backend);

    match args.output.emit {
        EmitFormat::Json => {
            let created = session.engine.create_material(&name, &files, requested)?;
            print_json(&MaterialReport::new(&name, &created))
        }
        EmitFormat::Hscript => {
            let mut host = HscriptHost::new(args.output.parent);
            host.comment(&format!("material {name} from {}", args.dir.display()));
            let (created, main) = session
                .engine
                .create_and_materialize(&name, &files, requested, &mut host)?;
            tracing::info!(node = %main, backend = %created.selection.backend, "emitted hscript");
            print_text(&host.finish())
        }
    }
}

pub fn run_recommend(config_file: Option<&Path>, args: RecommendArgs) -> Result<()> {
    let session = Session::open(config_file, &args.engine)?;
    let files = scan_textures(&args.dir, args.recursive)?;
    let selection = session.engine.get_recommended_backend(&files)?;
    let textures = session.engine.texture_set(&files)?;
    let paths = texture_paths(&files);
    let tiles = tile_statistics(&paths, session.config.engine.min_tiles);
    print_json(&RecommendReport::new(
        selection.backend,
        selection.reason,
        &textures,
        tiles,
    ))
}

pub fn run_capabilities(config_file: Option<&Path>, args: EngineArgs) -> Result<()> {
    let session = Session::open(config_file, &args)?;
    print_json(&session.engine.capabilities_info())
}

pub fn run_batch(config_file: Option<&Path>, args: BatchArgs) -> Result<()> {
    let session = Session::open(config_file, &args.engine)?;
    let models = scan_models(&args.dir)?;
    let texture_dir = args.textures.clone().unwrap_or_else(|| args.dir.clone());
    let textures = scan_textures(&texture_dir, false)?;
    if models.is_empty() {
        tracing::warn!(dir = %args.dir.display(), "no model files found");
    }

    let items = plan_models(&models, &textures, session.requested(args.backend));
    let report = BatchDriver::new(&session.engine)
        .with_threads(Some(args.threads))
        .run(items)?;

    match args.output.emit {
        EmitFormat::Json => print_json(&BatchJson::new(&report))?,
        EmitFormat::Hscript => {
            let mut host = HscriptHost::new(args.output.parent.clone());
            for outcome in &report.outcomes {
                if let Ok(created) = &outcome.result {
                    host.comment(&format!("material {}", outcome.item.name));
                    materialize(&created.spec, &mut host)?;
                }
            }
            print_text(&host.finish())?;
        }
    }

    let summary = report.summary();
    if summary.failed > 0 {
        bail!("{} of {} materials failed", summary.failed, summary.total);
    }
    Ok(())
}

pub fn run_where(config_file: Option<&Path>) -> Result<()> {
    let paths = resolve_paths(config_file)?;
    let exists = paths.config_file().is_file();
    println!("Configuration:");
    println!("  dir:     {}", paths.config_dir().display());
    println!(
        "  file:    {}{}",
        paths.config_file().display(),
        if exists { "" } else { " (missing, using defaults)" }
    );
    println!("  source:  {}", paths.source().describe());
    Ok(())
}

fn dir_name(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| PathBuf::from(dir))
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "material".to_string())
}

fn texture_paths(files: &[TextureFile]) -> Vec<String> {
    files
        .iter()
        .map(|file| file.path.to_string_lossy().into_owned())
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialise report")?;
    print_text(&text)?;
    print_text("\n")
}

fn print_text(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .context("failed to write to stdout")?;
    stdout.flush().context("failed to flush stdout")
}
