use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use matgraph::{BackendId, RequestedBackend};

#[derive(Parser, Debug)]
#[command(
    name = "matwire",
    author,
    version,
    about = "Builds material networks from texture folders"
)]
pub struct Cli {
    /// Configuration file; defaults to `config.toml` in the config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one material from every texture in a directory.
    Build(BuildArgs),
    /// Show which backend would be picked for a directory, and why.
    Recommend(RecommendArgs),
    /// Print the backend capability report as JSON.
    Capabilities(EngineArgs),
    /// Build one material per model file in a directory.
    Batch(BatchArgs),
    /// Print the resolved configuration paths.
    Where,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Backends the host can materialize (comma separated); overrides the config.
    #[arg(long, value_name = "IDS", value_delimiter = ',', value_parser = parse_backend_id)]
    pub available: Option<Vec<BackendId>>,

    /// Fail on ambiguous texture groups instead of applying precedence.
    #[arg(long)]
    pub strict: bool,

    /// Minimum tile count for a UDIM sequence.
    #[arg(long, value_name = "COUNT")]
    pub min_tiles: Option<usize>,

    /// Disable graph and listing caches.
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format written to stdout.
    #[arg(long, value_enum, default_value_t = EmitFormat::Json)]
    pub emit: EmitFormat,

    /// Parent network for generated hscript.
    #[arg(long, value_name = "PATH", default_value = "/mat")]
    pub parent: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmitFormat {
    Json,
    Hscript,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Directory holding the texture files.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Material name; defaults to the directory name.
    #[arg(long)]
    pub name: Option<String>,

    /// `auto` or a backend id (`materialx`, `principledshader`, `redshift`).
    #[arg(long, value_name = "BACKEND", value_parser = parse_requested)]
    pub backend: Option<RequestedBackend>,

    /// Descend into subdirectories.
    #[arg(long)]
    pub recursive: bool,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct RecommendArgs {
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    #[arg(long)]
    pub recursive: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory holding model files and their textures.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Separate texture directory; defaults to DIR.
    #[arg(long, value_name = "DIR")]
    pub textures: Option<PathBuf>,

    #[arg(long, value_name = "BACKEND", value_parser = parse_requested)]
    pub backend: Option<RequestedBackend>,

    /// Worker threads; 0 uses one per core.
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    pub threads: usize,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_backend_id(value: &str) -> Result<BackendId, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("backend must not be empty".to_string());
    }
    trimmed.parse()
}

pub fn parse_requested(value: &str) -> Result<RequestedBackend, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("backend must not be empty".to_string());
    }
    trimmed.parse()
}
