//! `stirrin`: add mixin interfaces and stub methods to the classes of one
//! archive.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use stirrin_core::config::{default_output_path, StirrinConfig};
use stirrin_core::errors::StirrinResult;
use stirrin_core::pipeline;

#[derive(Parser, Debug)]
#[command(name = "stirrin", version, about)]
struct Args {
    /// JSON configuration file; command-line values extend or override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Archive to transform
    #[arg(long)]
    input: PathBuf,

    /// Destination archive (default: `<input stem>-mixinInterfaces.jar` next to the input)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Source root used for name resolution and interface lookup
    #[arg(long = "source-root")]
    source_roots: Vec<PathBuf>,

    /// Mixin configuration file listing mixin classes
    #[arg(long = "mixin-config")]
    mixin_configs: Vec<PathBuf>,

    /// Mixin source file
    #[arg(long = "mixin-source")]
    mixin_sources: Vec<PathBuf>,

    /// Directory or archive probed for default-package classes
    #[arg(long = "class-path")]
    class_path: Vec<PathBuf>,

    /// Only transform archives whose file name matches this pattern
    #[arg(long)]
    accepted: Option<String>,

    /// Treat every source file mentioning @Mixin as a mixin source
    #[arg(long, default_value_t = false)]
    scan: bool,

    /// Worker threads for source parsing
    #[arg(long)]
    workers: Option<usize>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn build_config(args: &Args) -> StirrinResult<StirrinConfig> {
    let mut config = match &args.config {
        Some(path) => StirrinConfig::load(path)?,
        None => StirrinConfig::default(),
    };
    config.apply_env();

    config.source_roots.extend(args.source_roots.iter().cloned());
    config.mixin_configs.extend(args.mixin_configs.iter().cloned());
    config.mixin_sources.extend(args.mixin_sources.iter().cloned());
    config.class_path.extend(args.class_path.iter().cloned());
    if let Some(pattern) = &args.accepted {
        config.accepted_archives = Some(pattern.clone());
    }
    if args.scan {
        config.scan_source_roots = true;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

fn execute(args: &Args) -> StirrinResult<()> {
    let config = build_config(args)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    let report = pipeline::run(&config, &args.input, &output)?;
    info!(
        output = %output.display(),
        accepted = report.accepted,
        targets = report.transform.classes_augmented,
        interfaces = report.transform.interfaces_added,
        stubs = report.transform.stubs_added,
        diagnostics = report.diagnostics.len(),
        elapsed_ms = report.elapsed_ms as u64,
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);
    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}
