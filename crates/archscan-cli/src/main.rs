mod logging;

use std::fs;
use std::path::{Path, PathBuf};

use archscan_core::{load_repository, AnalysisInput, DiscoveryConfig, Pipeline};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;

#[derive(Parser)]
#[command(name = "archscan")]
#[command(
    about = "Reconstruct an architecture graph from source trees and migrations",
    long_about = None
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more repository directories as a single project
    Analyze {
        /// Repository root directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Project ID (defaults to the first directory's name)
        #[arg(short, long)]
        project: Option<String>,

        /// Write the graph JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the summary instead of the full graph
        #[arg(short, long)]
        summary: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Print built-in defaults, ignoring files and environment
        #[arg(long)]
        defaults: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            dirs,
            project,
            output,
            summary,
        } => {
            let config = load_config(cli.config.as_deref())?;
            analyze(config, &dirs, project, output, summary)
        }
        Commands::Config { defaults } => {
            if defaults {
                print!("{}", DiscoveryConfig::default_config_string());
            } else {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", toml_string(&config)?);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DiscoveryConfig> {
    match path {
        Some(path) => DiscoveryConfig::from_file(path)
            .wrap_err_with(|| format!("Failed to load config from {}", path.display())),
        None => DiscoveryConfig::load().wrap_err("Failed to load configuration"),
    }
}

fn toml_string(config: &DiscoveryConfig) -> Result<String> {
    config.to_toml().wrap_err("Failed to render configuration")
}

fn analyze(
    config: DiscoveryConfig,
    dirs: &[PathBuf],
    project: Option<String>,
    output: Option<PathBuf>,
    summary_only: bool,
) -> Result<()> {
    let project_id = match project {
        Some(id) => id,
        None => project_name(&dirs[0])?,
    };

    let mut input = AnalysisInput::new(project_id);
    for dir in dirs {
        let loaded = load_repository(dir, &config.corpus)
            .wrap_err_with(|| format!("Failed to load {}", dir.display()))?;
        if input.repositories.iter().any(|r| r.id == loaded.repository.id) {
            bail!(
                "Two repositories share the directory name '{}'",
                loaded.repository.id
            );
        }
        tracing::info!(
            "Loaded {} ({} files)",
            dir.display(),
            loaded.repository.files.len()
        );
        input.add_loaded(loaded);
    }

    let result = Pipeline::try_new(config)?.run(&input);

    if summary_only {
        println!("{}", result.summary);
        return Ok(());
    }

    let json = result.to_json()?;
    match output {
        Some(path) => {
            fs::write(&path, json).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Graph written to {}", path.display());
            eprintln!("{}", result.summary);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn project_name(dir: &Path) -> Result<String> {
    let canonical = dir
        .canonicalize()
        .wrap_err_with(|| format!("Cannot resolve {}", dir.display()))?;
    Ok(canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string())
}
