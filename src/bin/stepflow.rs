use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use stepflow::compiler::loader;
use stepflow::flow::FlowVersion;
use stepflow::migration::{self, Upgrade};
use stepflow::{Expander, Validator};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade stored flow version records to the flat step layout
    Migrate {
        /// Record files (.json, .yaml or .yml)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory for upgraded records; prints JSON to stdout when omitted
        #[arg(long, short)]
        out_dir: Option<PathBuf>,
    },

    /// Check the structural invariants of a flat record
    Validate {
        file: PathBuf,
    },

    /// Print the legacy nested view of a flat record
    LegacyView {
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate { files, out_dir } => {
            let mut failed = 0;
            for file in &files {
                if let Err(e) = migrate_file(file, out_dir.as_deref()) {
                    error!("Failed to migrate {}: {:#}", file.display(), e);
                    failed += 1;
                }
            }
            if failed > 0 {
                bail!("{} of {} records failed to migrate", failed, files.len());
            }
        }

        Commands::Validate { file } => {
            let version = load_flat(&file)?;
            Validator::validate(&version.trigger, &version.steps)?;
            info!(
                "{} is structurally valid ({} steps).",
                file.display(),
                version.steps.len()
            );
        }

        Commands::LegacyView { file } => {
            let version = load_flat(&file)?;
            let trigger = Expander::new().expand(&version.trigger, &version.steps)?;
            println!("{}", serde_json::to_string_pretty(&trigger)?);
        }
    }

    Ok(())
}

fn migrate_file(file: &Path, out_dir: Option<&Path>) -> Result<()> {
    info!("Loading record from: {:?}", file);
    let record = loader::load_record(file)?;

    let upgrade = migration::upgrade_record(record)?;
    match &upgrade {
        Upgrade::Migrated(v) => info!("Migrated {} ({} steps).", v.id, v.steps.len()),
        Upgrade::Current(v) => info!("{} is already at schema {}.", v.id, v.schema_version),
    }

    match out_dir {
        Some(dir) => {
            let name = file
                .file_name()
                .ok_or_else(|| anyhow!("Record path has no file name: {}", file.display()))?;
            let target = dir.join(name);
            loader::write_record(&target, upgrade.flow_version())?;
            info!("Wrote {}", target.display());
        }
        None => println!("{}", serde_json::to_string_pretty(upgrade.flow_version())?),
    }

    Ok(())
}

fn load_flat(file: &Path) -> Result<FlowVersion> {
    let record = loader::load_record(file)?;
    migration::decode_flat(record)
        .with_context(|| format!("{} is not a flat flow version record", file.display()))
}
