use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use layerex::cli::{run_export, run_list, PipelineOptions};
use layerex::logging::init_logging;
use layerex::tui::run_tui;

#[derive(Parser)]
#[command(name = "layerex")]
#[command(about = "Layer export tool with interactive preview")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Layer document: JSON manifest or directory (launches TUI if no subcommand)
    #[arg(global = true)]
    source: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export layers to individual image files
    Export {
        /// Layer document: JSON manifest or directory
        source: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Flatten groups (no output subdirectories)
        #[arg(long)]
        flat: bool,
        /// Withhold tagged layers from the export
        #[arg(long)]
        skip_tagged: bool,
        /// Skip invisible layers
        #[arg(long)]
        only_visible: bool,
        /// Output image format (png, jpeg, bmp, tiff)
        #[arg(long, default_value = "png")]
        format: String,
    },
    /// List resolved export names without writing files
    List {
        /// Layer document: JSON manifest or directory
        source: PathBuf,
        /// Flatten groups (no output subdirectories)
        #[arg(long)]
        flat: bool,
        /// Withhold tagged layers from the export
        #[arg(long)]
        skip_tagged: bool,
        /// Skip invisible layers
        #[arg(long)]
        only_visible: bool,
        /// Output image format (determines the listed extension)
        #[arg(long, default_value = "png")]
        format: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging - guard must be held for logs to flush
    let _guard = init_logging().ok();

    let cli = Cli::parse();

    run_command(cli)
}

fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Export {
            source,
            output,
            flat,
            skip_tagged,
            only_visible,
            format,
        }) => {
            let options = PipelineOptions {
                flat,
                skip_tagged,
                only_visible,
                format: Some(format.parse()?),
            };
            let stats = run_export(&source, &output, &options)?;
            println!(
                "Exported: {} layers to {} ({} failed)",
                stats.exported,
                output.display(),
                stats.failed
            );
        }
        Some(Commands::List {
            source,
            flat,
            skip_tagged,
            only_visible,
            format,
        }) => {
            let options = PipelineOptions {
                flat,
                skip_tagged,
                only_visible,
                format: Some(format.parse()?),
            };
            let paths = run_list(&source, &options)?;
            for path in &paths {
                println!("{}", path.display());
            }
            println!("{} layers", paths.len());
        }
        None => {
            let Some(source) = cli.source else {
                anyhow::bail!("No layer document given; see --help");
            };
            run_tui(&source)?;
        }
    }

    Ok(())
}
