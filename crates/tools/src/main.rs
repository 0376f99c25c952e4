use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "Viewpoint configuration and hotspot data maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a viewpoint configuration and summarize it
    Validate { config: PathBuf },
    /// Print (or write) every viewpoint's hotspots as one JSON snapshot
    Export {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the hotspot data file with a snapshot
    Import {
        #[arg(long)]
        data: PathBuf,
        snapshot: PathBuf,
    },
    /// Restore the default hotspots declared in a viewpoint configuration
    Reset {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Validate { config } => {
            let report = tools::validate_config(&config)?;
            print!("{report}");
        }
        Commands::Export { data, out } => {
            let json = tools::export(&data)?;
            match out {
                Some(out) => {
                    fs::write(&out, json).map_err(|e| format!("write {out:?}: {e}"))?;
                    eprintln!("wrote {}", out.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Import { data, snapshot } => {
            let n = tools::import(&data, &snapshot)?;
            eprintln!("imported {n} hotspots into {}", data.display());
        }
        Commands::Reset { data, config } => {
            let n = tools::reset(&data, &config)?;
            eprintln!("reset {} to {n} default hotspots", data.display());
        }
    }
    Ok(())
}
