//! gir-inspect
//!
//! Command-line inspection of typelib files: dump their contents, run the
//! structural verifier, and look entities up through a repository built
//! from the typelib search path.

mod commands;
mod describe;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_VAR: &str = "GIR_LOG";

#[derive(Parser)]
#[command(name = "gir-inspect")]
#[command(about = "Inspect typelib metadata files", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra typelib directory, searched before the configured ones
    #[arg(long = "path", global = true)]
    paths: Vec<PathBuf>,

    /// Log debug events
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and every entry of a typelib file
    Dump {
        /// Typelib file
        file: PathBuf,
    },

    /// Run the structural verifier over typelib files
    Verify {
        /// Typelib files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Load a namespace from the search path and print one of its entities
    Find {
        /// Namespace, e.g. "GObject"
        namespace: String,
        /// Entity name, or registered type name with --type-name
        name: String,
        /// Namespace version; the latest one found when omitted
        #[arg(long)]
        version: Option<String>,
        /// Look the name up as a registered type name
        #[arg(long)]
        type_name: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Dump { file } => commands::dump::execute(&file),
        Commands::Verify { files } => commands::verify::execute(&files),
        Commands::Find {
            namespace,
            name,
            version,
            type_name,
        } => {
            let options = commands::find::FindOptions {
                namespace,
                name,
                version,
                type_name,
            };
            commands::load_config(cli.config.as_deref(), &cli.paths)
                .and_then(|config| commands::find::execute(config, &options))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
