mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "A small static blog generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site from a directory of markdown posts.
    Build {
        #[arg(long, short, default_value = "posts")]
        source: PathBuf,

        #[arg(long, short, default_value = "public")]
        output: PathBuf,

        /// Theme directory with `templates/` and `static/`; the built-in
        /// theme is used when omitted.
        #[arg(long)]
        theme: Option<PathBuf>,

        /// Config file; defaults to `scribe.toml` in the source directory.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also write draft posts at their own permalink.
        #[arg(long)]
        drafts: bool,

        #[arg(long)]
        base_url: Option<String>,
    },
    /// Lay out a new site: posts directory, config, intro and theme.
    Init {
        #[arg(default_value = ".")]
        directory: PathBuf,
    },
    /// Create a new post skeleton.
    New {
        /// Post id: letters, digits and hyphens.
        id: String,

        #[arg(long, short, default_value = "posts")]
        source: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            source,
            output,
            theme,
            config,
            drafts,
            base_url,
        } => commands::build_site(commands::BuildOptions {
            source: &source,
            output: &output,
            theme: theme.as_deref(),
            config: config.as_deref(),
            drafts,
            base_url: base_url.as_deref(),
        }),
        Commands::Init { directory } => commands::init_site(&directory),
        Commands::New { id, source } => commands::new_post(&id, &source),
    };

    if let Err(error) = result {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
