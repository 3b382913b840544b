//! Loko CLI entry point

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "loko")]
#[command(about = "C4 architecture documentation from plain text", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new loko project
    Init {
        /// Project name
        name: String,
    },
    /// Scaffold a system, container or component
    New {
        /// Entity kind
        #[arg(value_enum)]
        kind: EntityKind,
        /// Display name; the ID derives from it
        name: String,
        /// Parent path: system ID for containers, system/container for components
        #[arg(short, long)]
        parent: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        technology: Option<String>,
        /// Content template override (compute, datastore, messaging, ...)
        #[arg(long)]
        template: Option<String>,
        /// Print the rendered files instead of writing them
        #[arg(long)]
        preview: bool,
    },
    /// Build the documentation site
    Build {
        /// Remove the output directory first
        #[arg(long)]
        clean: bool,
        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated formats: html,markdown,pdf,toon
        #[arg(short, long)]
        format: Option<String>,
        /// D2 theme override
        #[arg(long)]
        d2_theme: Option<String>,
        /// D2 layout engine override
        #[arg(long)]
        d2_layout: Option<String>,
    },
    /// Watch the source tree and rebuild on change
    Watch {
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Debounce in milliseconds
        #[arg(long, default_value_t = 500)]
        debounce: u64,
    },
    /// Serve the built site
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        address: String,
        /// Port (defaults to the configured serve_port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate the architecture
    Validate {
        /// Promote warnings to errors
        #[arg(long)]
        strict: bool,
        /// Exit 1 when validation fails
        #[arg(long)]
        exit_code: bool,
        /// Also detect diagram/frontmatter drift
        #[arg(long)]
        check_drift: bool,
    },
    /// Run the LLM tool protocol on stdio
    Mcp,
    /// Run the HTTP API server
    Api {
        /// Port (defaults to the configured api_port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Require this bearer token on API routes
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Build a single output format
    Export {
        #[arg(value_enum)]
        format: ExportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Show version
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EntityKind {
    System,
    Container,
    Component,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Html,
    Markdown,
    Pdf,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = commands::expand_aliases(std::env::args().collect());
    let cli = Cli::parse_from(args);

    let verbose = cli.verbose
        || std::env::var("LOKO_VERBOSE").map(|v| v == "1" || v == "true").unwrap_or(false);
    let log_level = if verbose { "debug" } else { "info" };
    // The MCP protocol owns stdout; logs always go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("loko={log_level}")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();

    let root = cli.root.clone();
    let result: anyhow::Result<i32> = match cli.command {
        Commands::Init { name } => commands::init::run(&root, &name).await,
        Commands::New { kind, name, parent, description, technology, template, preview } => {
            commands::new::run(
                &root,
                commands::new::NewArgs { kind, name, parent, description, technology, template, preview },
            )
            .await
        }
        Commands::Build { clean, output, format, d2_theme, d2_layout } => {
            commands::build::run(
                &root,
                commands::build::BuildArgs { clean, output, format, d2_theme, d2_layout },
            )
            .await
        }
        Commands::Watch { output, debounce } => commands::watch::run(&root, output, debounce).await,
        Commands::Serve { address, port } => commands::serve::run(&root, &address, port).await,
        Commands::Validate { strict, exit_code, check_drift } => {
            commands::validate::run(&root, strict, exit_code, check_drift).await
        }
        Commands::Mcp => commands::mcp::run(&root).await,
        Commands::Api { port, api_key } => commands::api::run(&root, port, api_key).await,
        Commands::Export { format, output } => commands::export::run(&root, format, output).await,
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "loko", &mut std::io::stdout());
            Ok(0)
        }
        Commands::Version => {
            println!("loko v{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(commands::exit_code_for(&err));
        }
    }
}
