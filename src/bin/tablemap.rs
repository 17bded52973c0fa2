use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tablemap::{resolve_mime_type, server, AnalyzerConfig, FloorPlanAnalyzer, PromptProfile, ServerConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tablemap")]
#[command(about = "Extract restaurant floor-plan objects from images with a vision model")]
#[command(version)]
struct Cli {
    /// Prompt profile JSON (system text, schema, exemplars)
    #[arg(long, global = true, env = "TABLEMAP_PROFILE")]
    profile: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the upload server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Analyze one local image and print the answer
    Analyze {
        /// Image file to analyze
        image: PathBuf,

        /// MIME type (detected from the file contents if omitted)
        #[arg(long)]
        mime: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json);

    if let Err(e) = dotenv {
        warn!(error = %e, "No .env file loaded");
    }

    let config = AnalyzerConfig::from_env().context("API key is required")?;
    let mut analyzer = FloorPlanAnalyzer::new(config);
    if let Some(path) = &cli.profile {
        let profile = PromptProfile::from_path(path)?;
        info!(
            path = %path.display(),
            exemplars = profile.exemplars.len(),
            "Loaded prompt profile"
        );
        analyzer = analyzer.with_profile(profile);
    }

    match cli.command {
        Commands::Serve { port } => {
            let server_config = ServerConfig::from_env()?;
            let server_config = ServerConfig {
                port: port.unwrap_or(server_config.port),
                ..server_config
            };
            server::serve(analyzer, server_config).await?;
        }
        Commands::Analyze { image, mime } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let mime = resolve_mime_type(mime.as_deref(), &bytes);
            let answer = analyzer.analyze_image(&bytes, &mime).await?;
            println!("{}", answer);
        }
    }

    Ok(())
}

fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Logs go to stderr so `analyze` output stays pipeable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}
