use clap::{Parser, Subcommand};
use county_atlas::atlas::Atlas;
use county_atlas::config::AtlasConfig;
use county_atlas::{data, render, server};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build colored town and county layers
    Build {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the layers and the hover lookup API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

async fn build_atlas(config: &AtlasConfig) -> anyhow::Result<Atlas> {
    let inputs = data::load_inputs(config).await?;
    Ok(Atlas::build(config, inputs))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Build { config } => {
            info!("Building atlas with config: {:?}", config);
            let app_config = AtlasConfig::load_from_file(config)?;
            let atlas = build_atlas(&app_config).await?;
            render::generate_layers(&app_config, &atlas)?;
            info!("Build complete!");
        }
        Commands::Serve { config } => {
            info!("Serving atlas with config: {:?}", config);
            let app_config = AtlasConfig::load_from_file(config)?;
            let atlas = build_atlas(&app_config).await?;
            server::start_server(app_config, atlas).await?;
        }
    }

    Ok(())
}
