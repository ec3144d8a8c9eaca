mod app;
mod config;
mod error;

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use ir_core::AspectRatio;
use crate::app::App;
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "imager", version, about = "Generate and restore images with hosted models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate images from a text prompt
    Generate {
        prompt: String,
        /// square, landscape or portrait
        #[arg(long, default_value = "square", value_parser = parse_aspect_ratio)]
        aspect: AspectRatio,
        /// Images to generate, defaults to the configured images per call
        #[arg(long)]
        count: Option<u32>,
    },
    /// Restore faces in a photo
    Restore { path: PathBuf },
    /// List saved images
    List,
    /// Delete a saved image
    Delete { id: Uuid },
    /// Save an image into the album directory
    Export { id: Uuid },
    /// Show available models
    Models,
}

fn parse_aspect_ratio(value: &str) -> Result<AspectRatio, String> {
    AspectRatio::parse(value).ok_or_else(|| format!("unknown aspect ratio `{value}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let app = App::new(AppConfig::load()?)?;

    match cli.command {
        Command::Generate { prompt, aspect, count } => app.generate(&prompt, aspect, count).await?,
        Command::Restore { path } => app.restore(&path).await?,
        Command::List => app.list(),
        Command::Delete { id } => app.delete(id)?,
        Command::Export { id } => app.export(id).await?,
        Command::Models => app.models(),
    }

    Ok(())
}
