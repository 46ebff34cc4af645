use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;

mod config;
mod error;
mod handlers;
mod llm;
mod state;
mod studio;
mod utils;

use config::CONFIG;
use handlers::session::run_session;
use handlers::studio::{describe_failure_message, Studio, RENDER_FAILURE_MESSAGE};
use llm::gemini::{GenAi, GeminiClientFactory};
use state::StudioStore;
use studio::model::{AspectRatio, OutputKind, ReferenceSlot, StudioState};
use studio::styles::STYLE_PRESETS;
use utils::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "studio_director", version, about = "Character and scene prompt studio for Gemini")]
struct Cli {
    /// Gemini API key for this run (overrides GEMINI_API_KEY / API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Seed the session from a YAML or JSON studio state
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Where renders and exported JSON are written
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session (default)
    Shell,
    /// Translate and compose the seeded state, then print the JSON
    Compose {
        #[arg(long, default_value = "video")]
        kind: OutputKind,
    },
    /// Run the full generation cycle and save the image
    Render {
        #[arg(long)]
        aspect: Option<AspectRatio>,
    },
    /// Describe an image and print the resulting character DNA
    Describe {
        #[arg(long)]
        image: PathBuf,
        /// `reference` (general) or `character` (character only)
        #[arg(long, default_value = "reference")]
        slot: ReferenceSlot,
    },
    /// List the visual style presets
    Styles,
}

async fn load_state(path: &Path) -> Result<StudioState> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    // JSON is a subset of YAML, so one parser covers both.
    serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse state file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guards = init_logging(&CONFIG);
    let cli = Cli::parse();

    let initial_state = match &cli.state {
        Some(path) => load_state(path).await?,
        None => StudioState::default(),
    };
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| CONFIG.output_dir.clone());

    let genai = GenAi::new(
        Arc::new(GeminiClientFactory::new(CONFIG.gemini_base_url.clone())),
        CONFIG.default_api_key().map(str::to_string),
        CONFIG.gemini_text_model.clone(),
        CONFIG.gemini_image_model.clone(),
    );
    let studio = Studio::new(StudioStore::new(initial_state), genai, cli.api_key.clone());
    info!(
        "Starting Studio Director (text model {}, image model {})",
        CONFIG.gemini_text_model, CONFIG.gemini_image_model
    );

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            run_session(studio, CONFIG.default_aspect_ratio, output_dir).await?;
        }
        Command::Compose { kind } => {
            let output = studio.generate_json(kind).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Render { aspect } => {
            let aspect = aspect.unwrap_or(CONFIG.default_aspect_ratio);
            studio
                .render(aspect)
                .await
                .context(RENDER_FAILURE_MESSAGE)?;
            if let Some(path) = studio.save_render(&output_dir).await? {
                println!("{}", path.display());
            }
        }
        Command::Describe { image, slot } => {
            studio.attach_reference(slot, &image).await?;
            let dna = studio
                .describe_slot(slot)
                .await
                .context(describe_failure_message(slot))?
                .unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&dna)?);
        }
        Command::Styles => {
            for (index, preset) in STYLE_PRESETS.iter().enumerate() {
                println!("{:>3}. {preset}", index + 1);
            }
        }
    }

    Ok(())
}
