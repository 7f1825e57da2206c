use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tts_studio::models::{ConfigPatch, ModelType};
use tts_studio::utils::logger;
use tts_studio::{ClientConfig, Studio};

/// Synthesize one clip through the TTS gateway
///
/// Gateway address and storage location come from `TTS_GATEWAY_URL`,
/// `TTS_STUDIO_DATA_DIR` and friends.
#[derive(Parser, Debug)]
#[command(name = "tts-studio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model to use (auto, qwen3-tts, indextts-2.0); stored config if omitted
    #[arg(short, long, value_parser = parse_model)]
    model: Option<ModelType>,

    /// Voice id; stored config if omitted
    #[arg(short, long)]
    voice: Option<String>,

    /// Output file (defaults to `<result id>.<format>`)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Text to synthesize
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,
}

fn parse_model(value: &str) -> std::result::Result<ModelType, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown model '{}'", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let studio = Studio::open(config).context("Failed to open studio")?;

    if cli.model.is_some() || cli.voice.is_some() {
        studio.config_store().set_config(ConfigPatch {
            model: cli.model,
            voice: cli.voice,
            ..Default::default()
        })?;
    }

    let text = cli.text.join(" ");
    let generated = studio
        .generator()
        .generate(Some(&text))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let format = studio.config_store().config().response_format;
    let out = cli
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}.{}", generated.id, format.extension())));
    let audio = studio
        .history()
        .audio_bytes(&generated.id)
        .context("Generated audio is no longer available")?;
    tokio::fs::write(&out, &audio)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    match generated.duration {
        Some(duration) => println!("{} ({:.1}s)", out.display(), duration),
        None => println!("{}", out.display()),
    }

    studio.close();
    Ok(())
}
