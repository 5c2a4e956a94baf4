//! Text and image generation commands

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::api::images::preview_url;
use crate::cli::pick_model::pick_models;
use crate::core::config::Config;
use crate::core::generation::{GenerationOptions, ProgressCallback};
use crate::core::selection::{Selection, SelectionRequest};
use crate::core::store::OpenRouterStore;
use crate::host::{persist_generated_images, FileDialogOptions, HostShell, LocalHost};

pub struct TextArgs {
    pub model: Option<String>,
    pub prompt: Vec<String>,
    /// `Some("")` asks the host to pick a file.
    pub prompt_file: Option<String>,
    pub stream: bool,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

pub async fn run_text(
    store: &Arc<OpenRouterStore>,
    config: &Config,
    args: TextArgs,
) -> Result<(), Box<dyn Error>> {
    let host = LocalHost::new(config.resolved_images_dir()?);
    let prompt = read_prompt(&host, &args.prompt, args.prompt_file.as_deref()).await?;
    let model = resolve_model(store, config, args.model).await?;

    let mut options = if args.stream {
        GenerationOptions::streaming()
    } else {
        GenerationOptions::new()
    };
    if let Some(temperature) = args.temperature {
        options = options.temperature(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        options = options.max_tokens(max_tokens);
    }

    if options.stream {
        let mut print_delta = |delta: &str, _text: &str| {
            print!("{delta}");
            let _ = io::stdout().flush();
        };
        let on_update: ProgressCallback<'_> = &mut print_delta;
        store
            .generate_text(&model, &prompt, &options, Some(on_update))
            .await?;
        println!();
    } else {
        let text = store.generate_text(&model, &prompt, &options, None).await?;
        println!("{text}");
    }
    Ok(())
}

pub async fn run_image(
    store: &Arc<OpenRouterStore>,
    config: &Config,
    model: Option<String>,
    prompt: &str,
    out_dir: PathBuf,
) -> Result<(), Box<dyn Error>> {
    if prompt.trim().is_empty() {
        return Err("Prompt cannot be empty".into());
    }
    let model = resolve_model(store, config, model).await?;

    let generated = store
        .generate_image(&model, prompt, &GenerationOptions::new())
        .await?;
    if generated.images.is_empty() {
        println!("⚠️  {model} returned no images");
    }

    let host = LocalHost::new(out_dir);
    let stem = format!("image-{}", Utc::now().format("%Y%m%d-%H%M%S"));
    let saved = persist_generated_images(&host, &generated.images, &stem).await?;
    for path in &saved {
        println!("🖼️  Saved {}", path.display());
    }
    for url in generated
        .images
        .iter()
        .filter(|url| !url.starts_with("data:"))
    {
        println!("🔗 {}", preview_url(url));
    }
    if !generated.text.is_empty() {
        println!();
        println!("{}", generated.text);
    }
    Ok(())
}

/// Explicit model, then the configured default, then the picker.
async fn resolve_model(
    store: &Arc<OpenRouterStore>,
    config: &Config,
    explicit: Option<String>,
) -> Result<String, Box<dyn Error>> {
    if let Some(model) = explicit.or_else(|| config.default_model.clone()) {
        if store.has_models().await && store.get_model_by_id(&model).await.is_none() {
            eprintln!("⚠️  '{model}' is not in the cached catalog; sending anyway");
        }
        return Ok(model);
    }

    match pick_models(store, SelectionRequest::single()).await? {
        Some(Selection::Single(id)) => Ok(id),
        Some(Selection::Multi(ids)) => ids
            .into_iter()
            .next()
            .ok_or_else(|| "No model selected".into()),
        None => Err("No model selected".into()),
    }
}

async fn read_prompt(
    host: &dyn HostShell,
    words: &[String],
    prompt_file: Option<&str>,
) -> Result<String, Box<dyn Error>> {
    let path = match prompt_file {
        None => None,
        Some("") => {
            let picked = host
                .open_file_dialog(FileDialogOptions {
                    title: Some("Select a prompt file".to_string()),
                    multiple: false,
                })
                .await?;
            match picked.into_iter().next() {
                Some(path) => Some(path),
                None => return Err("No prompt file selected".into()),
            }
        }
        Some(path) => Some(PathBuf::from(path)),
    };

    let prompt = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?,
        None => words.join(" "),
    };
    if prompt.trim().is_empty() {
        return Err("Prompt cannot be empty".into());
    }
    Ok(prompt)
}
