//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod generate;
pub mod model_list;
pub mod pick_model;

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::cli::generate::{run_image, run_text, TextArgs};
use crate::cli::model_list::list_models;
use crate::cli::pick_model::{pick_models, print_selection};
use crate::core::config::{Config, ConfigKey};
use crate::core::selection::SelectionRequest;
use crate::core::storage::{CatalogStorage, FileBlobStore};
use crate::core::store::{OpenRouterStore, StoreSettings};
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "opencreator")]
#[command(version)]
#[command(about = "Browse OpenRouter models and generate text or images")]
#[command(
    long_about = "OpenCreator keeps a local copy of the OpenRouter model catalog, refreshes it \
when it is more than two days old, and sends text or image generation requests \
to any model in it.\n\n\
Authentication:\n\
  Use 'opencreator auth' to store your OpenRouter API key.\n\n\
Environment Variables:\n\
  OPENCREATOR_LOG   tracing filter directive (e.g. 'opencreator=debug')"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Model id to use; falls back to the configured default, then to a picker
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write diagnostics to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store the OpenRouter API key (prompts when omitted)
    Auth {
        key: Option<String>,
    },
    /// Remove the stored OpenRouter API key
    Deauth,
    /// List the model catalog
    Models {
        /// Fetch the catalog even if the cached copy is fresh
        #[arg(long)]
        refresh: bool,
        /// Only show models whose id or name contains this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Generate text from a prompt
    Text {
        /// Prompt text (may be several words)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Read the prompt from a file, or pick one when no path is given
        #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
        prompt_file: Option<String>,
        /// Print the response as it streams in
        #[arg(long)]
        stream: bool,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Generate images from a prompt and save them to disk
    Image {
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
        /// Directory to write images to (defaults to the configured images dir)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
    /// Interactively pick one or more models
    Pick {
        /// Allow selecting several models
        #[arg(long)]
        multi: bool,
        /// Restrict the picker to these model ids
        #[arg(long = "filter", value_name = "ID")]
        filter: Vec<String>,
        /// Give up after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main(args));
    // An abandoned stdin read sits on a blocking thread until a line
    // arrives; do not wait for it on the way out.
    runtime.shutdown_background();
    result
}

/// Build the store from configuration, backed by the on-disk blob store.
pub fn build_store(config: &Config) -> Result<Arc<OpenRouterStore>, Box<dyn Error>> {
    let storage_dir = config.resolved_storage_dir()?;
    let storage = CatalogStorage::new(Box::new(FileBlobStore::new(storage_dir)));
    Ok(Arc::new(OpenRouterStore::new(
        StoreSettings::from_config(config),
        storage,
    )))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;

    match args.command {
        Commands::Auth { key } => {
            let store = build_store(&config)?;
            store.load_from_storage().await;
            let key = match key {
                Some(key) => key,
                None => prompt_api_key()?,
            };
            if key.trim().is_empty() {
                return Err("API key cannot be empty. Use 'opencreator deauth' to remove it.".into());
            }
            store.set_api_key(&key).await?;
            println!("✅ OpenRouter API key saved");
            Ok(())
        }
        Commands::Deauth => {
            let store = build_store(&config)?;
            store.load_from_storage().await;
            store.set_api_key("").await?;
            println!("✅ OpenRouter API key removed");
            Ok(())
        }
        Commands::Models { refresh, filter } => {
            let store = build_store(&config)?;
            list_models(&store, refresh, filter.as_deref()).await
        }
        Commands::Text {
            prompt,
            prompt_file,
            stream,
            temperature,
            max_tokens,
        } => {
            let store = build_store(&config)?;
            store.initialize().await;
            let text_args = TextArgs {
                model: args.model,
                prompt,
                prompt_file,
                stream,
                temperature,
                max_tokens,
            };
            run_text(&store, &config, text_args).await
        }
        Commands::Image { prompt, out_dir } => {
            let store = build_store(&config)?;
            store.initialize().await;
            let out_dir = match out_dir {
                Some(dir) => dir,
                None => config.resolved_images_dir()?,
            };
            run_image(&store, &config, args.model, &prompt.join(" "), out_dir).await
        }
        Commands::Pick {
            multi,
            filter,
            timeout,
        } => {
            let store = build_store(&config)?;
            store.initialize().await;
            let mut request = if multi {
                SelectionRequest::multi()
            } else {
                SelectionRequest::single()
            };
            if !filter.is_empty() {
                request = request.with_initial_filter(filter);
            }
            if let Some(seconds) = timeout {
                request = request.with_timeout(Duration::from_secs(seconds));
            }
            let selection = pick_models(&store, request).await?;
            print_selection(selection.as_ref());
            Ok(())
        }
        Commands::Set { key, value } => {
            let Some(key) = key else {
                config.print_all();
                return Ok(());
            };
            let key = ConfigKey::parse(&key)?;
            if value.is_empty() {
                match config.get_value(key) {
                    Some(current) => println!("{}: {current}", key.name()),
                    None => println!("{}: (unset)", key.name()),
                }
                return Ok(());
            }
            let value = value.join(" ");
            config.set_value(key, &value);
            config.save()?;
            println!("✅ Set {} to: {}", key.name(), value.trim());
            Ok(())
        }
        Commands::Unset { key } => {
            let key = ConfigKey::parse(&key)?;
            config.unset_value(key);
            config.save()?;
            println!("✅ Unset {}", key.name());
            Ok(())
        }
    }
}

fn prompt_api_key() -> Result<String, Box<dyn Error>> {
    print!("Enter your OpenRouter API key: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
