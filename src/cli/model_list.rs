//! Model listing functionality
//!
//! Prints the cached OpenRouter catalog, fetching it first when it is stale.

use std::error::Error;

use chrono::{DateTime, Utc};

use crate::api::models::filter_models;
use crate::api::Model;
use crate::core::store::OpenRouterStore;

pub async fn list_models(
    store: &OpenRouterStore,
    refresh: bool,
    filter: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    if refresh {
        store.load_from_storage().await;
        store.refresh_models().await;
    } else {
        store.initialize().await;
    }

    println!("🤖 Available Models on OpenRouter");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if let Some(error) = store.last_error().await {
        println!("⚠️  Could not refresh the catalog: {error}");
        println!();
    }

    match store.last_fetched().await {
        Some(fetched) => println!(
            "📦 Catalog fetched {}",
            fetched.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("📦 Catalog has never been fetched"),
    }
    println!();

    let models = store.models().await;
    let shown = filter_models(&models, filter.unwrap_or_default());
    if shown.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    println!("Found {} models:", shown.len());
    println!();
    for model in shown {
        print_model(model);
    }

    Ok(())
}

fn print_model(model: &Model) {
    println!("  • {}", model.id);
    let name = model.display_name();
    if name != model.id {
        println!("    Name: {name}");
    }
    if let Some(context) = model.metadata.get("context_length").and_then(|v| v.as_u64()) {
        println!("    Context: {context} tokens");
    }
    if let Some(created) = created_at(model) {
        println!("    Created: {}", created.format("%Y-%m-%d"));
    }
    println!();
}

/// OpenRouter reports `created` as Unix seconds.
fn created_at(model: &Model) -> Option<DateTime<Utc>> {
    let created = model.metadata.get("created")?.as_i64()?;
    if created <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(created, 0)
}
