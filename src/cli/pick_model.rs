//! Terminal model picker
//!
//! Answers selection requests raised through the store's [`ModelSelector`]
//! by listing the catalog and reading choices from stdin.
//!
//! [`ModelSelector`]: crate::core::selection::ModelSelector

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::api::Model;
use crate::core::selection::{Selection, SelectionConfig, SelectionError, SelectionRequest};
use crate::core::store::OpenRouterStore;

/// Raise a selection request and answer it from the terminal.
pub async fn pick_models(
    store: &Arc<OpenRouterStore>,
    request: SelectionRequest,
) -> Result<Option<Selection>, Box<dyn Error>> {
    pick_models_from(store, request, BufReader::new(tokio::io::stdin())).await
}

/// Like [`pick_models`], reading choices from `input`. A pending read never
/// outlives the request: the prompt task is cancelled once it settles.
async fn pick_models_from<R>(
    store: &Arc<OpenRouterStore>,
    request: SelectionRequest,
    mut input: R,
) -> Result<Option<Selection>, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut requests = store.selector().subscribe();
    let prompt = tokio::spawn({
        let store = Arc::clone(store);
        async move {
            let config = match requests.wait_for(Option::is_some).await {
                Ok(config) => config.clone(),
                Err(_) => return,
            };
            if let Some(config) = config {
                answer_request(&store, &config, &mut input).await;
            }
        }
    });

    let result = store.select_models(request).await;
    prompt.abort();
    if result == Err(SelectionError::TimedOut) {
        println!();
        println!("⏱️  Model selection timed out");
    }
    Ok(result?)
}

pub fn print_selection(selection: Option<&Selection>) {
    match selection {
        None => println!("No model selected."),
        Some(selection) => {
            for id in selection.ids() {
                println!("✅ {id}");
            }
        }
    }
}

async fn answer_request<R>(store: &OpenRouterStore, config: &SelectionConfig, input: &mut R)
where
    R: AsyncBufRead + Unpin,
{
    let models = store.models().await;
    let candidates = candidates(&models, &config.initial_filter);
    if candidates.is_empty() {
        println!("No models available. Try 'opencreator models --refresh'.");
        store.close_model_selector();
        return;
    }

    println!("🤖 Select a model");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (i, model) in candidates.iter().enumerate() {
        let name = model.display_name();
        if name == model.id {
            println!("  {}. {}", i + 1, model.id);
        } else {
            println!("  {}. {} ({})", i + 1, model.id, name);
        }
    }
    println!();

    let ids: Vec<String> = candidates.iter().map(|model| model.id.clone()).collect();
    let multi = config.multi_select;
    loop {
        let line = match read_choice(input, multi).await {
            Ok(line) => line,
            Err(err) => {
                eprintln!("❌ Could not read selection: {err}");
                store.close_model_selector();
                return;
            }
        };
        match parse_choice(&line, &ids, multi) {
            Ok(selected) if selected.is_empty() => {
                store.close_model_selector();
                return;
            }
            Ok(selected) => {
                store.confirm_model_selection(selected);
                return;
            }
            Err(message) => println!("{message}"),
        }
    }
}

/// Models matching the request's filter. A filter that matches nothing
/// falls back to the whole catalog.
fn candidates<'a>(models: &'a [Model], filter: &[String]) -> Vec<&'a Model> {
    if !filter.is_empty() {
        let filtered: Vec<&Model> = models
            .iter()
            .filter(|model| filter.iter().any(|id| id == &model.id))
            .collect();
        if !filtered.is_empty() {
            return filtered;
        }
    }
    models.iter().collect()
}

/// One line of input. End of input reads as an empty line, which cancels.
async fn read_choice<R>(input: &mut R, multi: bool) -> io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    if multi {
        print!("Enter numbers separated by commas or spaces (empty to cancel): ");
    } else {
        print!("Enter a number (empty to cancel): ");
    }
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line).await?;
    Ok(line)
}

/// Turn 1-based indices into ids. Empty input means cancel.
fn parse_choice(input: &str, ids: &[String], multi: bool) -> Result<Vec<String>, String> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.len() > 1 && !multi {
        return Err("Pick a single model.".to_string());
    }

    let mut selected: Vec<String> = Vec::new();
    for token in tokens {
        let choice: usize = token
            .parse()
            .map_err(|_| format!("Invalid choice '{token}'"))?;
        if choice == 0 || choice > ids.len() {
            return Err(format!("Choice {choice} is out of range (1-{})", ids.len()));
        }
        let id = &ids[choice - 1];
        if !selected.contains(id) {
            selected.push(id.clone());
        }
    }
    Ok(selected)
}
