//! OpenCreator keeps a local copy of the OpenRouter model catalog and sends
//! generation requests to the models in it.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the catalog store, its persistence and refresh policy,
//!   text/image generation, and the model selection handshake.
//! - [`api`] defines catalog and chat-completion payloads and the image
//!   shapes found in responses.
//! - [`host`] abstracts what the embedding shell provides: file dialogs and
//!   saving blobs.
//! - [`cli`] is the terminal front end.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod host;
pub mod utils;
