pub mod catalog;
pub mod chat_stream;
pub mod config;
pub mod error;
pub mod generation;
pub mod selection;
pub mod storage;
pub mod store;
