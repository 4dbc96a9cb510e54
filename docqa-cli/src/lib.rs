//! # docqa-cli
//!
//! The `docqa` command: load a document, index it, answer questions about it.
//!
//! ```text
//! docqa paper.json --ranker tfidf --merger concatenation --top-k 3
//! ```

pub mod app;
pub mod args;
pub mod logging;

pub use app::{Session, build_pipeline, load_document, resolve_config, run};
pub use args::{Cli, EmbedderKind};
