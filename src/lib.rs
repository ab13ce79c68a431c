//! AI insight widgets for trade-promotion planning.
//!
//! A generic polling controller (`poller`) drives each widget's fetch
//! lifecycle against the insight API (`api`). Per-widget normalizers
//! (`widgets`) turn raw endpoint payloads into display models, and the
//! terminal host (`dashboard`) renders them.

pub mod api;
pub mod dashboard;
pub mod error;
pub mod poller;
pub mod render;
pub mod state;
pub mod types;
pub mod watcher;
pub mod widgets;
