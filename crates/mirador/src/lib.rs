//! **mirador** -- a server-driven UI session runtime.
//!
//! This is the umbrella crate that re-exports everything you need to serve
//! live UI sessions from a single dependency:
//!
//! ```toml
//! [dependencies]
//! mirador = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`mirador_core`] are available at the crate root
//!   ([`component()`], [`Component`], [`Layout`], [`serve_layout`],
//!   [`PatchSink`], [`EventSource`], etc.).
//! * The [`sample`] module holds a small ready-made application for docs and
//!   smoke tests.
//! * [`tokio`] and [`serde_json`] are re-exported so downstream crates do
//!   not need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use mirador::{serve_layout, Layout};
//! use mirador::tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // `CounterLayout` implements `Layout` over your diffing engine.
//!     let (patch_tx, patch_rx) = mpsc::channel(16);
//!     let (event_tx, event_rx) = mpsc::channel(16);
//!
//!     // Hand `patch_rx` and `event_tx` to the transport, then serve until
//!     // the session ends.
//!     serve_layout(CounterLayout::default(), patch_tx, event_rx)
//!         .await
//!         .unwrap();
//! }
//! ```

pub use mirador_core::*;

pub mod sample;

// Re-export dependencies for use in examples and downstream crates
pub use serde_json;
pub use tokio;
