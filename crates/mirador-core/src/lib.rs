//! Core session runtime for the **mirador** server-driven UI framework.
//!
//! `mirador-core` provides the per-session serving loop and the component
//! invocation model.  Application code declares a tree of declarative
//! [`Component`]s; a [`Layout`] renders that tree into patches, which stream
//! to a remote display surface while user-interaction events flow back and
//! are routed to the handlers the current render registered.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`component()`](component()) | Wraps a render function into a reusable [`ComponentFn`] constructor |
//! | [`Component`] | Lazily-invoked, identity-bearing node descriptor |
//! | [`Layout`] | Collaborator holding UI tree state: renders patches, routes events |
//! | [`serve_layout`] | Drives one live session: render production plus event dispatch |
//! | [`PatchSink`] / [`EventSource`] | Channel contracts a session talks through |
//! | [`TestLayout`](testing::TestLayout) | Scriptable layout for testing without a diffing engine |
//!
//! # A session's life
//!
//! 1. **mount** -- [`serve_layout`] acquires the [`Layout`] as a scoped
//!    resource; release is guaranteed on every exit path, including
//!    cancellation.
//! 2. **render** -- one long-running unit of work awaits each patch the
//!    layout produces and forwards it over the send channel.
//! 3. **dispatch** -- one long-running unit of work receives events in
//!    arrival order and spawns a short-lived delivery per event without
//!    waiting on it, so a slow handler never blocks intake of later events.
//! 4. **teardown** -- a fault in any unit of work (or the deprecated
//!    [`Stop`] request) ends the session: every in-flight delivery is
//!    cancelled and the layout is released.
//!
//! # Quick example
//!
//! ```ignore
//! use mirador_core::serve_layout;
//! use tokio::sync::mpsc;
//!
//! // `CounterLayout` implements `Layout` over your diffing engine; the
//! // transport owns the other half of each channel.
//! let (patch_tx, patch_rx) = mpsc::channel(16);
//! let (event_tx, event_rx) = mpsc::channel(16);
//!
//! serve_layout(CounterLayout::default(), patch_tx, event_rx).await?;
//! ```

pub mod channel;
pub mod component;
pub mod config;
pub mod layout;
pub mod serve;
pub mod task;
pub mod testing;

pub use channel::{EventSource, PatchSink, TransportError};
pub use component::{
    component, Args, CallArgs, Component, ComponentError, ComponentFn, Node, Signature,
};
pub use layout::{BoxFuture, Layout, LayoutError, Stop};
pub use serve::{serve_layout, ServeError};
pub use task::{current_task_name, named};
