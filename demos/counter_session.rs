//! # Counter Session Example
//!
//! A complete in-memory session, demonstrating:
//! - Implementing the [`Layout`] contract for a click counter
//! - Serving it over plain mpsc channels with [`serve_layout`]
//! - Patches streaming out while click events flow in
//! - Ending the session from a handler via the legacy [`Stop`] request
//!
//! Run with: `cargo run --example counter_session`

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use mirador::serde_json::{json, Value};
use mirador::tokio::sync::{mpsc, Notify};
use mirador::{
    component, serve_layout, Args, BoxFuture, ComponentError, ComponentFn, Layout, LayoutError,
    Node, Signature, Stop,
};

#[derive(Debug, Clone, Copy)]
enum CounterEvent {
    Click,
    Close,
}

/// A layout over a single counter view.  Clicks bump the count and wake the
/// render loop; `Close` asks the session to stop.
struct CounterLayout {
    id: u64,
    view: ComponentFn,
    count: AtomicU32,
    changed: Notify,
}

static NEXT_LAYOUT: AtomicU64 = AtomicU64::new(0);

impl CounterLayout {
    fn new() -> Result<Self, ComponentError> {
        let view = component("Counter", Signature::new().arg("count"), |args| {
            let count = args.arg(0).and_then(Value::as_u64).unwrap_or(0);
            Node::Vdom(json!({
                "tagName": "div",
                "children": [format!("Count: {count}")],
            }))
        })?;
        let layout = CounterLayout {
            id: NEXT_LAYOUT.fetch_add(1, Ordering::Relaxed) + 1,
            view,
            count: AtomicU32::new(0),
            changed: Notify::new(),
        };
        // Pre-arm one render so the session emits the initial tree.
        layout.changed.notify_one();
        Ok(layout)
    }
}

impl Layout for CounterLayout {
    type Patch = Value;
    type Event = CounterEvent;

    // Suspend until something changed, then re-invoke the view with the
    // latest count.  Rapid clicks coalesce into a single render.
    fn render(&self) -> BoxFuture<'_, Result<Value, LayoutError>> {
        Box::pin(async move {
            self.changed.notified().await;
            let count = self.count.load(Ordering::SeqCst);
            match self.view.call(Args::new().arg(count)).render() {
                Node::Vdom(tree) => Ok(tree),
                other => Err(LayoutError::failed(format!(
                    "counter view must render a raw tree, got {other:?}"
                ))),
            }
        })
    }

    fn deliver(&self, event: CounterEvent) -> BoxFuture<'_, Result<(), LayoutError>> {
        Box::pin(async move {
            match event {
                CounterEvent::Click => {
                    self.count.fetch_add(1, Ordering::SeqCst);
                    self.changed.notify_one();
                    Ok(())
                }
                CounterEvent::Close => Err(Stop.into()),
            }
        })
    }

    fn unmount(&self) {
        println!("(counter layout released)");
    }

    fn id(&self) -> u64 {
        self.id
    }
}

#[mirador::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Session lifecycle logs land here; try RUST_LOG=mirador_core=debug.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (patch_tx, mut patch_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let session = mirador::tokio::spawn(serve_layout(CounterLayout::new()?, patch_tx, event_rx));

    let initial = patch_rx.recv().await.expect("initial patch");
    println!("initial tree: {initial}");

    // Click three times, watching the view update after each one.
    for click in 1..=3 {
        event_tx.send(CounterEvent::Click)?;
        let patch = patch_rx.recv().await.expect("patch after click");
        println!("after click {click}: {patch}");
    }

    event_tx.send(CounterEvent::Close)?;
    session.await??;
    println!("session ended cleanly");
    Ok(())
}
