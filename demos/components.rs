//! # Components Example
//!
//! Component descriptors on their own, without a session:
//! - Wrapping a render function with [`component`] and calling it with [`Args`]
//! - Lazy rendering: every render re-invokes the function
//! - Diagnostic output, including the degraded `Name(...)` form
//! - The ready-made [`sample_app`](mirador::sample::sample_app)
//!
//! Run with: `cargo run --example components`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mirador::sample::sample_app;
use mirador::serde_json::{json, Value};
use mirador::{component, Args, Node, Signature};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Construction and call sites log at trace level.
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
        .init();

    // A render function with a full signature: one required parameter, a
    // variadic tail, and gathered keyword attributes, all read back through
    // the argument snapshots it receives.
    let greeting = component(
        "Greeting",
        Signature::new().arg("name").variadic("parts").kw_variadic("attrs"),
        |args| {
            let name = args.arg(0).and_then(Value::as_str).unwrap_or("world");
            let mut text = format!("Hello, {name}!");
            for part in args.positional().iter().skip(1) {
                if let Some(word) = part.as_str() {
                    text.push(' ');
                    text.push_str(word);
                }
            }
            match args.kw("class") {
                Some(class) => Node::Vdom(json!({
                    "tagName": "p",
                    "attributes": {"class": class},
                    "children": [text],
                })),
                None => Node::Text(text),
            }
        },
    )?;

    // Calling produces a descriptor; nothing renders yet.
    let descriptor = greeting.call(
        Args::new()
            .arg("World")
            .arg("from")
            .arg("Rust")
            .kw("class", "hero"),
    );
    println!("descriptor: {descriptor:?}");
    println!("rendered:   {:?}", descriptor.render());

    // Each render re-invokes the function; descriptors never cache output.
    let renders = Arc::new(AtomicUsize::new(0));
    let counted = {
        let renders = Arc::clone(&renders);
        component("Tick", Signature::new(), move |_| {
            let n = renders.fetch_add(1, Ordering::SeqCst) + 1;
            Node::Text(format!("render #{n}"))
        })?
    };
    let tick = counted.call(Args::new());
    println!("first:  {:?}", tick.render());
    println!("second: {:?}", tick.render());

    // Two descriptors from identical calls still have distinct identities.
    println!("a: {:?}", counted.call(Args::new()));
    println!("b: {:?}", counted.call(Args::new()));

    // Arguments the signature cannot bind degrade to a placeholder rather
    // than failing the diagnostic.
    let unbindable = greeting.call(Args::new().kw("nonsense", true));
    println!("placeholder: {unbindable:?}");

    // `key` is reserved for the caller; declaring it as a parameter is
    // rejected up front.
    let err = component("Item", Signature::new().arg("key"), |_| Node::Empty)
        .expect_err("reserved parameter");
    println!("rejected: {err}");

    // The bundled two-level sample application.
    let app = sample_app()?;
    println!("sample: {:?}", app.render());

    Ok(())
}
