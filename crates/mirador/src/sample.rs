//! A small ready-made application, used by the documentation and as a smoke
//! test that the component layer hangs together.

use mirador_core::component::{component, Args, Component, ComponentError, Node, Signature};
use mirador_core::config;
use serde_json::json;
use tracing::info;

/// Build the sample application's root descriptor.
///
/// The root's render returns a further descriptor (a keyed page component),
/// and the page's render returns a raw UI-node payload in the shape a
/// diffing engine consumes.  Rendering needs no live session:
///
/// ```
/// use mirador::sample::sample_app;
/// use mirador::Node;
///
/// let app = sample_app().unwrap();
/// let page = match app.render() {
///     Node::Component(page) => page,
///     _ => unreachable!(),
/// };
/// match page.render() {
///     Node::Vdom(tree) => assert_eq!(tree["attributes"]["id"], "sample"),
///     _ => unreachable!(),
/// }
/// ```
pub fn sample_app() -> Result<Component, ComponentError> {
    let page = component("SamplePage", Signature::new().arg("title"), |args| {
        let title = args.arg(0).and_then(|v| v.as_str()).unwrap_or("Sample");
        Node::Vdom(json!({
            "tagName": "div",
            "attributes": {"id": "sample", "style": {"padding": "15px"}},
            "children": [
                {"tagName": "h1", "children": [title]},
                {
                    "tagName": "p",
                    "children": [
                        "This is a basic application made with mirador. Click ",
                        {
                            "tagName": "a",
                            "attributes": {
                                "href": "https://crates.io/crates/mirador",
                                "target": "_blank",
                            },
                            "children": ["here"],
                        },
                        " to learn more.",
                    ],
                },
            ],
        }))
    })?;

    let app = component("SampleApp", Signature::new(), move |_| {
        info!(debug = config::debug(), "rendering sample application");
        // A render function may hand back another descriptor; the engine
        // materializes it in place.
        page.call(Args::new().arg("Sample Application").key("page"))
            .into()
    })?;

    Ok(app.call(Args::new()))
}
