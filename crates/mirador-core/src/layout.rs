use std::error::Error;

// Re-exported so implementations can write trait method signatures without
// depending on `futures` themselves.
pub use futures::future::BoxFuture;

/// Cooperative request to stop serving a session.
///
/// Deprecated: application code should close the session from the transport
/// side instead.  Still honored: returning `LayoutError::Stop` from a render
/// or delivery path makes [`serve_layout`](crate::serve::serve_layout) exit
/// cleanly (with a one-time deprecation warning) rather than fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("stop requested")]
pub struct Stop;

/// Errors escaping a layout operation.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// Graceful termination request (see [`Stop`]).
    #[error(transparent)]
    Stop(#[from] Stop),
    /// Hard failure inside mount, render, or delivery.
    #[error("layout operation failed: {0}")]
    Failed(#[source] Box<dyn Error + Send + Sync>),
}

impl LayoutError {
    /// Wrap any error as a hard layout failure.
    pub fn failed(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        LayoutError::Failed(err.into())
    }

    /// Whether this is the graceful [`Stop`] request.
    pub fn is_stop(&self) -> bool {
        matches!(self, LayoutError::Stop(_))
    }
}

/// The collaborator that holds current UI tree state, produces patches on
/// render, and routes incoming events to handlers.
///
/// The session runtime only consumes this contract; the diffing engine
/// behind it is out of scope here.  What the runtime relies on:
///
/// * **Scoped resource.**  [`mount`](Layout::mount) runs before the first
///   render and [`unmount`](Layout::unmount) runs exactly once on every exit
///   path, whether that is normal completion, a fault, or cancellation.
///   `unmount` is
///   synchronous so the runtime can guarantee it even when the serving call
///   is dropped mid-await.
/// * **Render reflects accumulated state.**  [`render`](Layout::render)
///   suspends until state changes since the previous call produce the next
///   patch; calling it repeatedly yields a stream of patches.
/// * **Delivery may suspend arbitrarily.**  [`deliver`](Layout::deliver)
///   routes one event to the handler the current tree registered for it and
///   may await state or I/O for as long as it needs.  The runtime invokes
///   deliveries concurrently; implementations serialize them internally
///   against a render pass.
///
/// Methods return [`BoxFuture`]s so the trait stays object-safe and
/// implementations can borrow `self` across awaits.
pub trait Layout: Send + Sync + 'static {
    /// What one render produces.
    type Patch: Send + 'static;
    /// What the session's receive channel carries.
    type Event: Send + 'static;

    /// Acquire the layout: build the root tree, register hooks.
    ///
    /// The default implementation does nothing.
    fn mount(&self) -> BoxFuture<'_, Result<(), LayoutError>> {
        Box::pin(async { Ok(()) })
    }

    /// Suspend until accumulated state changes produce the next patch.
    fn render(&self) -> BoxFuture<'_, Result<Self::Patch, LayoutError>>;

    /// Route one event to its registered handler.
    fn deliver(&self, event: Self::Event) -> BoxFuture<'_, Result<(), LayoutError>>;

    /// Release the layout.  Runs exactly once at teardown.
    ///
    /// The default implementation does nothing.
    fn unmount(&self) {}

    /// Coarse instance identifier, used purely for diagnostic naming.
    fn id(&self) -> u64;
}
