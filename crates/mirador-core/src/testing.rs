//! Test harness for driving the session runtime without a real diffing
//! engine or transport.
//!
//! [`TestLayout`] is a scriptable [`Layout`]: a [`TestLayoutHandle`] queues
//! the outcome of each render (a patch or a failure), event deliveries run
//! through a caller-supplied async handler, and the mount/unmount lifecycle
//! is recorded so tests can assert the scoped-resource contract.

use crate::layout::{Layout, LayoutError};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type EventHandler<P, E> = Box<
    dyn Fn(E, TestLayoutHandle<P>) -> BoxFuture<'static, Result<(), LayoutError>> + Send + Sync,
>;

/// Process-wide counter so every [`TestLayout`] gets a distinct id.
static NEXT_LAYOUT: AtomicU64 = AtomicU64::new(0);

/// A scriptable layout for exercising
/// [`serve_layout`](crate::serve::serve_layout).
///
/// Renders yield whatever the handle queued, in order; with an empty queue a
/// render suspends, like a real layout idle between state changes.  Each
/// delivered event runs the handler given to [`with_handler`], which also
/// receives a handle clone so it can push follow-up patches the way a real
/// handler triggers re-renders.
///
/// [`with_handler`]: TestLayout::with_handler
pub struct TestLayout<P, E> {
    id: u64,
    patches: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<P, LayoutError>>>,
    on_event: EventHandler<P, E>,
    handle: TestLayoutHandle<P>,
}

/// Scripting and inspection handle for a [`TestLayout`].
pub struct TestLayoutHandle<P> {
    patch_tx: mpsc::UnboundedSender<Result<P, LayoutError>>,
    mount_error: Arc<Mutex<Option<LayoutError>>>,
    mounted: Arc<AtomicBool>,
    releases: Arc<AtomicUsize>,
    render_calls: Arc<AtomicUsize>,
}

impl<P> Clone for TestLayoutHandle<P> {
    fn clone(&self) -> Self {
        Self {
            patch_tx: self.patch_tx.clone(),
            mount_error: self.mount_error.clone(),
            mounted: self.mounted.clone(),
            releases: self.releases.clone(),
            render_calls: self.render_calls.clone(),
        }
    }
}

impl<P: Send + 'static, E: Send + 'static> TestLayout<P, E> {
    /// A layout whose deliveries are acknowledged and dropped.
    pub fn new() -> (Self, TestLayoutHandle<P>) {
        Self::with_handler(|_, _| Box::pin(async { Ok(()) }))
    }

    /// A layout that runs `on_event` for every delivered event.
    pub fn with_handler<F>(on_event: F) -> (Self, TestLayoutHandle<P>)
    where
        F: Fn(E, TestLayoutHandle<P>) -> BoxFuture<'static, Result<(), LayoutError>>
            + Send
            + Sync
            + 'static,
    {
        let (patch_tx, patch_rx) = mpsc::unbounded_channel();
        let handle = TestLayoutHandle {
            patch_tx,
            mount_error: Arc::new(Mutex::new(None)),
            mounted: Arc::new(AtomicBool::new(false)),
            releases: Arc::new(AtomicUsize::new(0)),
            render_calls: Arc::new(AtomicUsize::new(0)),
        };
        let layout = TestLayout {
            id: NEXT_LAYOUT.fetch_add(1, Ordering::Relaxed) + 1,
            patches: tokio::sync::Mutex::new(patch_rx),
            on_event: Box::new(on_event),
            handle: handle.clone(),
        };
        (layout, handle)
    }
}

impl<P> TestLayoutHandle<P> {
    /// Queue a patch for the next render.
    pub fn push_patch(&self, patch: P) {
        let _ = self.patch_tx.send(Ok(patch));
    }

    /// Queue a failure for the next render.
    pub fn fail_render(&self, err: LayoutError) {
        let _ = self.patch_tx.send(Err(err));
    }

    /// Make the next mount fail.  Takes effect only before serving starts.
    pub fn fail_mount(&self, err: LayoutError) {
        *self.mount_error.lock().unwrap() = Some(err);
    }

    /// Whether the layout has been mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Whether the layout has been released at least once.
    pub fn is_released(&self) -> bool {
        self.release_count() > 0
    }

    /// How many times the layout has been released.  The scoped-resource
    /// contract is exactly once per session.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// How many render passes have started.
    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }
}

impl<P: Send + 'static, E: Send + 'static> Layout for TestLayout<P, E> {
    type Patch = P;
    type Event = E;

    fn mount(&self) -> BoxFuture<'_, Result<(), LayoutError>> {
        Box::pin(async move {
            if let Some(err) = self.handle.mount_error.lock().unwrap().take() {
                return Err(err);
            }
            self.handle.mounted.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn render(&self) -> BoxFuture<'_, Result<P, LayoutError>> {
        Box::pin(async move {
            self.handle.render_calls.fetch_add(1, Ordering::SeqCst);
            let mut patches = self.patches.lock().await;
            match patches.recv().await {
                Some(next) => next,
                // The layout holds its own sender clone, so the queue never
                // closes; treat exhaustion like an idle layout anyway.
                None => futures::future::pending().await,
            }
        })
    }

    fn deliver(&self, event: E) -> BoxFuture<'_, Result<(), LayoutError>> {
        (self.on_event)(event, self.handle.clone())
    }

    fn unmount(&self) {
        self.handle.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn id(&self) -> u64 {
        self.id
    }
}
