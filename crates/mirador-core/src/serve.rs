use crate::channel::{EventSource, PatchSink, TransportError};
use crate::config;
use crate::layout::{Layout, LayoutError};
use crate::task::{current_task_name, named};
use std::error::Error;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Errors that can end a served session.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The layout failed to mount; the session never started.
    #[error("failed to mount layout: {0}")]
    Mount(#[source] Box<dyn Error + Send + Sync>),
    /// A render pass failed.
    #[error("render failed: {0}")]
    Render(#[source] Box<dyn Error + Send + Sync>),
    /// The send channel rejected a patch.
    #[error("failed to send update: {0}")]
    Send(#[source] TransportError),
    /// The receive channel failed; there is no recovery path at this layer.
    #[error("receive channel failed: {0}")]
    Recv(#[source] TransportError),
    /// An event handler failed while processing a delivery.
    #[error("event delivery failed: {0}")]
    Delivery(#[source] Box<dyn Error + Send + Sync>),
    /// A session task panicked or was aborted from outside.
    #[error("session task failed: {0}")]
    Join(#[source] JoinError),
}

/// How a unit of work inside the session scope terminated early.
enum Fault {
    /// Graceful stop requested by application code.
    Stop,
    /// Hard failure; faults the whole session.
    Error(ServeError),
}

/// Serve one UI session over a layout and a pair of channels.
///
/// This call does not return until the session ends: by fault, by the
/// deprecated [`Stop`](crate::layout::Stop) request, or because the caller
/// cancelled (dropped) it.  It runs two long-running units of work under one
/// structured scope:
///
/// * **Render production** repeatedly awaits [`Layout::render`] and forwards
///   each patch over `send`.  A send failure is fatal; when debug mode is
///   off it is logged with a hint naming the `MIRADOR_DEBUG` switch.
/// * **Event consumption** repeatedly awaits [`EventSource::recv`] and
///   spawns a short-lived delivery unit of work per event, without waiting
///   for delivery to finish first.  A slow handler therefore never blocks
///   intake of later events; events are dispatched in strict arrival order
///   while completion order stays unconstrained.
///
/// Delivery units belong to the same scope as the loops, so one handler's
/// hard failure faults the whole session and teardown cancels every
/// in-flight delivery.  Whether the session ends normally, faults, or is
/// cancelled by the caller, the layout is released via [`Layout::unmount`]
/// exactly once.
///
/// # Example
///
/// ```
/// use mirador_core::serve::serve_layout;
/// use mirador_core::testing::TestLayout;
/// use tokio::sync::mpsc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (layout, handle) = TestLayout::<String, ()>::new();
/// let (patch_tx, mut patch_rx) = mpsc::unbounded_channel();
/// let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();
///
/// let session = tokio::spawn(serve_layout(layout, patch_tx, event_rx));
///
/// handle.push_patch("first".to_owned());
/// assert_eq!(patch_rx.recv().await, Some("first".to_owned()));
///
/// session.abort();
/// drop(event_tx);
/// # }
/// ```
pub async fn serve_layout<L, S, R>(layout: L, send: S, recv: R) -> Result<(), ServeError>
where
    L: Layout,
    S: PatchSink<L::Patch>,
    R: EventSource<L::Event>,
{
    let layout = Arc::new(layout);
    let session = layout.id();
    info!(task = %current_task_name(), session, "serving layout");

    if let Err(err) = layout.mount().await {
        return Err(ServeError::Mount(match err {
            LayoutError::Stop(stop) => Box::new(stop),
            LayoutError::Failed(inner) => inner,
        }));
    }

    // Declared before the scope so the scope's tasks are aborted first when
    // the serving call is dropped, and the layout released after.
    let _guard = MountGuard(Arc::clone(&layout));
    let mut tasks: JoinSet<Result<(), Fault>> = JoinSet::new();

    tasks.spawn(named(
        format!("session-{session}-render"),
        outgoing_loop(Arc::clone(&layout), send, session),
    ));

    let fault = incoming_loop(&mut tasks, &layout, recv, session).await;

    debug!(task = %current_task_name(), session, "shutting down session tasks");
    tasks.shutdown().await;

    match fault {
        Fault::Stop => {
            stop_deprecation_notice();
            info!(task = %current_task_name(), session, "stopped serving layout");
            Ok(())
        }
        Fault::Error(err) => Err(err),
    }
}

/// Releases the layout exactly once, on every exit path.
struct MountGuard<L: Layout>(Arc<L>);

impl<L: Layout> Drop for MountGuard<L> {
    fn drop(&mut self) {
        self.0.unmount();
    }
}

/// Render production: forward every patch the layout produces.
async fn outgoing_loop<L, S>(layout: Arc<L>, mut send: S, session: u64) -> Result<(), Fault>
where
    L: Layout,
    S: PatchSink<L::Patch>,
{
    loop {
        let patch = match layout.render().await {
            Ok(patch) => patch,
            Err(LayoutError::Stop(_)) => return Err(Fault::Stop),
            Err(LayoutError::Failed(err)) => return Err(Fault::Error(ServeError::Render(err))),
        };
        debug!(task = %current_task_name(), session, "sending update");
        if let Err(err) = send.send(patch).await {
            if !config::debug() {
                error!(
                    task = %current_task_name(),
                    session,
                    "failed to send update; more detail may be available after setting MIRADOR_DEBUG=1"
                );
            }
            return Err(Fault::Error(ServeError::Send(err)));
        }
    }
}

/// Event consumption: receive each event and spawn its delivery into the
/// session scope without waiting for it, while collecting completions and
/// faults from every unit of work in the scope.
async fn incoming_loop<L, R>(
    tasks: &mut JoinSet<Result<(), Fault>>,
    layout: &Arc<L>,
    mut recv: R,
    session: u64,
) -> Fault
where
    L: Layout,
    R: EventSource<L::Event>,
{
    let mut sequence: u64 = 0;
    loop {
        tokio::select! {
            biased;

            Some(joined) = tasks.join_next() => {
                match joined {
                    Ok(Ok(())) => {} // one delivery finished
                    Ok(Err(fault)) => return fault,
                    Err(join_err) => return Fault::Error(ServeError::Join(join_err)),
                }
            }

            received = recv.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(err) => return Fault::Error(ServeError::Recv(err)),
                };
                sequence += 1;
                debug!(task = %current_task_name(), session, sequence, "dispatching event");
                let layout = Arc::clone(layout);
                tasks.spawn(named(format!("session-{session}-event-{sequence}"), async move {
                    match layout.deliver(event).await {
                        Ok(()) => Ok(()),
                        Err(LayoutError::Stop(_)) => Err(Fault::Stop),
                        Err(LayoutError::Failed(err)) => {
                            Err(Fault::Error(ServeError::Delivery(err)))
                        }
                    }
                }));
            }
        }
    }
}

fn stop_deprecation_notice() {
    use std::sync::Once;
    static NOTICE: Once = Once::new();
    NOTICE.call_once(|| {
        warn!("Stop is deprecated; close the session from the transport side instead");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Stop;
    use crate::testing::TestLayout;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn patches_stream_to_the_send_channel_in_order() {
        let (layout, handle) = TestLayout::<u32, ()>::new();
        let (patch_tx, mut patch_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        let session = tokio::spawn(serve_layout(layout, patch_tx, event_rx));

        handle.push_patch(1);
        handle.push_patch(2);
        assert_eq!(patch_rx.recv().await, Some(1));
        assert_eq!(patch_rx.recv().await, Some(2));

        session.abort();
        let _ = session.await;
    }

    #[tokio::test]
    async fn events_are_dispatched_in_arrival_order() {
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let recorder = dispatched.clone();
        let (layout, _handle) = TestLayout::<u32, u32>::with_handler(move |event, _| {
            recorder.lock().unwrap().push(event);
            Box::pin(async { Ok(()) })
        });
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = tokio::spawn(serve_layout(layout, patch_tx, event_rx));

        for event in 1..=5 {
            event_tx.send(event).unwrap();
        }
        // Let the dispatch loop drain the queue.
        while dispatched.lock().unwrap().len() < 5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*dispatched.lock().unwrap(), vec![1, 2, 3, 4, 5]);

        session.abort();
        let _ = session.await;
    }

    #[tokio::test]
    async fn a_stalled_delivery_does_not_block_later_dispatch() {
        let stall = Arc::new(Notify::new());
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let dispatched = Arc::new(Mutex::new(Vec::new()));

        let recorder = dispatched.clone();
        let stalled = stall.clone();
        let (layout, _handle) = TestLayout::<u32, u32>::with_handler(move |event, _| {
            recorder.lock().unwrap().push(event);
            let stalled = stalled.clone();
            let done = done_tx.clone();
            Box::pin(async move {
                if event == 1 {
                    // Never notified: the first handler stays in flight.
                    stalled.notified().await;
                }
                let _ = done.send(event);
                Ok(())
            })
        });
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = tokio::spawn(serve_layout(layout, patch_tx, event_rx));

        event_tx.send(1).unwrap();
        event_tx.send(2).unwrap();

        // The second event completes while the first is still suspended.
        assert_eq!(done_rx.recv().await, Some(2));
        assert_eq!(*dispatched.lock().unwrap(), vec![1, 2]);

        session.abort();
        let _ = session.await;
    }

    #[tokio::test]
    async fn send_failure_faults_the_session_and_stops_rendering() {
        let (layout, handle) = TestLayout::<u32, ()>::new();
        let (patch_tx, patch_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        drop(patch_rx);
        handle.push_patch(1);
        handle.push_patch(2);

        let result = serve_layout(layout, patch_tx, event_rx).await;
        assert!(matches!(result, Err(ServeError::Send(TransportError::Closed))));

        // The failed send ended the loop before a second render.
        assert_eq!(handle.render_calls(), 1);
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test]
    async fn render_failure_faults_the_session() {
        let (layout, handle) = TestLayout::<u32, ()>::new();
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        handle.fail_render(LayoutError::failed(std::io::Error::new(
            std::io::ErrorKind::Other,
            "tree corrupted",
        )));

        let result = serve_layout(layout, patch_tx, event_rx).await;
        assert!(matches!(result, Err(ServeError::Render(_))));
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test]
    async fn handler_failure_faults_the_whole_session() {
        let (layout, handle) = TestLayout::<u32, u32>::with_handler(|_, _| {
            Box::pin(async { Err(LayoutError::failed("handler exploded")) })
        });
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        event_tx.send(7).unwrap();

        let result = serve_layout(layout, patch_tx, event_rx).await;
        assert!(matches!(result, Err(ServeError::Delivery(_))));
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test]
    async fn a_panicking_handler_surfaces_as_a_join_failure() {
        let (layout, handle) = TestLayout::<u32, u32>::with_handler(|_, _| {
            Box::pin(async { panic!("handler panicked") })
        });
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        event_tx.send(1).unwrap();

        let result = serve_layout(layout, patch_tx, event_rx).await;
        match result {
            Err(ServeError::Join(join_err)) => assert!(join_err.is_panic()),
            other => panic!("expected a join failure, got {other:?}"),
        }
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test]
    async fn stop_from_a_delivery_ends_the_session_cleanly() {
        let (layout, handle) = TestLayout::<u32, u32>::with_handler(|_, _| {
            Box::pin(async { Err(Stop.into()) })
        });
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        event_tx.send(1).unwrap();

        let result = serve_layout(layout, patch_tx, event_rx).await;
        assert!(result.is_ok());
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test]
    async fn stop_from_a_render_ends_the_session_cleanly() {
        let (layout, handle) = TestLayout::<u32, ()>::new();
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        handle.fail_render(Stop.into());

        let result = serve_layout(layout, patch_tx, event_rx).await;
        assert!(result.is_ok());
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test]
    async fn closed_event_channel_faults_the_session() {
        let (layout, handle) = TestLayout::<u32, ()>::new();
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        drop(event_tx);

        let result = serve_layout(layout, patch_tx, event_rx).await;
        assert!(matches!(result, Err(ServeError::Recv(TransportError::Closed))));
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test]
    async fn mount_failure_never_starts_the_session() {
        let (layout, handle) = TestLayout::<u32, ()>::new();
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        handle.fail_mount(LayoutError::failed("no root component"));

        let result = serve_layout(layout, patch_tx, event_rx).await;
        assert!(matches!(result, Err(ServeError::Mount(_))));
        assert!(!handle.is_mounted());
        // Mount never succeeded, so there is nothing to release.
        assert!(!handle.is_released());
        assert_eq!(handle.render_calls(), 0);
    }

    #[tokio::test]
    async fn cancelling_the_serving_call_still_releases_the_layout() {
        let (layout, handle) = TestLayout::<u32, ()>::new();
        let (patch_tx, _patch_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        let session = tokio::spawn(serve_layout(layout, patch_tx, event_rx));
        while !handle.is_mounted() {
            tokio::task::yield_now().await;
        }

        session.abort();
        let joined = session.await;
        assert!(joined.unwrap_err().is_cancelled());
        assert_eq!(handle.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn three_clicks_increment_exactly_three_times() {
        let counter = Arc::new(AtomicU32::new(0));
        let (clicks, handle) = {
            let counter = counter.clone();
            TestLayout::<u32, u32>::with_handler(move |click, handle| {
                let counter = counter.clone();
                Box::pin(async move {
                    // Earlier clicks take longer, so completions interleave
                    // in reverse of dispatch order.
                    tokio::time::sleep(Duration::from_millis(40 - 10 * u64::from(click))).await;
                    let total = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    // Re-render after every state change; the last patch is
                    // the final observed state.
                    handle.push_patch(total);
                    Ok(())
                })
            })
        };
        let (patch_tx, mut patch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = tokio::spawn(serve_layout(clicks, patch_tx, event_rx));

        for click in 1..=3 {
            event_tx.send(click).unwrap();
        }

        // One render per completed increment; the final one observes exactly
        // three increments no matter which click finished when.
        assert_eq!(patch_rx.recv().await, Some(1));
        assert_eq!(patch_rx.recv().await, Some(2));
        assert_eq!(patch_rx.recv().await, Some(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        session.abort();
        let _ = session.await;
        assert_eq!(handle.release_count(), 1);
    }
}
