use futures::future::BoxFuture;
use std::error::Error;
use tokio::sync::mpsc;

/// Errors surfaced by the session's send and receive channels.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The other side of the channel is gone.
    #[error("channel closed")]
    Closed,
    /// Any other transport failure.
    #[error("transport failed: {0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl TransportError {
    /// Wrap any error as a transport failure.
    pub fn other(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        TransportError::Other(err.into())
    }
}

/// Outbound half of a session: accepts patches for the display surface.
///
/// `send` suspends until the transport accepts the patch.  A send failure is
/// fatal to the session; the runtime never retries.
pub trait PatchSink<P>: Send + 'static {
    fn send(&mut self, patch: P) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// Inbound half of a session: yields user-interaction events.
///
/// `recv` suspends until an event arrives.  The dispatch loop races the
/// returned future against other work and drops it when another branch wins,
/// so implementations must be cancellation-safe: a dropped `recv` future
/// must not lose an event.  Both tokio mpsc receivers satisfy this.
pub trait EventSource<E>: Send + 'static {
    fn recv(&mut self) -> BoxFuture<'_, Result<E, TransportError>>;
}

impl<P: Send + 'static> PatchSink<P> for mpsc::Sender<P> {
    fn send(&mut self, patch: P) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            mpsc::Sender::send(self, patch)
                .await
                .map_err(|_| TransportError::Closed)
        })
    }
}

impl<P: Send + 'static> PatchSink<P> for mpsc::UnboundedSender<P> {
    fn send(&mut self, patch: P) -> BoxFuture<'_, Result<(), TransportError>> {
        let sent = mpsc::UnboundedSender::send(self, patch).map_err(|_| TransportError::Closed);
        Box::pin(async move { sent })
    }
}

impl<E: Send + 'static> EventSource<E> for mpsc::Receiver<E> {
    fn recv(&mut self) -> BoxFuture<'_, Result<E, TransportError>> {
        Box::pin(async move {
            mpsc::Receiver::recv(self)
                .await
                .ok_or(TransportError::Closed)
        })
    }
}

impl<E: Send + 'static> EventSource<E> for mpsc::UnboundedReceiver<E> {
    fn recv(&mut self) -> BoxFuture<'_, Result<E, TransportError>> {
        Box::pin(async move {
            mpsc::UnboundedReceiver::recv(self)
                .await
                .ok_or(TransportError::Closed)
        })
    }
}
