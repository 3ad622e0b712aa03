//! Background request plumbing shared by the stores.
//!
//! Every remote call runs in its own spawned task and reports back with
//! exactly one event over an mpsc channel. The owning store applies events
//! on its own task, so state is never touched concurrently.
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const CHANNEL_CAPACITY: usize = 64;

/// Wraps a future to catch panics, converting them to error messages.
pub(crate) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(panic_message)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Spawned requests plus the channel their results come back on.
///
/// Dropping the inbox aborts every outstanding request.
pub(crate) struct Inbox<E> {
    tx: mpsc::Sender<E>,
    rx: mpsc::Receiver<E>,
    tasks: JoinSet<()>,
    in_flight: usize,
}

impl<E: Send + 'static> Inbox<E> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            rx,
            tasks: JoinSet::new(),
            in_flight: 0,
        }
    }

    /// Spawn `request`; its output (or `on_panic`'s) arrives via [`Inbox::recv`].
    pub(crate) fn spawn<F, P>(&mut self, task: &'static str, request: F, on_panic: P)
    where
        F: Future<Output = E> + Send + 'static,
        P: FnOnce(String) -> E + Send + 'static,
    {
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.tasks.spawn(async move {
            let event = match catch_task_panic(request).await {
                Ok(event) => event,
                Err(panic_msg) => {
                    tracing::error!(task, error = %panic_msg, "Background task panicked");
                    on_panic(panic_msg)
                }
            };
            if let Err(e) = tx.send(event).await {
                tracing::debug!(task, error = %e, "Store dropped before result arrived, discarding");
            }
        });
    }

    /// Next completed request, or `None` once nothing is in flight.
    pub(crate) async fn recv(&mut self) -> Option<E> {
        if self.in_flight == 0 {
            return None;
        }
        let event = self.rx.recv().await;
        if event.is_some() {
            self.in_flight -= 1;
        }
        self.reap();
        event
    }

    /// Completed request without waiting.
    pub(crate) fn try_recv(&mut self) -> Option<E> {
        let event = self.rx.try_recv().ok();
        if event.is_some() {
            self.in_flight -= 1;
            self.reap();
        }
        event
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }
}
