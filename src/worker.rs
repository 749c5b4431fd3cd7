//! The `Transform` + `Worker` composition pair.
//!
//! A single generic worker loop drives any `Transform` implementation,
//! rather than a base class every pipeline stage extends: each stage is a
//! `tokio::spawn(async move { .. })` task around a trait object, composed
//! together by queue wiring rather than by subclassing a shared base.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::event::Event;
use crate::queue::BoundedQueue;

/// A single processing stage. `process` may drop an event (return `Ok(None)`),
/// pass it through or replace it (`Ok(Some(..))`), or fail (`Err`) — a failure
/// is logged and the event is dropped, the worker loop itself never stops
/// because of it.
#[async_trait]
pub trait Transform<T>: Send + Sync {
    async fn process(&self, event: Event) -> Result<Option<Event>>;

    /// Called exactly once, after the `Eos` sentinel has been read from the
    /// input and (if this transform has an output queue) before `Eos` is
    /// forwarded downstream. Default no-op.
    async fn terminated(&self) {}
}

/// Drives a `Transform` over an input queue, optionally forwarding results to
/// an output queue: take → EOS check → process → put.
pub struct Worker<T: Send + 'static> {
    input: BoundedQueue<Event>,
    output: Option<BoundedQueue<Event>>,
    transform: Arc<dyn Transform<T>>,
    label: String,
}

impl<T: Send + 'static> Worker<T> {
    pub fn new(
        label: impl Into<String>,
        input: BoundedQueue<Event>,
        output: Option<BoundedQueue<Event>>,
        transform: Arc<dyn Transform<T>>,
    ) -> Self {
        Worker { input, output, transform, label: label.into() }
    }

    /// Runs the worker loop to completion: reads events until `Eos`, calling
    /// `process` on each one. A `process` error is logged at `warn` and the
    /// event is dropped; the loop continues. On `Eos`, calls `terminated`
    /// and forwards `Eos` downstream (if there is a downstream), then
    /// returns.
    pub async fn run(self) {
        loop {
            let event = match self.input.take().await {
                Ok(event) => event,
                Err(_cancelled) => {
                    warn!(worker = %self.label, "input queue cancelled, stopping");
                    return;
                }
            };

            if event.is_eos() {
                self.transform.terminated().await;
                if let Some(output) = &self.output {
                    let _ = output.put(Event::Eos).await;
                }
                return;
            }

            match self.transform.process(event).await {
                Ok(Some(result)) => {
                    if let Some(output) = &self.output {
                        if output.put(result).await.is_err() {
                            warn!(worker = %self.label, "output queue cancelled, stopping");
                            return;
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(worker = %self.label, error = %err, "dropping event after process failure");
                }
            }
        }
    }

    /// Spawns `run` on the current tokio runtime and returns its `JoinHandle`.
    pub fn spawn(self) -> tokio::task::JoinHandle<()>
    where
        T: 'static,
    {
        tokio::spawn(self.run())
    }
}
