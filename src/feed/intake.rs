/// Publish intake: a bounded channel between the article write path and the
/// fan-out dispatcher, so publishing never waits on fan-out.
use crate::error::{CoreError, CoreResult};
use crate::feed::dispatcher::{FanoutDispatcher, PublishEvent};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Producer half handed to the article service
#[derive(Clone)]
pub struct PublishProducer {
    tx: mpsc::Sender<PublishEvent>,
}

impl PublishProducer {
    #[cfg(test)]
    pub(crate) fn for_tests(tx: mpsc::Sender<PublishEvent>) -> Self {
        Self { tx }
    }

    /// Enqueue a publish for fan-out. Backpressure blocks the caller; a
    /// closed intake is an internal error, the process is shutting down.
    pub async fn publish(&self, event: PublishEvent) -> CoreResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CoreError::Internal("publish intake closed".to_string()))
    }
}

/// Consumer half: drains the channel and drives the dispatcher
pub struct PublishIntake {
    rx: mpsc::Receiver<PublishEvent>,
    dispatcher: FanoutDispatcher,
}

impl PublishIntake {
    pub fn channel(capacity: usize, dispatcher: FanoutDispatcher) -> (PublishProducer, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (PublishProducer { tx }, Self { rx, dispatcher })
    }

    /// Runs until every producer is dropped. A failed dispatch is logged and
    /// the event dropped; a stuck intake would otherwise stall all publishes.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if let Err(e) = self.dispatcher.dispatch(&event).await {
                error!(
                    author = event.author_id,
                    article = event.article_id,
                    "fan-out dispatch failed: {e}"
                );
            }
        }
        info!("publish intake drained, stopping");
    }
}
