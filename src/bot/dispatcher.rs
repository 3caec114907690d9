use crate::bot::handler::{MessageHandler, Outcome};
use crate::transport::InboundEvent;
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};

#[derive(Debug)]
pub enum DispatchMessage {
    Event(InboundEvent),
    /// Stop accepting events, finish in-flight work, then acknowledge
    Shutdown(oneshot::Sender<()>),
}

/// Fans inbound events out to one task each; per-user ordering comes from the store's locks
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: Sender<DispatchMessage>,
}

impl DispatcherHandle {
    pub fn new(handler: Arc<MessageHandler>, buffer_size: usize) -> Self {
        let (sender, receiver) = channel(buffer_size.max(1));
        tokio::spawn(dispatcher_actor(receiver, handler));
        Self { sender }
    }

    pub async fn dispatch(&self, event: InboundEvent) -> anyhow::Result<()> {
        self.sender
            .send(DispatchMessage::Event(event))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send event to dispatcher: {}", e))
    }

    /// Resolves once every accepted event has been handled
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.sender
            .send(DispatchMessage::Shutdown(done_tx))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send shutdown to dispatcher: {}", e))?;
        done_rx
            .await
            .map_err(|e| anyhow::anyhow!("Dispatcher stopped before acknowledging shutdown: {}", e))
    }
}

async fn dispatcher_actor(mut receiver: Receiver<DispatchMessage>, handler: Arc<MessageHandler>) {
    let mut in_flight: JoinSet<Outcome> = JoinSet::new();

    tracing::info!("Dispatcher started");

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(DispatchMessage::Event(event)) => {
                    let handler = Arc::clone(&handler);
                    in_flight.spawn(async move { handler.handle(event).await });
                }
                Some(DispatchMessage::Shutdown(done)) => {
                    tracing::info!("Dispatcher received shutdown, draining {} tasks", in_flight.len());
                    drain(&mut in_flight).await;
                    let _ = done.send(());
                    break;
                }
                None => {
                    tracing::info!("Dispatcher channel closed, draining {} tasks", in_flight.len());
                    drain(&mut in_flight).await;
                    break;
                }
            },
            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                record_completion(result);
            }
        }
    }

    tracing::info!("Dispatcher stopped");
}

async fn drain(in_flight: &mut JoinSet<Outcome>) {
    while let Some(result) = in_flight.join_next().await {
        record_completion(result);
    }
}

fn record_completion(result: Result<Outcome, JoinError>) {
    match result {
        Ok(outcome) => tracing::debug!("Unit of work finished: {:?}", outcome),
        Err(e) => tracing::error!("Unit of work panicked or was cancelled: {}", e),
    }
}
