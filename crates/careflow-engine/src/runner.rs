//! Event runner with channel-based triggering.
//!
//! The `EventRunner` owns an mpsc channel for receiving incoming events and
//! hands each one to the [`Dispatcher`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use careflow_workflow::{IncomingEvent, RunOutcome, RunStatus};

use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::events::{ExecutionNotifier, NoopNotifier};

/// A runner that dispatches incoming events as they arrive.
///
/// # Usage
///
/// ```ignore
/// let runner = EventRunner::new(dispatcher);
///
/// // Get sender for event sources (webhooks, the scheduler, etc.)
/// let sender = runner.sender();
///
/// // Start the dispatch loop
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await?;
/// ```
pub struct EventRunner<N: ExecutionNotifier = NoopNotifier> {
  sender: mpsc::Sender<IncomingEvent>,
  receiver: mpsc::Receiver<IncomingEvent>,
  dispatcher: Arc<Dispatcher<N>>,
}

impl<N: ExecutionNotifier + 'static> EventRunner<N> {
  pub fn new(dispatcher: Arc<Dispatcher<N>>) -> Self {
    Self::with_buffer_size(dispatcher, 100)
  }

  pub fn with_buffer_size(dispatcher: Arc<Dispatcher<N>>, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      dispatcher,
    }
  }

  /// Get a sender handle for submitting events.
  pub fn sender(&self) -> mpsc::Sender<IncomingEvent> {
    self.sender.clone()
  }

  /// Submit an event through the channel.
  pub async fn send(&self, event: IncomingEvent) -> Result<(), EngineError> {
    self
      .sender
      .send(event)
      .await
      .map_err(|_| EngineError::ChannelClosed)
  }

  /// Start the dispatch loop.
  ///
  /// Runs until the cancellation token is triggered or every sender has been
  /// dropped. A failed dispatch is logged and the loop continues.
  pub async fn start(self, cancel: CancellationToken) -> Result<(), EngineError> {
    let Self {
      sender,
      mut receiver,
      dispatcher,
    } = self;
    // Only external senders keep the loop alive.
    drop(sender);

    info!("starting event runner");

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("event runner cancelled");
          break;
        }
        event = receiver.recv() => {
          match event {
            Some(event) => {
              let dispatch_cancel = cancel.child_token();
              match dispatcher.dispatch(&event, dispatch_cancel).await {
                Ok(outcomes) => log_outcomes(&event, &outcomes),
                Err(e) => {
                  error!(event = %event.describe(), error = %e, "event dispatch failed");
                }
              }
            }
            None => {
              info!("event runner channel closed");
              break;
            }
          }
        }
      }
    }

    Ok(())
  }

  /// Dispatch a single event directly, without the channel.
  pub async fn execute_once(
    &self,
    event: &IncomingEvent,
    cancel: CancellationToken,
  ) -> Result<Vec<RunOutcome>, EngineError> {
    self.dispatcher.dispatch(event, cancel).await
  }

  pub fn dispatcher(&self) -> &Dispatcher<N> {
    &self.dispatcher
  }
}

fn log_outcomes(event: &IncomingEvent, outcomes: &[RunOutcome]) {
  let failed = outcomes
    .iter()
    .filter(|o| o.status == RunStatus::Failed)
    .count();
  info!(
    event = %event.describe(),
    runs = outcomes.len(),
    failed,
    "event dispatched"
  );
}
