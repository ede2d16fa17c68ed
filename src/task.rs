//! One-shot background work polled from the UI tick.
//!
//! Views start a screen handler with `Task::spawn` and call `poll` on every
//! tick; the result becomes visible once the handler finishes.
//!
//! ```ignore
//! let screen = self.screen.clone();
//! self.save = Task::spawn(async move { screen.save_profile().await });
//!
//! // In tick
//! if self.save.poll() {
//!     // Finished, re-render
//! }
//! ```

use std::future::Future;
use tokio::sync::oneshot;

/// Progress of a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState<T> {
  /// Nothing has been started
  Idle,
  /// The handler is still running
  Running,
  /// The handler finished successfully
  Done(T),
  /// The handler failed with an error
  Failed(String),
}

/// Handle to a spawned handler
#[derive(Debug)]
pub struct Task<T> {
  state: TaskState<T>,
  receiver: Option<oneshot::Receiver<Result<T, String>>>,
}

impl<T> Default for Task<T> {
  fn default() -> Self {
    Self::idle()
  }
}

impl<T> Task<T> {
  pub fn idle() -> Self {
    Self {
      state: TaskState::Idle,
      receiver: None,
    }
  }

  pub fn state(&self) -> &TaskState<T> {
    &self.state
  }

  pub fn is_running(&self) -> bool {
    matches!(self.state, TaskState::Running)
  }

  pub fn error(&self) -> Option<&str> {
    match &self.state {
      TaskState::Failed(e) => Some(e),
      _ => None,
    }
  }

  /// Take the finished value, leaving the task idle.
  pub fn take(&mut self) -> Option<T> {
    match std::mem::replace(&mut self.state, TaskState::Idle) {
      TaskState::Done(value) => Some(value),
      other => {
        self.state = other;
        None
      }
    }
  }

  /// Check for the handler's result.
  ///
  /// Returns `true` if the state changed. Call this in the tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(value)) => {
        self.state = TaskState::Done(value);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = TaskState::Failed(error);
        self.receiver = None;
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        // The handler panicked before sending
        self.state = TaskState::Failed("Task was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }
}

impl<T: Send + 'static> Task<T> {
  /// Run `future` on the runtime. Dropping the task does not cancel it.
  pub fn spawn<Fut>(future: Fut) -> Self
  where
    Fut: Future<Output = color_eyre::Result<T>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result = future.await.map_err(|e| e.to_string());
      // Ignore send errors - the view may have been closed
      let _ = tx.send(result);
    });
    Self {
      state: TaskState::Running,
      receiver: Some(rx),
    }
  }
}
