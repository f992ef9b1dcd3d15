use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Handle to a periodic background job.
///
/// The job watches `token` between ticks. Shutting down cancels the token and
/// waits for the task, so a tick already in progress runs to completion
/// before the job's final value is returned.
#[derive(Debug)]
pub struct JobHandle<T> {
    token: CancellationToken,
    handle: JoinHandle<T>,
}

impl<T> JobHandle<T> {
    /// Wraps a spawned task and the token it watches.
    pub fn new(token: CancellationToken, handle: JoinHandle<T>) -> Self {
        Self { token, handle }
    }

    /// The token the job stops on.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the job to stop and waits for it to exit.
    pub async fn shutdown(self) -> Result<T, JoinError> {
        self.token.cancel();
        self.handle.await
    }
}
