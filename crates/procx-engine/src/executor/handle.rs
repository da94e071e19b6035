use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Running executor loops and their shared shutdown signal
pub struct ExecutorHandle {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ExecutorHandle {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub(crate) fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every loop to stop and wait for them, including jobs in flight
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "executor task ended abnormally");
            }
        }
        tracing::info!("job executors stopped");
    }
}

impl Default for ExecutorHandle {
    fn default() -> Self {
        Self::new()
    }
}
