//! Tracked background work
//!
//! Index refresh and pattern recording run off the interactive path. Each
//! task's handle is kept so shutdown can wait for in-flight writes instead
//! of dropping them.

use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::Result;

#[derive(Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run blocking store work on the blocking pool; errors are logged
    pub fn spawn_blocking<F>(&self, name: &str, work: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let label = name.to_string();
        let handle = tokio::task::spawn_blocking(move || {
            if let Err(e) = work() {
                warn!("Background task {} failed: {}", label, e);
            }
        });
        self.track(name, handle);
    }

    /// Run an async task; errors are logged
    pub fn spawn<F>(&self, name: &str, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = name.to_string();
        let handle = tokio::spawn(async move {
            if let Err(e) = work.await {
                warn!("Background task {} failed: {}", label, e);
            }
        });
        self.track(name, handle);
    }

    fn track(&self, name: &str, handle: JoinHandle<()>) {
        debug!("Spawned background task {}", name);
        if let Ok(mut handles) = self.handles.lock() {
            handles.retain(|(_, h)| !h.is_finished());
            handles.push((name.to_string(), handle));
        }
    }

    /// Tasks not yet finished
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .map(|handles| handles.iter().filter(|(_, h)| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Wait for every tracked task; returns how many were awaited
    pub async fn shutdown(&self) -> usize {
        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => return 0,
        };

        let count = handles.len();
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!("Background task {} panicked or was cancelled: {}", name, e);
            }
        }
        if count > 0 {
            info!("Waited for {} background tasks", count);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::Error;

    #[tokio::test]
    async fn test_shutdown_waits_for_work() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            tasks.spawn_blocking("count", move || {
                std::thread::sleep(std::time::Duration::from_millis(20));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        tasks.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_contained() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("fails", async { Err(Error::NoDatabase) });
        tasks.spawn_blocking("also fails", || Err(Error::LockPoisoned));

        assert!(tasks.shutdown().await >= 1);
        assert_eq!(tasks.shutdown().await, 0);
        assert_eq!(tasks.pending(), 0);
    }
}
