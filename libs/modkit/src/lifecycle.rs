//! Background service lifecycle: start a [`Runnable`], wait until it reports
//! ready, stop it with a bounded grace period.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::contracts::StatefulModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl Status {
    const fn from_u8(x: u8) -> Self {
        match x {
            1 => Status::Starting,
            2 => Status::Running,
            3 => Status::Stopping,
            _ => Status::Stopped,
        }
    }
}

/// Handed to a running service; consuming it marks the service ready.
/// Dropping it unsent means the service gave up before accepting work.
pub struct ReadySignal(oneshot::Sender<()>);

impl ReadySignal {
    pub fn notify(self) {
        let _ = self.0.send(());
    }
}

/// A long-running service body, e.g. an HTTP server accept loop.
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Must call `ready.notify()` once it accepts work and return when `cancel` fires.
    async fn run(self: Arc<Self>, cancel: CancellationToken, ready: ReadySignal)
        -> anyhow::Result<()>;
}

struct Task {
    cancel: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

/// Adapts any [`Runnable`] into a [`StatefulModule`].
///
/// `start` returns once the runnable reports ready, and fails if it exits or
/// stays silent past the ready timeout. `stop` cancels it and aborts the task
/// when it overruns the stop timeout.
pub struct WithLifecycle<T: Runnable> {
    inner: Arc<T>,
    status: Arc<AtomicU8>,
    task: Mutex<Option<Task>>,
    stop_timeout: Duration,
    ready_timeout: Duration,
}

impl<T: Runnable> WithLifecycle<T> {
    pub fn new(inner: T) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<T>) -> Self {
        Self {
            inner,
            status: Arc::new(AtomicU8::new(Status::Stopped as u8)),
            task: Mutex::new(None),
            stop_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_stop_timeout(mut self, d: Duration) -> Self {
        self.stop_timeout = d;
        self
    }

    pub fn with_ready_timeout(mut self, d: Duration) -> Self {
        self.ready_timeout = d;
        self
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn set_status(&self, s: Status) {
        self.status.store(s as u8, Ordering::Release);
    }

    /// Cancel the task and wait for it, aborting after `grace`.
    async fn shutdown(&self, grace: Duration) {
        let Some(Task { cancel, mut handle }) = self.task.lock().take() else {
            self.set_status(Status::Stopped);
            return;
        };
        self.set_status(Status::Stopping);
        cancel.cancel();

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "service stopped with an error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "service task panicked"),
            Err(_) => {
                tracing::warn!(?grace, "service did not stop in time; aborting");
                handle.abort();
            }
        }
        self.set_status(Status::Stopped);
    }
}

#[async_trait]
impl<T: Runnable> StatefulModule for WithLifecycle<T> {
    async fn start(&self, external_cancel: CancellationToken) -> anyhow::Result<()> {
        if self
            .status
            .compare_exchange(
                Status::Stopped as u8,
                Status::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            anyhow::bail!("service already started");
        }

        let cancel = external_cancel.child_token();
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = {
            let inner = self.inner.clone();
            let cancel = cancel.clone();
            let status = self.status.clone();
            tokio::spawn(async move {
                let result = inner.run(cancel, ReadySignal(ready_tx)).await;
                if let Err(e) = &result {
                    tracing::error!(error = %e, "service exited with an error");
                }
                status.store(Status::Stopped as u8, Ordering::Release);
                result
            })
        };

        match tokio::time::timeout(self.ready_timeout, ready_rx).await {
            Ok(Ok(())) => {
                // The task may already have finished between notify and here
                let _ = self.status.compare_exchange(
                    Status::Starting as u8,
                    Status::Running as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                *self.task.lock() = Some(Task { cancel, handle });
                tracing::debug!("service ready");
                Ok(())
            }
            Ok(Err(_)) => {
                self.set_status(Status::Stopped);
                let cause = match handle.await {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => anyhow::anyhow!("run returned without signalling ready"),
                    Err(e) => anyhow::Error::new(e),
                };
                Err(cause.context("service exited before becoming ready"))
            }
            Err(_) => {
                *self.task.lock() = Some(Task { cancel, handle });
                self.shutdown(Duration::ZERO).await;
                anyhow::bail!("service did not become ready within {:?}", self.ready_timeout)
            }
        }
    }

    async fn stop(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        self.shutdown(self.stop_timeout).await;
        Ok(())
    }
}

impl<T: Runnable> Drop for WithLifecycle<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}
