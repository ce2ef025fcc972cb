//! Concurrent teardown of owned resources.
//!
//! [`ShutdownCoordinator`] closes every registered resource on its own task,
//! waits for all of them, and reports every failure rather than the first.

use std::fmt;

use async_trait::async_trait;
use tokio::task::JoinSet;

/// Boxed error returned by a resource's close operation.
pub type CloseError = Box<dyn std::error::Error + Send + Sync>;

/// A resource that must be released during process shutdown.
#[async_trait]
pub trait Closeable: Send + Sync {
    /// Human-readable name used in shutdown error reports.
    fn name(&self) -> &str;

    /// Release the resource.
    async fn close(&self) -> Result<(), CloseError>;
}

/// One resource that failed to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    /// Name of the resource, from [`Closeable::name`].
    pub resource: String,
    /// Error message reported by the close operation.
    pub message: String,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}

/// Aggregate of every close failure, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownError {
    failures: Vec<CloseFailure>,
}

impl ShutdownError {
    /// The individual failures, in the order their tasks finished.
    #[must_use]
    pub fn failures(&self) -> &[CloseFailure] {
        &self.failures
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("\n"))
    }
}

impl std::error::Error for ShutdownError {}

#[async_trait]
impl<T: Closeable + ?Sized> Closeable for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn close(&self) -> Result<(), CloseError> {
        (**self).close().await
    }
}

/// Closes a set of resources concurrently and collects every failure.
///
/// `close_all` consumes the coordinator, so a given set of resources is
/// closed at most once.
#[derive(Default)]
pub struct ShutdownCoordinator {
    resources: Vec<Box<dyn Closeable>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no resources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource to be closed.
    pub fn register(&mut self, resource: Box<dyn Closeable>) {
        self.resources.push(resource);
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Close every registered resource concurrently.
    ///
    /// Every resource gets its close call regardless of the others' outcome.
    /// A close task that panics is reported as a failure of that resource.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] listing every resource that failed to close.
    pub async fn close_all(self) -> Result<(), ShutdownError> {
        if self.resources.is_empty() {
            return Ok(());
        }

        let mut tasks = JoinSet::new();

        for resource in self.resources {
            let name = resource.name().to_owned();
            tasks.spawn(async move {
                // The inner task isolates a panicking close so it is still
                // attributed to its resource.
                let closing =
                    tokio::spawn(async move { resource.close().await.map_err(|e| e.to_string()) });
                let result = match closing.await {
                    Ok(result) => result,
                    Err(join_err) => Err(format!("close task failed: {join_err}")),
                };
                (name, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    tracing::debug!(resource = %name, "Resource closed");
                }
                Ok((name, Err(message))) => {
                    tracing::warn!(resource = %name, error = %message, "Resource failed to close");
                    failures.push(CloseFailure {
                        resource: name,
                        message,
                    });
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Shutdown task aborted");
                    failures.push(CloseFailure {
                        resource: "unknown".to_owned(),
                        message: join_err.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError { failures })
        }
    }
}
