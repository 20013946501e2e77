//! Supervisor configuration
//!
//! Controls the worker pool the supervisor builds for background catalog
//! calls and how long any single remote call may take.

use std::time::Duration;

use crate::error::EndpointError;

/// Configuration for a [`Supervisor`](crate::Supervisor)
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker threads in the pool built when no runtime handle is supplied
    /// Default: 4
    pub worker_threads: usize,

    /// OS thread name for pool workers
    /// Default: "media-endpoint-worker"
    pub worker_thread_name: String,

    /// Upper bound on any single catalog call; a call that overruns
    /// completes as canceled. `None` waits indefinitely.
    /// Default: 30 seconds
    pub call_timeout: Option<Duration>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            worker_thread_name: "media-endpoint-worker".to_string(),
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SupervisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No time limit on catalog calls
    pub fn unbounded() -> Self {
        Self {
            call_timeout: None,
            ..Default::default()
        }
    }

    /// Short call timeout for interactive front ends
    pub fn responsive() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.worker_threads == 0 {
            return Err(EndpointError::Configuration(
                "Worker thread count must be greater than 0".to_string(),
            ));
        }

        if self.call_timeout == Some(Duration::ZERO) {
            return Err(EndpointError::Configuration(
                "Call timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}
