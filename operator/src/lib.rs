use common::{ValidationError, servicedesk::RemoteError};
use kube::runtime::controller::Action;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("SerializationError: {0}")]
    SerializationError(#[source] serde_json::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Conflict while writing {0}, the object changed")]
    StoreConflict(String),

    #[error("{0}")]
    Common(#[from] common::Error),

    #[error("Startup failed: {0}")]
    Startup(String),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    #[must_use]
    pub fn metric_label(&self) -> String {
        match self {
            Error::Validation(_) => "validation".to_string(),
            Error::Remote(e) => format!("remote_{}", e.metric_label()),
            Error::SerializationError(_) => "serializationerror".to_string(),
            Error::KubeError(_) => "kubeerror".to_string(),
            Error::StoreConflict(_) => "storeconflict".to_string(),
            Error::Common(e) => e.metric_label(),
            Error::Startup(_) => "startup".to_string(),
        }
    }

    /// Errors the user has to fix in the resource, retrying will not help
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Result of one reconciliation pass, as handed back to the controller runtime
#[derive(Debug)]
pub enum Outcome {
    /// Done, wait for the next change of the object
    NoRequeue,
    /// Done, look again after the given delay
    RequeueAfter(Duration),
    /// Failed, the runtime error policy decides when to retry
    RequeueWithError(Error),
}

impl Outcome {
    pub fn into_action(self) -> Result<Action> {
        match self {
            Outcome::NoRequeue => Ok(Action::await_change()),
            Outcome::RequeueAfter(d) => Ok(Action::requeue(d)),
            Outcome::RequeueWithError(e) => Err(e),
        }
    }
}

/// Resource access used by the reconcilers
pub mod store;
/// Finalizer bookkeeping
pub mod finalizer;

pub mod customer;
pub mod project;
/// Admission webhook endpoints
pub mod admission;

/// State machinery for kube, as exposeable to actix
pub mod manager;
pub use manager::Manager;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::{Metrics, ReconcileMetrics};

pub use common::{Customer, Project};

#[cfg(test)]
pub(crate) mod testing;
