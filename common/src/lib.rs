use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SerializationError: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("K8s error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Missing configuration key {0} in secret {1}")]
    MissingConfig(String, String),

    #[error("Invalid configuration value for {0}: {1}")]
    InvalidConfig(String, String),

    #[error("UTF8 error {0}")]
    UTF8(#[from] std::string::FromUtf8Error),
}
impl Error {
    pub fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejections of a resource spec, never retried
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid CRUD operation. Duplicate Project Keys are found.")]
    DuplicateKeys,

    #[error("{0} is an immutable field, can't be changed while updating")]
    ImmutableField(&'static str),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

pub mod admission;
pub mod conditions;
pub mod config;
pub mod context;
pub mod customer;
pub mod membership;
pub mod project;
pub mod servicedesk;
pub use admission::Validate;
pub use config::{ControllerConfig, PendingCustomer};
pub use context::get_client_name;
pub use customer::{Customer, CustomerSpec, CustomerStatus};
pub use project::{Project, ProjectSpec, ProjectStatus};
