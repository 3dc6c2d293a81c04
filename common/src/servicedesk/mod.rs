use async_trait::async_trait;
use thiserror::Error;

mod customer;
mod http;
mod project;
pub use customer::{CustomerEntity, is_customer_updated};
pub use http::JiraServiceDeskClient;
pub use project::{
    CLASSIC_PROJECT_TEMPLATE_KEY, NEXT_GEN_PROJECT_TEMPLATE_KEY, ProjectEntity, ProjectUpdate,
    is_reported_template,
};

/// Failure of a service desk call, classified by how a reconciler should react
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service desk request failed ({status:?}): {message}")]
    Transient { status: Option<u16>, message: String },

    #[error("Unexpected service desk response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Classify a non-success answer of the service desk
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            404 => RemoteError::NotFound(body.to_string()),
            400 | 409 if body.to_lowercase().contains("already exists") => {
                RemoteError::AlreadyExists(body.to_string())
            }
            _ => RemoteError::Transient {
                status: Some(status),
                message: body.to_string(),
            },
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            RemoteError::AlreadyExists(_) => "alreadyexists",
            RemoteError::NotFound(_) => "notfound",
            RemoteError::Transient { .. } => "transient",
            RemoteError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transient {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Typed access to the Jira Service Desk REST API
#[async_trait]
pub trait ServiceDeskClient: Send + Sync {
    /// Fetch a project by its numeric id or by its key
    async fn get_project_by_id(&self, id: &str) -> RemoteResult<ProjectEntity>;
    /// Create a project, returns its id
    async fn create_project(&self, project: &ProjectEntity) -> RemoteResult<String>;
    async fn update_project(&self, update: &ProjectUpdate, id: &str) -> RemoteResult<()>;
    async fn delete_project(&self, id: &str) -> RemoteResult<()>;
    /// Set who may raise requests on the project
    async fn update_project_access_permissions(&self, open_access: bool, key: &str) -> RemoteResult<()>;

    async fn get_customer_by_id(&self, account_id: &str) -> RemoteResult<CustomerEntity>;
    /// Create a customer account, returns its account id
    async fn create_customer(&self, customer: &CustomerEntity) -> RemoteResult<String>;
    /// Invite a customer through the given project, returns its account id
    async fn create_legacy_customer(&self, email: &str, project_key: &str) -> RemoteResult<String>;
    async fn get_customer_id_by_email(&self, email: &str) -> RemoteResult<String>;
    async fn add_customer_to_project(&self, account_id: &str, project_key: &str) -> RemoteResult<()>;
    async fn remove_customer_from_project(&self, account_id: &str, project_key: &str) -> RemoteResult<()>;
    async fn delete_customer(&self, account_id: &str) -> RemoteResult<()>;
}
