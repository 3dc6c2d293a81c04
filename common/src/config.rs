use crate::{Error, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::*;

pub static DEFAULT_CONFIG_SECRET_NAME: &str = "jira-service-desk-config";
pub static API_TOKEN_KEY: &str = "JIRA_SERVICE_DESK_API_TOKEN";
pub static API_BASE_URL_KEY: &str = "JIRA_SERVICE_DESK_API_BASE_URL";
pub static EMAIL_KEY: &str = "JIRA_SERVICE_DESK_EMAIL";
pub static PENDING_CUSTOMER_NAME_KEY: &str = "PENDING_CUSTOMER_NAME";
pub static PENDING_CUSTOMER_EMAIL_KEY: &str = "PENDING_CUSTOMER_EMAIL";
pub static DELETE_CUSTOMER_ACCOUNTS_KEY: &str = "DELETE_CUSTOMER_ACCOUNTS";

/// Placeholder identity the service desk reports for a customer whose creation is not fully visible yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCustomer {
    pub name: String,
    pub email: String,
}

impl Default for PendingCustomer {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            email: String::new(),
        }
    }
}

impl PendingCustomer {
    pub fn matches_name(&self, name: &str) -> bool {
        name == self.name
    }

    pub fn matches_email(&self, email: &str) -> bool {
        email.eq_ignore_ascii_case(&self.email)
    }
}

/// Settings shared by every reconciler, built once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub api_token: String,
    pub api_base_url: String,
    pub email: String,
    pub pending_customer: PendingCustomer,
    /// Delete the remote account once a Customer resource is removed from every project
    pub delete_customer_accounts: bool,
}

impl ControllerConfig {
    /// Build the configuration from decoded secret entries.
    ///
    /// Optional entries are looked up in the secret first, then through `env`.
    pub fn from_secret_data<F>(secret_name: &str, data: &BTreeMap<String, String>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            data.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::MissingConfig(key.to_string(), secret_name.to_string()))
        };
        let optional = |key: &str| data.get(key).cloned().or_else(|| env(key));

        let api_base_url = required(API_BASE_URL_KEY)?.trim_end_matches('/').to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(API_BASE_URL_KEY.to_string(), api_base_url));
        }
        let mut pending_customer = PendingCustomer::default();
        if let Some(name) = optional(PENDING_CUSTOMER_NAME_KEY) {
            pending_customer.name = name;
        }
        if let Some(email) = optional(PENDING_CUSTOMER_EMAIL_KEY) {
            pending_customer.email = email;
        }
        let delete_customer_accounts = match optional(DELETE_CUSTOMER_ACCOUNTS_KEY) {
            None => false,
            Some(v) => v
                .trim()
                .parse::<bool>()
                .map_err(|_| Error::InvalidConfig(DELETE_CUSTOMER_ACCOUNTS_KEY.to_string(), v.clone()))?,
        };
        Ok(Self {
            api_token: required(API_TOKEN_KEY)?,
            api_base_url,
            email: required(EMAIL_KEY)?,
            pending_customer,
            delete_customer_accounts,
        })
    }

    /// Read the configuration secret of the operator
    pub async fn load(client: Client) -> Result<Self> {
        let secret_name =
            std::env::var("CONFIG_SECRET_NAME").unwrap_or_else(|_| DEFAULT_CONFIG_SECRET_NAME.to_string());
        let api: Api<Secret> = match std::env::var("OPERATOR_NAMESPACE") {
            Ok(ns) => Api::namespaced(client, &ns),
            Err(_) => Api::default_namespaced(client),
        };
        debug!("Loading configuration from secret {secret_name}");
        let secret = api.get(&secret_name).await?;
        let mut data = BTreeMap::new();
        for (key, value) in secret.data.unwrap_or_default() {
            data.insert(key, String::from_utf8(value.0)?);
        }
        for (key, value) in secret.string_data.unwrap_or_default() {
            data.insert(key, value);
        }
        Self::from_secret_data(&secret_name, &data, |key| std::env::var(key).ok())
    }
}
