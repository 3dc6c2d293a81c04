use crate::{PendingCustomer, ValidationError, conditions::ApplicationCondition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Describe a Jira Service Desk customer and the projects it belongs to
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    kind = "Customer",
    status = "CustomerStatus",
    shortname = "jsdcustomer",
    group = "jiraservicedesk.stakater.com",
    version = "v1alpha1",
    namespaced
)]
#[kube(
    doc = "Custom resource representing a Jira Service Desk customer",
    printcolumn = r#"
    {"name":"email", "type":"string", "description":"Customer email", "jsonPath":".spec.email"},
    {"name":"customer_id", "type":"string", "description":"Remote account id", "jsonPath":".status.customerId"},
    {"name":"status", "type":"string", "description":"Last reconcile outcome", "jsonPath":".status.conditions[0].type"},
    {"name":"message", "type":"string", "description":"Message", "jsonPath":".status.conditions[0].message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSpec {
    /// Name of the customer
    pub name: String,
    /// Email of the customer
    pub email: String,
    /// Create the customer through the invitation flow of its first project
    #[serde(default)]
    pub legacy_customer: bool,
    /// List of ProjectKeys in which customer will be added
    #[serde(default)]
    pub projects: Vec<String>,
}

/// The status object of `Customer`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStatus {
    /// Jira Service Desk Customer Account Id
    #[serde(default)]
    pub customer_id: String,
    /// List of ProjectKeys in which customer has been added
    #[serde(default)]
    pub associated_projects: Vec<String>,
    /// Customer Conditions
    #[serde(default)]
    pub conditions: Vec<ApplicationCondition>,
}

impl CustomerSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        if !self.projects.iter().all(|key| seen.insert(key.as_str())) {
            return Err(ValidationError::DuplicateKeys);
        }
        if self.name.is_empty() {
            return Err(ValidationError::MissingField("Name"));
        }
        if self.email.is_empty() {
            return Err(ValidationError::MissingField("Email"));
        }
        if self.projects.iter().any(String::is_empty) {
            return Err(ValidationError::InvalidValue("Projects", "empty project key".to_string()));
        }
        if self.legacy_customer && self.projects.is_empty() {
            return Err(ValidationError::MissingField("Projects"));
        }
        Ok(())
    }

    /// Check that the identity of the customer did not change.
    ///
    /// `old` may be a placeholder read back from the service desk right after creation,
    /// its name or email is then the configured pending value and is not compared.
    pub fn validate_update(&self, old: &CustomerSpec, pending: &PendingCustomer) -> Result<(), ValidationError> {
        if self.legacy_customer != old.legacy_customer {
            return Err(ValidationError::ImmutableField("LegacyCustomer"));
        }
        if !pending.matches_email(&old.email) && !self.email.eq_ignore_ascii_case(&old.email) {
            return Err(ValidationError::ImmutableField("Email"));
        }
        if !pending.matches_name(&old.name) && self.name != old.name {
            return Err(ValidationError::ImmutableField("Name"));
        }
        Ok(())
    }
}

impl Customer {
    pub fn remote_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.customer_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn associated_projects(&self) -> Vec<String> {
        self.status
            .as_ref()
            .map(|s| s.associated_projects.clone())
            .unwrap_or_default()
    }
}
