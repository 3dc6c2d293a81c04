use crate::{ValidationError, conditions::ApplicationCondition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub static PROJECT_TYPE_KEYS: [&str; 3] = ["business", "service_desk", "software"];
pub static ASSIGNEE_TYPES: [&str; 2] = ["PROJECT_LEAD", "UNASSIGNED"];
pub const LEAD_ACCOUNT_ID_MAX_LEN: usize = 128;

/// Describe a Jira Service Desk project
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    kind = "Project",
    status = "ProjectStatus",
    shortname = "jsdproject",
    group = "jiraservicedesk.stakater.com",
    version = "v1alpha1",
    namespaced
)]
#[kube(
    doc = "Custom resource representing a Jira Service Desk project",
    printcolumn = r#"
    {"name":"key", "type":"string", "description":"Project key", "jsonPath":".spec.key"},
    {"name":"id", "type":"string", "description":"Remote project id", "jsonPath":".status.id"},
    {"name":"status", "type":"string", "description":"Last reconcile outcome", "jsonPath":".status.conditions[0].type"},
    {"name":"message", "type":"string", "description":"Message", "jsonPath":".status.conditions[0].message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Name of the project
    pub name: String,
    /// The project key is used as the prefix of your project's issue keys
    pub key: String,
    /// The project type, which dictates the application-specific feature set (business, service_desk or software)
    pub project_type_key: String,
    /// A prebuilt configuration for a project
    pub project_template_key: String,
    /// Description for project
    #[serde(default)]
    pub description: String,
    /// Task assignee type (PROJECT_LEAD or UNASSIGNED)
    pub assignee_type: String,
    /// ID of project lead
    pub lead_account_id: String,
    /// A link to information about this project, such as project documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// An integer value for the project's avatar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<i64>,
    /// The ID of the issue security scheme for the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_security_scheme: Option<i64>,
    /// The ID of the permission scheme for the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_scheme: Option<i64>,
    /// The ID of the notification scheme for the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_scheme: Option<i64>,
    /// The ID of the project's category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    /// Let any customer raise requests on this project, defaults to false
    #[serde(default)]
    pub open_access: bool,
}

/// The status object of `Project`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ProjectStatus {
    /// Jira service desk project ID
    #[serde(default)]
    pub id: String,
    /// Project Conditions
    #[serde(default)]
    pub conditions: Vec<ApplicationCondition>,
}

impl ProjectSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingField("Name"));
        }
        if self.key.is_empty() {
            return Err(ValidationError::MissingField("Key"));
        }
        if !PROJECT_TYPE_KEYS.contains(&self.project_type_key.as_str()) {
            return Err(ValidationError::InvalidValue(
                "ProjectTypeKey",
                self.project_type_key.clone(),
            ));
        }
        if !ASSIGNEE_TYPES.contains(&self.assignee_type.as_str()) {
            return Err(ValidationError::InvalidValue(
                "AssigneeType",
                self.assignee_type.clone(),
            ));
        }
        if self.lead_account_id.len() > LEAD_ACCOUNT_ID_MAX_LEN {
            return Err(ValidationError::InvalidValue(
                "LeadAccountId",
                format!("longer than {LEAD_ACCOUNT_ID_MAX_LEN} characters"),
            ));
        }
        Ok(())
    }

    /// Check that none of the create-only fields changed, in declaration order
    pub fn validate_update(&self, old: &ProjectSpec) -> Result<(), ValidationError> {
        let checks: [(&'static str, bool); 7] = [
            ("ProjectTemplateKey", self.project_template_key == old.project_template_key),
            ("ProjectTypeKey", self.project_type_key == old.project_type_key),
            ("LeadAccountId", self.lead_account_id == old.lead_account_id),
            ("CategoryId", self.category_id == old.category_id),
            ("NotificationScheme", self.notification_scheme == old.notification_scheme),
            ("PermissionScheme", self.permission_scheme == old.permission_scheme),
            ("IssueSecurityScheme", self.issue_security_scheme == old.issue_security_scheme),
        ];
        match checks.into_iter().find(|(_, same)| !same) {
            Some((field, _)) => Err(ValidationError::ImmutableField(field)),
            None => Ok(()),
        }
    }
}

impl Project {
    pub fn remote_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.id.as_str())
            .filter(|id| !id.is_empty())
    }
}
