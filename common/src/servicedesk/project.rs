use crate::{Project, ProjectSpec};
use serde::{Deserialize, Serialize};

pub static CLASSIC_PROJECT_TEMPLATE_KEY: &str = "com.atlassian.servicedesk:itil-v2-service-desk-project";
pub static NEXT_GEN_PROJECT_TEMPLATE_KEY: &str = "com.atlassian.servicedesk:next-gen-it-service-desk";

/// Whether the read API can report `key` back, it only knows the project style
pub fn is_reported_template(key: &str) -> bool {
    key == CLASSIC_PROJECT_TEMPLATE_KEY || key == NEXT_GEN_PROJECT_TEMPLATE_KEY
}

/// A project as known by the service desk
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntity {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub key: String,
    pub project_type_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_template_key: String,
    #[serde(default)]
    pub description: String,
    pub assignee_type: String,
    pub lead_account_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_security_scheme: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_scheme: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_scheme: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
}

impl ProjectEntity {
    pub fn from_resource(project: &Project) -> Self {
        let spec = &project.spec;
        Self {
            id: project.remote_id().unwrap_or_default().to_string(),
            name: spec.name.clone(),
            key: spec.key.clone(),
            project_type_key: spec.project_type_key.clone(),
            project_template_key: spec.project_template_key.clone(),
            description: spec.description.clone(),
            assignee_type: spec.assignee_type.clone(),
            lead_account_id: spec.lead_account_id.clone(),
            url: spec.url.clone(),
            avatar_id: spec.avatar_id,
            issue_security_scheme: spec.issue_security_scheme,
            permission_scheme: spec.permission_scheme,
            notification_scheme: spec.notification_scheme,
            category_id: spec.category_id,
        }
    }

    /// Map the entity back to a spec.
    ///
    /// Fields the read API never returns are taken from `current` so that only reported
    /// values take part in the immutability check. The template read back from the style is
    /// only trusted when `current` uses one of the two reported keys.
    pub fn to_resource_spec(&self, current: &ProjectSpec) -> ProjectSpec {
        let template = if self.project_template_key.is_empty()
            || !is_reported_template(&current.project_template_key)
        {
            current.project_template_key.clone()
        } else {
            self.project_template_key.clone()
        };
        ProjectSpec {
            name: self.name.clone(),
            key: self.key.clone(),
            project_type_key: self.project_type_key.clone(),
            project_template_key: template,
            description: self.description.clone(),
            assignee_type: self.assignee_type.clone(),
            lead_account_id: self.lead_account_id.clone(),
            url: self.url.clone(),
            avatar_id: self.avatar_id.or(current.avatar_id),
            issue_security_scheme: self.issue_security_scheme.or(current.issue_security_scheme),
            permission_scheme: self.permission_scheme.or(current.permission_scheme),
            notification_scheme: self.notification_scheme.or(current.notification_scheme),
            category_id: self.category_id.or(current.category_id),
            open_access: current.open_access,
        }
    }

    /// Drift check between a desired and a remote project.
    ///
    /// Avatar, scheme and category ids are create-only and never read back, they are not compared.
    /// The template key is only compared when both sides use a key the read API reports.
    pub fn equal(&self, other: &ProjectEntity) -> bool {
        let template_known = is_reported_template(&self.project_template_key)
            && is_reported_template(&other.project_template_key);
        self.id == other.id
            && self.name == other.name
            && self.key == other.key
            && self.project_type_key == other.project_type_key
            && (!template_known || self.project_template_key == other.project_template_key)
            && self.description == other.description
            && self.assignee_type == other.assignee_type
            && self.lead_account_id == other.lead_account_id
            && self.url == other.url
    }
}

/// Fields sent on a project update, only the changed ones are set
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProjectUpdate {
    /// Changed fields of `desired` against `remote`.
    ///
    /// The read API never returns the avatar id, so a desired avatar is sent again with every
    /// drift update. It never causes an update by itself since `ProjectEntity::equal` skips it.
    pub fn diff(remote: &ProjectEntity, desired: &ProjectSpec) -> Self {
        fn changed(remote: &str, desired: &str) -> Option<String> {
            (remote != desired).then(|| desired.to_string())
        }
        Self {
            name: changed(&remote.name, &desired.name),
            key: changed(&remote.key, &desired.key),
            avatar_id: desired.avatar_id.filter(|id| remote.avatar_id != Some(*id)),
            description: changed(&remote.description, &desired.description),
            assignee_type: changed(&remote.assignee_type, &desired.assignee_type),
            url: changed(&remote.url, &desired.url),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ProjectUpdate::default()
    }
}

/// Read shape of `GET /rest/api/3/project/{id}`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectGetResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub lead: ProjectLead,
    #[serde(default)]
    pub project_type_key: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub assignee_type: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectLead {
    #[serde(default)]
    pub account_id: String,
}

impl From<ProjectGetResponse> for ProjectEntity {
    fn from(r: ProjectGetResponse) -> Self {
        let project_template_key = match r.style.as_str() {
            "classic" => CLASSIC_PROJECT_TEMPLATE_KEY.to_string(),
            "next-gen" => NEXT_GEN_PROJECT_TEMPLATE_KEY.to_string(),
            _ => String::new(),
        };
        Self {
            id: r.id,
            name: r.name,
            key: r.key,
            project_type_key: r.project_type_key,
            project_template_key,
            description: r.description,
            assignee_type: r.assignee_type,
            lead_account_id: r.lead.account_id,
            url: r.url,
            ..Default::default()
        }
    }
}
