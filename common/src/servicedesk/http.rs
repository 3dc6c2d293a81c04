use super::{
    CustomerEntity, ProjectEntity, ProjectUpdate, RemoteError, RemoteResult, ServiceDeskClient,
    project::ProjectGetResponse,
};
use crate::{ControllerConfig, Result, get_client_name};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::*;

const PROJECT_PATH: &str = "rest/api/3/project";
const USER_PATH: &str = "rest/api/3/user";
const USER_SEARCH_PATH: &str = "rest/api/3/user/search";
const CUSTOMER_PATH: &str = "rest/servicedeskapi/customer";
const SERVICEDESK_PATH: &str = "rest/servicedeskapi/servicedesk";
const LEGACY_CUSTOMER_PATH: &str = "rest/servicedesk/1/pages/people/customers/pagination";
const PROJECT_PERMISSIONS_PATH: &str = "rest/servicedesk/1/servicedesk";

#[derive(Deserialize)]
struct ProjectCreateResponse {
    id: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerCreateResponse {
    account_id: String,
}

#[derive(Deserialize, Default)]
struct LegacyCustomerCreateResponse {
    #[serde(default)]
    success: Vec<CustomerCreateResponse>,
}

/// Jira Service Desk client over HTTP
#[derive(Clone, Debug)]
pub struct JiraServiceDeskClient {
    baseurl: String,
    headers: Vec<(String, String)>,
    client: Client,
}

impl JiraServiceDeskClient {
    pub fn new(base: &str) -> Result<Self> {
        let five_min = std::time::Duration::from_secs(60 * 5);
        let client = Client::builder()
            .user_agent(get_client_name())
            .timeout(five_min)
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            baseurl: base.trim_end_matches('/').to_string(),
            headers: Vec::new(),
            client,
        })
    }

    pub fn from_config(conf: &ControllerConfig) -> Result<Self> {
        let mut client = Self::new(&conf.api_base_url)?;
        client.add_header_json();
        client.add_header_basic(&conf.email, &conf.api_token);
        Ok(client)
    }

    pub fn add_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn add_header_json(&mut self) {
        self.add_header("Content-Type", "application/json")
            .add_header("Accept", "application/json");
    }

    pub fn add_header_basic(&mut self, username: &str, password: &str) {
        let hash = STANDARD.encode(format!("{username}:{password}"));
        self.add_header("Authorization", format!("Basic {hash}").as_str());
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{method} '{}/{}'", self.baseurl, path);
        let mut req = self.client.request(method, format!("{}/{}", self.baseurl, path));
        for (key, val) in &self.headers {
            req = req.header(key, val);
        }
        req
    }

    async fn body_send(&self, req: RequestBuilder) -> RemoteResult<String> {
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            debug!("service desk answered {status}: {text}");
            return Err(RemoteError::from_status(status.as_u16(), &text));
        }
        Ok(text)
    }

    async fn json_send<T: DeserializeOwned>(&self, req: RequestBuilder) -> RemoteResult<T> {
        let text = self.body_send(req).await?;
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ServiceDeskClient for JiraServiceDeskClient {
    async fn get_project_by_id(&self, id: &str) -> RemoteResult<ProjectEntity> {
        let req = self.request(Method::GET, &format!("{PROJECT_PATH}/{id}"));
        let project: ProjectGetResponse = self.json_send(req).await?;
        Ok(project.into())
    }

    async fn create_project(&self, project: &ProjectEntity) -> RemoteResult<String> {
        let req = self.request(Method::POST, PROJECT_PATH).json(project);
        let created: ProjectCreateResponse = self.json_send(req).await?;
        match created.id {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) if !s.is_empty() => Ok(s),
            other => Err(RemoteError::Decode(format!("unexpected project id {other}"))),
        }
    }

    async fn update_project(&self, update: &ProjectUpdate, id: &str) -> RemoteResult<()> {
        let req = self.request(Method::PUT, &format!("{PROJECT_PATH}/{id}")).json(update);
        self.body_send(req).await.map(|_| ())
    }

    async fn delete_project(&self, id: &str) -> RemoteResult<()> {
        let req = self.request(Method::DELETE, &format!("{PROJECT_PATH}/{id}"));
        self.body_send(req).await.map(|_| ())
    }

    async fn update_project_access_permissions(&self, open_access: bool, key: &str) -> RemoteResult<()> {
        let req = self
            .request(
                Method::POST,
                &format!("{PROJECT_PERMISSIONS_PATH}/{key}/settings/requestsecurity"),
            )
            .json(&json!({
                "autocompleteEnabled": false,
                "manageEnabled": false,
                "serviceDeskOpenAccess": open_access,
                "serviceDeskPublicSignup": open_access,
            }));
        self.body_send(req).await.map(|_| ())
    }

    async fn get_customer_by_id(&self, account_id: &str) -> RemoteResult<CustomerEntity> {
        let req = self
            .request(Method::GET, USER_PATH)
            .query(&[("accountId", account_id)]);
        self.json_send(req).await
    }

    async fn create_customer(&self, customer: &CustomerEntity) -> RemoteResult<String> {
        let req = self.request(Method::POST, CUSTOMER_PATH).json(customer);
        let created: CustomerCreateResponse = self.json_send(req).await?;
        Ok(created.account_id)
    }

    async fn create_legacy_customer(&self, email: &str, project_key: &str) -> RemoteResult<String> {
        let req = self
            .request(Method::POST, &format!("{LEGACY_CUSTOMER_PATH}/{project_key}/invite"))
            .json(&json!({ "emails": [email] }));
        let created: LegacyCustomerCreateResponse = self.json_send(req).await?;
        created
            .success
            .into_iter()
            .next()
            .map(|c| c.account_id)
            .ok_or_else(|| RemoteError::Decode(format!("invitation of {email} returned no account")))
    }

    async fn get_customer_id_by_email(&self, email: &str) -> RemoteResult<String> {
        let req = self
            .request(Method::GET, USER_SEARCH_PATH)
            .query(&[("query", email)]);
        let found: Vec<CustomerEntity> = self.json_send(req).await?;
        found
            .into_iter()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .map(|c| c.account_id)
            .ok_or_else(|| RemoteError::NotFound(format!("no customer with email {email}")))
    }

    async fn add_customer_to_project(&self, account_id: &str, project_key: &str) -> RemoteResult<()> {
        let req = self
            .request(Method::POST, &format!("{SERVICEDESK_PATH}/{project_key}/customer"))
            .json(&json!({ "accountIds": [account_id] }));
        self.body_send(req).await.map(|_| ())
    }

    async fn remove_customer_from_project(&self, account_id: &str, project_key: &str) -> RemoteResult<()> {
        let req = self
            .request(Method::DELETE, &format!("{SERVICEDESK_PATH}/{project_key}/customer"))
            .header("X-ExperimentalApi", "opt-in")
            .json(&json!({ "accountIds": [account_id] }));
        self.body_send(req).await.map(|_| ())
    }

    async fn delete_customer(&self, account_id: &str) -> RemoteResult<()> {
        let req = self
            .request(Method::DELETE, USER_PATH)
            .query(&[("accountId", account_id)]);
        self.body_send(req).await.map(|_| ())
    }
}
