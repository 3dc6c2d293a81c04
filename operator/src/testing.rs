use crate::{
    Error, Result,
    store::{ResourceStore, StoredResource},
};
use async_trait::async_trait;
use common::{
    Customer, CustomerSpec, Project, ProjectSpec,
    servicedesk::{CustomerEntity, ProjectEntity, ProjectUpdate, RemoteError, RemoteResult, ServiceDeskClient},
};
use kube::{ResourceExt, runtime::reflector::ObjectRef};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

pub fn sample_project() -> Project {
    let mut p = Project::new("support", ProjectSpec {
        name: "Support".to_string(),
        key: "SUP".to_string(),
        project_type_key: "service_desk".to_string(),
        project_template_key: "com.atlassian.servicedesk:itil-v2-service-desk-project".to_string(),
        description: "Support desk".to_string(),
        assignee_type: "PROJECT_LEAD".to_string(),
        lead_account_id: "lead-1".to_string(),
        url: String::new(),
        avatar_id: None,
        issue_security_scheme: None,
        permission_scheme: Some(10011),
        notification_scheme: None,
        category_id: None,
        open_access: false,
    });
    p.metadata.namespace = Some("default".to_string());
    p.metadata.resource_version = Some("1".to_string());
    p.metadata.generation = Some(1);
    p
}

pub fn sample_customer(projects: &[&str]) -> Customer {
    let mut c = Customer::new("cust1", CustomerSpec {
        name: "cust1".to_string(),
        email: "a@b.com".to_string(),
        legacy_customer: false,
        projects: projects.iter().map(|s| s.to_string()).collect(),
    });
    c.metadata.namespace = Some("default".to_string());
    c.metadata.resource_version = Some("1".to_string());
    c.metadata.generation = Some(1);
    c
}

/// In-memory ResourceStore enforcing resourceVersion checks like the API server
pub struct FakeStore<K> {
    objects: Mutex<BTreeMap<(Option<String>, String), K>>,
    updates: AtomicUsize,
    status_updates: AtomicUsize,
    conflicts: AtomicUsize,
    version: AtomicUsize,
}

impl<K: StoredResource> FakeStore<K> {
    pub fn with(obj: K) -> Self {
        let store = Self {
            objects: Mutex::new(BTreeMap::new()),
            updates: AtomicUsize::new(0),
            status_updates: AtomicUsize::new(0),
            conflicts: AtomicUsize::new(0),
            version: AtomicUsize::new(1),
        };
        store
            .objects
            .lock()
            .unwrap()
            .insert((obj.namespace(), obj.name_any()), obj);
        store
    }

    /// Replace the stored object as a user edit would, bumping its version
    pub fn put(&self, mut obj: K) -> K {
        let v = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        obj.meta_mut().resource_version = Some(v.to_string());
        self.objects
            .lock()
            .unwrap()
            .insert((obj.namespace(), obj.name_any()), obj.clone());
        obj
    }

    pub fn current(&self, obj: &K) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(obj.namespace(), obj.name_any()))
            .cloned()
    }

    pub fn reference(&self, obj: &K) -> ObjectRef<K> {
        ObjectRef::from_obj(obj)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    /// Make the next `n` status writes fail with a conflict
    pub fn conflict_next_status_writes(&self, n: usize) {
        self.conflicts.store(n, Ordering::SeqCst);
    }

    fn write(&self, obj: &K, apply: impl Fn(&K, &mut K)) -> Result<K> {
        let mut objects = self.objects.lock().unwrap();
        let key = (obj.namespace(), obj.name_any());
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| Error::StoreConflict(obj.name_any()))?;
        if stored.resource_version() != obj.resource_version() {
            return Err(Error::StoreConflict(obj.name_any()));
        }
        apply(obj, stored);
        let v = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        stored.meta_mut().resource_version = Some(v.to_string());
        let result = stored.clone();
        if result.meta().deletion_timestamp.is_some() && result.finalizers().is_empty() {
            objects.remove(&key);
        }
        Ok(result)
    }
}

#[async_trait]
impl<K: StoredResource> ResourceStore<K> for FakeStore<K> {
    async fn get(&self, obj: &ObjectRef<K>) -> Result<Option<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(obj.namespace.clone(), obj.name.clone()))
            .cloned())
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|o| namespace.is_none() || o.namespace().as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn update(&self, obj: &K) -> Result<K> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.write(obj, |src, dst| {
            *dst.finalizers_mut() = src.finalizers().to_vec();
        })
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        if self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            let v = self.version.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(stored) = self
                .objects
                .lock()
                .unwrap()
                .get_mut(&(obj.namespace(), obj.name_any()))
            {
                stored.meta_mut().resource_version = Some(v.to_string());
            }
            return Err(Error::StoreConflict(obj.name_any()));
        }
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        self.write(obj, |src, dst| {
            let status = serde_json::to_value(src).unwrap()["status"].clone();
            let mut value = serde_json::to_value(&*dst).unwrap();
            value["status"] = status;
            *dst = serde_json::from_value(value).unwrap();
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetProject(String),
    CreateProject(String),
    UpdateProject(String, ProjectUpdate),
    DeleteProject(String),
    AccessPermissions(bool, String),
    GetCustomer(String),
    CreateCustomer(String),
    CreateLegacyCustomer(String, String),
    CustomerIdByEmail(String),
    AddToProject(String, String),
    RemoveFromProject(String, String),
    DeleteCustomer(String),
}

impl Call {
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Call::GetProject(_) | Call::GetCustomer(_) | Call::CustomerIdByEmail(_)
        )
    }
}

type Matcher = Box<dyn Fn(&Call) -> bool + Send + Sync>;

/// In-memory service desk recording every call
#[derive(Default)]
pub struct FakeServiceDesk {
    calls: Mutex<Vec<Call>>,
    pub projects: Mutex<BTreeMap<String, ProjectEntity>>,
    pub customers: Mutex<BTreeMap<String, CustomerEntity>>,
    pub memberships: Mutex<BTreeSet<(String, String)>>,
    failures: Mutex<Vec<(Matcher, RemoteError)>>,
    next_id: AtomicUsize,
}

impl FakeServiceDesk {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Fail the first call matching `matcher` with `err`
    pub fn fail_once(&self, matcher: impl Fn(&Call) -> bool + Send + Sync + 'static, err: RemoteError) {
        self.failures.lock().unwrap().push((Box::new(matcher), err));
    }

    pub fn insert_project(&self, mut project: ProjectEntity) -> String {
        if project.id.is_empty() {
            project.id = self.new_id(10000);
        }
        let id = project.id.clone();
        project.avatar_id = None;
        project.issue_security_scheme = None;
        project.permission_scheme = None;
        project.notification_scheme = None;
        project.category_id = None;
        self.projects.lock().unwrap().insert(id.clone(), project);
        id
    }

    pub fn insert_customer(&self, mut customer: CustomerEntity) -> String {
        if customer.account_id.is_empty() {
            customer.account_id = format!("qm:{}", self.new_id(0));
        }
        let id = customer.account_id.clone();
        self.customers.lock().unwrap().insert(id.clone(), customer);
        id
    }

    pub fn members_of(&self, account_id: &str) -> Vec<String> {
        self.memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == account_id)
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn new_id(&self, base: usize) -> String {
        (base + self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn record(&self, call: Call) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(call.clone());
        let mut failures = self.failures.lock().unwrap();
        if let Some(pos) = failures.iter().position(|(m, _)| m(&call)) {
            let (_, err) = failures.remove(pos);
            return Err(err);
        }
        Ok(())
    }

    fn find_project(&self, id_or_key: &str) -> Option<ProjectEntity> {
        self.projects
            .lock()
            .unwrap()
            .values()
            .find(|p| p.id == id_or_key || p.key == id_or_key)
            .cloned()
    }
}

#[async_trait]
impl ServiceDeskClient for FakeServiceDesk {
    async fn get_project_by_id(&self, id: &str) -> RemoteResult<ProjectEntity> {
        self.record(Call::GetProject(id.to_string()))?;
        self.find_project(id)
            .ok_or_else(|| RemoteError::NotFound(format!("project {id}")))
    }

    async fn create_project(&self, project: &ProjectEntity) -> RemoteResult<String> {
        self.record(Call::CreateProject(project.key.clone()))?;
        if self.find_project(&project.key).is_some() {
            return Err(RemoteError::AlreadyExists(
                "A project with that name already exists.".to_string(),
            ));
        }
        let mut created = project.clone();
        created.id = String::new();
        Ok(self.insert_project(created))
    }

    async fn update_project(&self, update: &ProjectUpdate, id: &str) -> RemoteResult<()> {
        self.record(Call::UpdateProject(id.to_string(), update.clone()))?;
        let mut projects = self.projects.lock().unwrap();
        let p = projects
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(format!("project {id}")))?;
        if let Some(v) = &update.name {
            p.name = v.clone();
        }
        if let Some(v) = &update.key {
            p.key = v.clone();
        }
        if let Some(v) = &update.description {
            p.description = v.clone();
        }
        if let Some(v) = &update.assignee_type {
            p.assignee_type = v.clone();
        }
        if let Some(v) = &update.url {
            p.url = v.clone();
        }
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> RemoteResult<()> {
        self.record(Call::DeleteProject(id.to_string()))?;
        self.projects
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("project {id}")))
    }

    async fn update_project_access_permissions(&self, open_access: bool, key: &str) -> RemoteResult<()> {
        self.record(Call::AccessPermissions(open_access, key.to_string()))
    }

    async fn get_customer_by_id(&self, account_id: &str) -> RemoteResult<CustomerEntity> {
        self.record(Call::GetCustomer(account_id.to_string()))?;
        self.customers
            .lock()
            .unwrap()
            .get(account_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("customer {account_id}")))
    }

    async fn create_customer(&self, customer: &CustomerEntity) -> RemoteResult<String> {
        self.record(Call::CreateCustomer(customer.email.clone()))?;
        if self.customer_by_email(&customer.email).is_some() {
            return Err(RemoteError::AlreadyExists(
                "An account already exists for this email".to_string(),
            ));
        }
        let mut created = customer.clone();
        created.account_id = String::new();
        Ok(self.insert_customer(created))
    }

    async fn create_legacy_customer(&self, email: &str, project_key: &str) -> RemoteResult<String> {
        self.record(Call::CreateLegacyCustomer(email.to_string(), project_key.to_string()))?;
        if self.customer_by_email(email).is_some() {
            return Err(RemoteError::AlreadyExists(
                "An account already exists for this email".to_string(),
            ));
        }
        let id = self.insert_customer(CustomerEntity {
            account_id: String::new(),
            display_name: email.to_string(),
            email: email.to_string(),
        });
        self.memberships
            .lock()
            .unwrap()
            .insert((id.clone(), project_key.to_string()));
        Ok(id)
    }

    async fn get_customer_id_by_email(&self, email: &str) -> RemoteResult<String> {
        self.record(Call::CustomerIdByEmail(email.to_string()))?;
        self.customer_by_email(email)
            .ok_or_else(|| RemoteError::NotFound(format!("customer {email}")))
    }

    async fn add_customer_to_project(&self, account_id: &str, project_key: &str) -> RemoteResult<()> {
        self.record(Call::AddToProject(account_id.to_string(), project_key.to_string()))?;
        self.memberships
            .lock()
            .unwrap()
            .insert((account_id.to_string(), project_key.to_string()));
        Ok(())
    }

    async fn remove_customer_from_project(&self, account_id: &str, project_key: &str) -> RemoteResult<()> {
        self.record(Call::RemoveFromProject(account_id.to_string(), project_key.to_string()))?;
        self.memberships
            .lock()
            .unwrap()
            .remove(&(account_id.to_string(), project_key.to_string()));
        Ok(())
    }

    async fn delete_customer(&self, account_id: &str) -> RemoteResult<()> {
        self.record(Call::DeleteCustomer(account_id.to_string()))?;
        self.customers
            .lock()
            .unwrap()
            .remove(account_id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("customer {account_id}")))
    }
}

impl FakeServiceDesk {
    fn customer_by_email(&self, email: &str) -> Option<String> {
        self.customers
            .lock()
            .unwrap()
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .map(|c| c.account_id.clone())
    }
}
