use crate::{
    Metrics, Result, customer,
    customer::CustomerReconciler,
    project,
    project::ProjectReconciler,
    store::{KubeStore, ResourceStore, StoredResource},
};
use chrono::{DateTime, Utc};
use common::{ControllerConfig, Customer, Project, context::get_reporter, servicedesk::JiraServiceDeskClient};
use futures::{FutureExt, StreamExt, future::BoxFuture};
use kube::{
    Resource,
    api::Api,
    client::Client,
    runtime::{controller::Controller, events::Reporter, watcher::Config},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::*;

// Context for our reconcilers
#[derive(Clone)]
pub struct Context {
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
    pub projects: Arc<ProjectReconciler>,
    pub customers: Arc<CustomerReconciler>,
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: get_reporter(),
        }
    }
}

/// Data owned by the Manager
#[derive(Clone, Default)]
pub struct Manager {
    /// Diagnostics populated by the reconcilers
    diagnostics: Arc<RwLock<Diagnostics>>,
    metrics: Metrics,
}

fn watched_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Fails when the CRD of `K` is not served, returns how many objects are already declared
async fn ensure_crd<K: StoredResource>(store: &dyn ResourceStore<K>, namespace: Option<&str>) -> Result<usize> {
    let kind = K::kind(&());
    let found = store.list(namespace).await.inspect_err(|_| {
        error!("is the {kind} crd installed? please run: cargo run --bin crdgen | kubectl apply -f -");
    })?;
    info!("found {} existing {kind} objects", found.len());
    Ok(found.len())
}

/// Manager that owns a Controller for Project and Customer
impl Manager {
    /// Lifecycle initialization interface for app
    ///
    /// This returns a `Manager` that drives the two `Controller`s + their futures to be awaited.
    /// It is up to `main` to wait for the controller streams.
    pub async fn new(
        client: Client,
        config: ControllerConfig,
    ) -> Result<(Self, BoxFuture<'static, ()>, BoxFuture<'static, ()>)> {
        let manager = Manager::default();
        let namespace = std::env::var("WATCH_NAMESPACE").ok().filter(|ns| !ns.is_empty());
        let config = Arc::new(config);
        let store = Arc::new(KubeStore::new(client.clone()));
        let desk = Arc::new(JiraServiceDeskClient::from_config(&config)?);
        let context = Arc::new(Context {
            diagnostics: manager.diagnostics.clone(),
            metrics: manager.metrics.clone(),
            projects: Arc::new(
                ProjectReconciler::new(store.clone(), desk.clone()).with_metrics(manager.metrics.project.clone()),
            ),
            customers: Arc::new(
                CustomerReconciler::new(store.clone(), desk, config).with_metrics(manager.metrics.customer.clone()),
            ),
        });

        // Ensure CRD is installed before loop-watching
        ensure_crd::<Project>(&*store, namespace.as_deref()).await?;
        ensure_crd::<Customer>(&*store, namespace.as_deref()).await?;
        let projects = watched_api::<Project>(client.clone(), namespace.as_deref());
        let customers = watched_api::<Customer>(client, namespace.as_deref());
        match &namespace {
            Some(ns) => info!("watching namespace {ns}"),
            None => info!("watching all namespaces"),
        }

        let controller_project = Controller::new(projects, Config::default().any_semantic())
            .run(project::reconcile, project::error_policy, context.clone())
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()))
            .boxed();

        let controller_customer = Controller::new(customers, Config::default().any_semantic())
            .run(customer::reconcile, customer::error_policy, context)
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()))
            .boxed();

        Ok((manager, controller_project, controller_customer))
    }

    /// Metrics getter
    pub fn metrics(&self) -> Result<String, std::fmt::Error> {
        self.metrics.encode()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }
}
