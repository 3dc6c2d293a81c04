use crate::{
    Error, Outcome, Result,
    finalizer::{self, FinalizerState, PROJECT_FINALIZER},
    manager::Context,
    metrics::ReconcileMetrics,
    store::{ResourceStore, update_status_with},
    telemetry,
};
use chrono::Utc;
use common::{
    Project, ProjectStatus, ValidationError,
    conditions::{ApplicationCondition, set_condition},
    servicedesk::{ProjectEntity, ProjectUpdate, RemoteError, ServiceDeskClient},
};
use kube::{
    ResourceExt,
    runtime::{controller::Action, reflector::ObjectRef},
};
use opentelemetry::trace::TraceId;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{Span, debug, field, info, instrument, warn};

/// What a pass has to do with a project, derived from the stored object
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProjectState {
    Invalid(ValidationError),
    /// Deleting and our cleanup already ran
    Released,
    /// Deleting, remote project to remove when it was ever created
    Cleanup(Option<String>),
    Unguarded,
    Absent,
    Present(String),
}

impl ProjectState {
    // Cleanup only needs the status, an invalid spec must not block a deletion
    fn of(project: &Project) -> Self {
        let id = project.remote_id().map(str::to_string);
        let state = finalizer::finalizer_state(project, PROJECT_FINALIZER);
        match state {
            FinalizerState::Released => return ProjectState::Released,
            FinalizerState::Cleanup => return ProjectState::Cleanup(id),
            FinalizerState::Unguarded | FinalizerState::Guarded => {}
        }
        if let Err(e) = project.spec.validate() {
            return ProjectState::Invalid(e);
        }
        match (state, id) {
            (FinalizerState::Unguarded, _) => ProjectState::Unguarded,
            (_, None) => ProjectState::Absent,
            (_, Some(id)) => ProjectState::Present(id),
        }
    }
}

/// Keeps Jira Service Desk projects in line with Project resources
pub struct ProjectReconciler {
    store: Arc<dyn ResourceStore<Project>>,
    client: Arc<dyn ServiceDeskClient>,
    resync: Duration,
    metrics: ReconcileMetrics,
}

impl ProjectReconciler {
    pub fn new(store: Arc<dyn ResourceStore<Project>>, client: Arc<dyn ServiceDeskClient>) -> Self {
        Self {
            store,
            client,
            resync: Duration::from_secs(15 * 60),
            metrics: ReconcileMetrics::default(),
        }
    }

    /// Delay before an in-sync project is compared with the service desk again
    #[must_use]
    pub fn with_resync(mut self, resync: Duration) -> Self {
        self.resync = resync;
        self
    }

    /// Terminal failures never reach the runtime error policy, they are counted here
    #[must_use]
    pub fn with_metrics(mut self, metrics: ReconcileMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn reconcile(&self, obj: &ObjectRef<Project>) -> Outcome {
        let project = match self.store.get(obj).await {
            Ok(Some(project)) => project,
            Ok(None) => {
                debug!("project {} is gone", obj.name);
                return Outcome::NoRequeue;
            }
            Err(e) => return Outcome::RequeueWithError(e),
        };
        match self.apply(&project).await {
            Ok(outcome) => outcome,
            Err(e) => self.record_failure(&project, e).await,
        }
    }

    async fn apply(&self, project: &Project) -> Result<Outcome> {
        match ProjectState::of(project) {
            ProjectState::Invalid(e) => Err(e.into()),
            ProjectState::Released => Ok(Outcome::NoRequeue),
            ProjectState::Cleanup(id) => self.cleanup(project, id).await,
            ProjectState::Unguarded => {
                finalizer::add(&*self.store, project, PROJECT_FINALIZER).await?;
                Ok(Outcome::NoRequeue)
            }
            ProjectState::Absent => self.create(project).await,
            ProjectState::Present(id) => self.sync(project, &id).await,
        }
    }

    async fn cleanup(&self, project: &Project, id: Option<String>) -> Result<Outcome> {
        if let Some(id) = id {
            match self.client.delete_project(&id).await {
                Ok(()) => info!("deleted project {} ({id})", project.spec.key),
                Err(RemoteError::NotFound(_)) => debug!("project {id} already gone"),
                Err(e) => return Err(e.into()),
            }
        }
        finalizer::remove(&*self.store, project, PROJECT_FINALIZER).await?;
        Ok(Outcome::NoRequeue)
    }

    async fn create(&self, project: &Project) -> Result<Outcome> {
        let key = &project.spec.key;
        let id = match self.client.create_project(&ProjectEntity::from_resource(project)).await {
            Ok(id) => {
                info!("created project {key} ({id})");
                id
            }
            Err(RemoteError::AlreadyExists(_)) => {
                let existing = self.client.get_project_by_id(key).await?;
                info!("project {key} already exists, adopting {}", existing.id);
                existing.id
            }
            Err(e) => return Err(e.into()),
        };
        if !project.spec.open_access {
            self.client
                .update_project_access_permissions(project.spec.open_access, key)
                .await?;
        }
        let generation = project.metadata.generation.unwrap_or_default();
        self.patch_status(project, |status| {
            status.id = id.clone();
            set_condition(&mut status.conditions, ApplicationCondition::reconcile_ok(generation));
        })
        .await?;
        Ok(Outcome::NoRequeue)
    }

    async fn sync(&self, project: &Project, id: &str) -> Result<Outcome> {
        let remote = self.client.get_project_by_id(id).await?;
        if ProjectEntity::from_resource(project).equal(&remote) {
            debug!("project {} is in sync", project.spec.key);
        } else {
            project
                .spec
                .validate_update(&remote.to_resource_spec(&project.spec))?;
            let update = ProjectUpdate::diff(&remote, &project.spec);
            if !update.is_empty() {
                self.client.update_project(&update, id).await?;
                info!("updated project {} ({id})", project.spec.key);
            }
        }
        let generation = project.metadata.generation.unwrap_or_default();
        self.patch_status(project, |status| {
            set_condition(&mut status.conditions, ApplicationCondition::reconcile_ok(generation));
        })
        .await?;
        Ok(Outcome::RequeueAfter(self.resync))
    }

    async fn patch_status<F>(&self, project: &Project, change: F) -> Result<Project>
    where
        F: Fn(&mut ProjectStatus) + Send + Sync,
    {
        update_status_with(&*self.store, project, |p: &mut Project| {
            change(p.status.get_or_insert_with(ProjectStatus::default))
        })
        .await
    }

    async fn record_failure(&self, project: &Project, e: Error) -> Outcome {
        warn!("reconcile of project {} failed: {e}", project.name_any());
        let message = e.to_string();
        let generation = project.metadata.generation.unwrap_or_default();
        if let Err(write) = self
            .patch_status(project, |status| {
                set_condition(
                    &mut status.conditions,
                    ApplicationCondition::reconcile_ko(&message, generation),
                );
            })
            .await
        {
            warn!("could not record failure on project {}: {write}", project.name_any());
        }
        if e.is_terminal() {
            self.metrics.reconcile_failure(project, &e);
            Outcome::NoRequeue
        } else {
            Outcome::RequeueWithError(e)
        }
    }
}

#[instrument(skip(ctx, project), fields(trace_id))]
pub async fn reconcile(project: Arc<Project>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    if trace_id != TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _mes = ctx.metrics.project.count_and_measure(&trace_id);
    ctx.diagnostics.write().await.last_event = Utc::now();
    ctx.projects
        .reconcile(&ObjectRef::from_obj(project.as_ref()))
        .await
        .into_action()
}

#[must_use]
pub fn error_policy(project: Arc<Project>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed for {:?}: {:?}", project.metadata.name, error);
    ctx.metrics.project.reconcile_failure(project.as_ref(), error);
    Action::requeue(Duration::from_secs(5 * 60))
}
