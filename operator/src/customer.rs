use crate::{
    Error, Outcome, Result,
    finalizer::{self, CUSTOMER_FINALIZER, FinalizerState},
    manager::Context,
    metrics::ReconcileMetrics,
    store::{ResourceStore, update_status_with},
    telemetry,
};
use chrono::Utc;
use common::{
    ControllerConfig, Customer, CustomerStatus, ValidationError,
    conditions::{ApplicationCondition, set_condition},
    membership,
    servicedesk::{CustomerEntity, RemoteError, ServiceDeskClient, is_customer_updated},
};
use kube::{
    ResourceExt,
    runtime::{controller::Action, reflector::ObjectRef},
};
use opentelemetry::trace::TraceId;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{Span, debug, field, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
enum CustomerState {
    Invalid(ValidationError),
    Released,
    Cleanup(Option<String>),
    Unguarded,
    Absent,
    Present(String),
}

impl CustomerState {
    // Cleanup only needs the status, an invalid spec must not block a deletion
    fn of(customer: &Customer) -> Self {
        let id = customer.remote_id().map(str::to_string);
        let state = finalizer::finalizer_state(customer, CUSTOMER_FINALIZER);
        match state {
            FinalizerState::Released => return CustomerState::Released,
            FinalizerState::Cleanup => return CustomerState::Cleanup(id),
            FinalizerState::Unguarded | FinalizerState::Guarded => {}
        }
        if let Err(e) = customer.spec.validate() {
            return CustomerState::Invalid(e);
        }
        match (state, id) {
            (FinalizerState::Unguarded, _) => CustomerState::Unguarded,
            (_, None) => CustomerState::Absent,
            (_, Some(id)) => CustomerState::Present(id),
        }
    }
}

/// Keeps Jira Service Desk customers and their project membership in line with Customer resources
///
/// Every membership change is written to `status.associatedProjects` as soon as the service desk
/// accepted it, so an interrupted pass resumes from what was really done.
pub struct CustomerReconciler {
    store: Arc<dyn ResourceStore<Customer>>,
    client: Arc<dyn ServiceDeskClient>,
    config: Arc<ControllerConfig>,
    resync: Duration,
    metrics: ReconcileMetrics,
}

impl CustomerReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore<Customer>>,
        client: Arc<dyn ServiceDeskClient>,
        config: Arc<ControllerConfig>,
    ) -> Self {
        Self {
            store,
            client,
            config,
            resync: Duration::from_secs(15 * 60),
            metrics: ReconcileMetrics::default(),
        }
    }

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

    pub async fn reconcile(&self, obj: &ObjectRef<Customer>) -> Outcome {
        let customer = match self.store.get(obj).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                debug!("customer {} is gone", obj.name);
                return Outcome::NoRequeue;
            }
            Err(e) => return Outcome::RequeueWithError(e),
        };
        match self.apply(&customer).await {
            Ok(outcome) => outcome,
            Err(e) => self.record_failure(&customer, e).await,
        }
    }

    async fn apply(&self, customer: &Customer) -> Result<Outcome> {
        match CustomerState::of(customer) {
            CustomerState::Invalid(e) => Err(e.into()),
            CustomerState::Released => Ok(Outcome::NoRequeue),
            CustomerState::Cleanup(id) => self.cleanup(customer, id).await,
            CustomerState::Unguarded => {
                finalizer::add(&*self.store, customer, CUSTOMER_FINALIZER).await?;
                Ok(Outcome::NoRequeue)
            }
            CustomerState::Absent => self.create(customer).await,
            CustomerState::Present(id) => self.sync(customer, &id).await,
        }
    }

    async fn cleanup(&self, customer: &Customer, id: Option<String>) -> Result<Outcome> {
        let mut customer = customer.clone();
        if let Some(id) = id {
            for key in customer.associated_projects() {
                if key.is_empty() {
                    continue;
                }
                match self.client.remove_customer_from_project(&id, &key).await {
                    Ok(()) => info!("removed customer {id} from project {key}"),
                    Err(RemoteError::NotFound(_)) => debug!("customer {id} no longer in project {key}"),
                    Err(e) => return Err(e.into()),
                }
                customer = self
                    .patch_status(&customer, |status| status.associated_projects.retain(|k| k != &key))
                    .await?;
            }
            if self.config.delete_customer_accounts {
                match self.client.delete_customer(&id).await {
                    Ok(()) => info!("deleted customer account {id}"),
                    Err(RemoteError::NotFound(_)) => debug!("customer account {id} already gone"),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        finalizer::remove(&*self.store, &customer, CUSTOMER_FINALIZER).await?;
        Ok(Outcome::NoRequeue)
    }

    async fn create(&self, customer: &Customer) -> Result<Outcome> {
        let spec = &customer.spec;
        let seed = if spec.legacy_customer {
            Some(
                spec.projects
                    .first()
                    .ok_or(ValidationError::MissingField("Projects"))?
                    .clone(),
            )
        } else {
            None
        };
        let created = match &seed {
            Some(key) => self.client.create_legacy_customer(&spec.email, key).await,
            None => self.client.create_customer(&CustomerEntity::from_resource(customer)).await,
        };
        let (id, invited_into) = match created {
            Ok(id) => {
                info!("created customer {} ({id})", spec.email);
                (id, seed)
            }
            Err(RemoteError::AlreadyExists(_)) => {
                let id = self.client.get_customer_id_by_email(&spec.email).await?;
                info!("customer {} already exists, adopting {id}", spec.email);
                (id, None)
            }
            Err(e) => return Err(e.into()),
        };
        let customer = self
            .patch_status(customer, |status| {
                status.customer_id = id.clone();
                if let Some(key) = &invited_into {
                    if !status.associated_projects.contains(key) {
                        status.associated_projects.push(key.clone());
                    }
                }
            })
            .await?;
        self.sync_membership(customer, &id).await?;
        Ok(Outcome::NoRequeue)
    }

    async fn sync(&self, customer: &Customer, id: &str) -> Result<Outcome> {
        let remote = self.client.get_customer_by_id(id).await?;
        if !is_customer_updated(customer, &remote) {
            debug!("customer {} is in sync", customer.spec.email);
            self.succeed(customer).await?;
            return Ok(Outcome::RequeueAfter(self.resync));
        }
        customer
            .spec
            .validate_update(&remote.to_resource_spec(&customer.spec), &self.config.pending_customer)?;
        self.sync_membership(customer.clone(), id).await?;
        Ok(Outcome::RequeueAfter(self.resync))
    }

    /// Add then remove project memberships until the status matches `spec.projects`
    async fn sync_membership(&self, mut customer: Customer, id: &str) -> Result<Customer> {
        let diff = membership::diff(&customer.spec.projects, &customer.associated_projects());
        for key in diff.added {
            self.client.add_customer_to_project(id, &key).await?;
            info!("added customer {id} to project {key}");
            customer = self
                .patch_status(&customer, |status| {
                    if !status.associated_projects.contains(&key) {
                        status.associated_projects.push(key.clone());
                    }
                })
                .await?;
        }
        for key in diff.removed {
            match self.client.remove_customer_from_project(id, &key).await {
                Ok(()) => info!("removed customer {id} from project {key}"),
                Err(RemoteError::NotFound(_)) => debug!("customer {id} no longer in project {key}"),
                Err(e) => return Err(e.into()),
            }
            customer = self
                .patch_status(&customer, |status| status.associated_projects.retain(|k| k != &key))
                .await?;
        }
        let desired = customer.spec.projects.clone();
        let generation = customer.metadata.generation.unwrap_or_default();
        self.patch_status(&customer, |status| {
            status.associated_projects = desired.iter().filter(|k| !k.is_empty()).cloned().collect();
            set_condition(&mut status.conditions, ApplicationCondition::reconcile_ok(generation));
        })
        .await
    }

    async fn succeed(&self, customer: &Customer) -> Result<Customer> {
        let generation = customer.metadata.generation.unwrap_or_default();
        self.patch_status(customer, |status| {
            set_condition(&mut status.conditions, ApplicationCondition::reconcile_ok(generation));
        })
        .await
    }

    async fn patch_status<F>(&self, customer: &Customer, change: F) -> Result<Customer>
    where
        F: Fn(&mut CustomerStatus) + Send + Sync,
    {
        update_status_with(&*self.store, customer, |c: &mut Customer| {
            change(c.status.get_or_insert_with(CustomerStatus::default))
        })
        .await
    }

    async fn record_failure(&self, customer: &Customer, e: Error) -> Outcome {
        warn!("reconcile of customer {} failed: {e}", customer.name_any());
        let message = e.to_string();
        let generation = customer.metadata.generation.unwrap_or_default();
        if let Err(write) = self
            .patch_status(customer, |status| {
                set_condition(
                    &mut status.conditions,
                    ApplicationCondition::reconcile_ko(&message, generation),
                );
            })
            .await
        {
            warn!("could not record failure on customer {}: {write}", customer.name_any());
        }
        if e.is_terminal() {
            self.metrics.reconcile_failure(customer, &e);
            Outcome::NoRequeue
        } else {
            Outcome::RequeueWithError(e)
        }
    }
}

#[instrument(skip(ctx, customer), fields(trace_id))]
pub async fn reconcile(customer: Arc<Customer>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    if trace_id != TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _mes = ctx.metrics.customer.count_and_measure(&trace_id);
    ctx.diagnostics.write().await.last_event = Utc::now();
    ctx.customers
        .reconcile(&ObjectRef::from_obj(customer.as_ref()))
        .await
        .into_action()
}

#[must_use]
pub fn error_policy(customer: Arc<Customer>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed for {:?}: {:?}", customer.metadata.name, error);
    ctx.metrics.customer.reconcile_failure(customer.as_ref(), error);
    Action::requeue(Duration::from_secs(5 * 60))
}
