use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
pub enum ConditionsType {
    #[default]
    ReconcileSuccess,
    ReconcileError,
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
pub enum ConditionsStatus {
    #[default]
    True,
    False,
}

/// ApplicationCondition records the outcome of the latest reconciliation pass
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCondition {
    /// LastTransitionTime is the time the condition was last observed
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Message contains human-readable message indicating details about condition
    pub message: String,
    /// Type is an application condition type
    #[serde(rename = "type")]
    pub condition_type: ConditionsType,
    /// Status ("True" or "False") describe if the condition is enbled
    pub status: ConditionsStatus,
    /// Generation for that status
    pub generation: i64,
}

impl ApplicationCondition {
    #[must_use]
    pub fn new(
        message: &str,
        status: ConditionsStatus,
        condition_type: ConditionsType,
        generation: i64,
    ) -> ApplicationCondition {
        ApplicationCondition {
            last_transition_time: Some(Utc::now()),
            status,
            condition_type,
            message: message.to_string(),
            generation,
        }
    }

    #[must_use]
    pub fn reconcile_ok(generation: i64) -> ApplicationCondition {
        ApplicationCondition::new(
            "Reconciled successfully",
            ConditionsStatus::True,
            ConditionsType::ReconcileSuccess,
            generation,
        )
    }

    #[must_use]
    pub fn reconcile_ko(message: &str, generation: i64) -> ApplicationCondition {
        ApplicationCondition::new(
            message,
            ConditionsStatus::False,
            ConditionsType::ReconcileError,
            generation,
        )
    }

    pub fn is_success(&self) -> bool {
        self.condition_type == ConditionsType::ReconcileSuccess && self.status == ConditionsStatus::True
    }

    /// Equality ignoring the transition time
    pub fn same_as(&self, other: &ApplicationCondition) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.message == other.message
            && self.generation == other.generation
    }
}

/// Replace the condition list by `cond`, keeping the current one when only its time would change
pub fn set_condition(conditions: &mut Vec<ApplicationCondition>, cond: ApplicationCondition) {
    if conditions.len() == 1 && conditions[0].same_as(&cond) {
        return;
    }
    *conditions = vec![cond];
}
