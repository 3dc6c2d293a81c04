use crate::{Customer, CustomerSpec, membership::same_members};
use serde::{Deserialize, Serialize};

/// A customer account as known by the service desk
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerEntity {
    #[serde(default, skip_serializing)]
    pub account_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, alias = "emailAddress")]
    pub email: String,
}

impl CustomerEntity {
    pub fn from_resource(customer: &Customer) -> Self {
        Self {
            account_id: customer.remote_id().unwrap_or_default().to_string(),
            display_name: customer.spec.name.clone(),
            email: customer.spec.email.clone(),
        }
    }

    /// Map the entity back to a spec, membership and creation flow come from `current`
    ///
    /// Invited customers get their display name from the invitation, so theirs is kept from `current`.
    pub fn to_resource_spec(&self, current: &CustomerSpec) -> CustomerSpec {
        CustomerSpec {
            name: if current.legacy_customer {
                current.name.clone()
            } else {
                self.display_name.clone()
            },
            email: self.email.clone(),
            legacy_customer: current.legacy_customer,
            projects: current.projects.clone(),
        }
    }
}

/// Whether the customer resource differs from what the service desk knows
pub fn is_customer_updated(customer: &Customer, remote: &CustomerEntity) -> bool {
    (!customer.spec.legacy_customer && customer.spec.name != remote.display_name)
        || !customer.spec.email.eq_ignore_ascii_case(&remote.email)
        || !same_members(&customer.spec.projects, &customer.associated_projects())
}
