use crate::{Customer, PendingCustomer, Project, ValidationError};

/// Checks run by the admission webhook, also used by the reconcilers
pub trait Validate {
    fn validate_create(&self) -> Result<(), ValidationError>;
    fn validate_update(&self, old: &Self) -> Result<(), ValidationError>;
    /// Same desired state, metadata aside
    fn same_spec(&self, old: &Self) -> bool;
}

impl Validate for Project {
    fn validate_create(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }

    fn validate_update(&self, old: &Self) -> Result<(), ValidationError> {
        self.spec.validate()?;
        self.spec.validate_update(&old.spec)
    }

    fn same_spec(&self, old: &Self) -> bool {
        self.spec == old.spec
    }
}

impl Validate for Customer {
    fn validate_create(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }

    // Both sides come from the API server here, no remote placeholder can show up
    fn validate_update(&self, old: &Self) -> Result<(), ValidationError> {
        self.spec.validate()?;
        let strict = PendingCustomer {
            name: String::new(),
            email: String::new(),
        };
        self.spec.validate_update(&old.spec, &strict)
    }

    fn same_spec(&self, old: &Self) -> bool {
        self.spec == old.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_update_rejects_immutable_change() {
        let old = Project::new("p", crate::project::tests::sample_spec());
        let mut new = old.clone();
        new.spec.category_id = Some(42);
        assert_eq!(
            new.validate_update(&old),
            Err(ValidationError::ImmutableField("CategoryId"))
        );
    }

    #[test]
    fn test_customer_create_and_update() {
        let old = Customer::new("c", crate::customer::tests::sample_spec());
        assert_eq!(old.validate_create(), Ok(()));
        let mut new = old.clone();
        new.spec.projects.push("Y".into());
        assert_eq!(new.validate_update(&old), Ok(()));
        new.spec.email = "other@b.com".into();
        assert_eq!(new.validate_update(&old), Err(ValidationError::ImmutableField("Email")));
    }
}
