use actix_web::{HttpResponse, Responder, post, web};
use common::{Customer, Project, ValidationError, Validate};
use kube::{
    Resource,
    core::{
        DynamicObject,
        admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
    },
};
use tracing::*;

fn admit<K: Resource + Validate>(req: &AdmissionRequest<K>) -> Result<(), ValidationError> {
    match (&req.operation, &req.object, &req.old_object) {
        (Operation::Create, Some(obj), _) => obj.validate_create(),
        // finalizer removal on a deleted object must never be blocked
        (Operation::Update, Some(obj), Some(old))
            if obj.meta().deletion_timestamp.is_some() && obj.same_spec(old) =>
        {
            Ok(())
        }
        (Operation::Update, Some(obj), Some(old)) => obj.validate_update(old),
        _ => Ok(()),
    }
}

/// Answer an admission review, denying the request when the object fails validation
pub fn review<K: Resource + Validate>(body: AdmissionReview<K>) -> AdmissionReview<DynamicObject> {
    let req: AdmissionRequest<K> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            warn!("invalid admission review: {e}");
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };
    let res = AdmissionResponse::from(&req);
    match admit(&req) {
        Ok(()) => res.into_review(),
        Err(e) => {
            info!("denied {:?} of {}/{}: {e}", req.operation, req.namespace.as_deref().unwrap_or_default(), req.name);
            res.deny(e.to_string()).into_review()
        }
    }
}

#[post("/validate-project")]
pub async fn validate_project(body: web::Json<AdmissionReview<Project>>) -> impl Responder {
    HttpResponse::Ok().json(review(body.into_inner()))
}

#[post("/validate-customer")]
pub async fn validate_customer(body: web::Json<AdmissionReview<Customer>>) -> impl Responder {
    HttpResponse::Ok().json(review(body.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_customer, sample_project};
    use chrono::Utc;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::ResourceExt;
    use serde::Serialize;
    use serde_json::json;

    fn request<K: Resource + Serialize + serde::de::DeserializeOwned>(
        operation: &str,
        object: &K,
        old: Option<&K>,
    ) -> AdmissionReview<K> {
        serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "jiraservicedesk.stakater.com", "version": "v1alpha1", "kind": "Object"},
                "resource": {"group": "jiraservicedesk.stakater.com", "version": "v1alpha1", "resource": "objects"},
                "name": object.meta().name,
                "namespace": "default",
                "operation": operation,
                "userInfo": {"username": "admin"},
                "object": object,
                "oldObject": old,
                "dryRun": false,
            }
        }))
        .unwrap()
    }

    fn allowed(review: &AdmissionReview<DynamicObject>) -> bool {
        review.response.as_ref().unwrap().allowed
    }

    #[test]
    fn test_valid_project_is_admitted() {
        let res = review(request("CREATE", &sample_project(), None));
        assert!(allowed(&res));
    }

    #[test]
    fn test_duplicate_keys_are_denied() {
        let res = review(request("CREATE", &sample_customer(&["A", "A"]), None));
        assert!(!allowed(&res));
        let message = res.response.unwrap().result.message;
        assert_eq!(message, "Invalid CRUD operation. Duplicate Project Keys are found.");
    }

    #[test]
    fn test_immutable_field_update_is_denied() {
        let old = sample_project();
        let mut new = old.clone();
        new.spec.lead_account_id = "lead-2".to_string();
        assert!(!allowed(&review(request("UPDATE", &new, Some(&old)))));

        let mut new = old.clone();
        new.spec.description = "Edited".to_string();
        assert!(allowed(&review(request("UPDATE", &new, Some(&old)))));
    }

    #[test]
    fn test_customer_membership_update_is_admitted() {
        let old = sample_customer(&["X"]);
        let new = sample_customer(&["X", "Y"]);
        assert!(allowed(&review(request("UPDATE", &new, Some(&old)))));
    }

    #[test]
    fn test_finalizer_removal_of_deleted_object_is_admitted() {
        let mut old = sample_customer(&["A", "A"]);
        old.finalizers_mut().push("jiraservicedesk.stakater.com/customer".to_string());
        old.meta_mut().deletion_timestamp = Some(Time(Utc::now()));
        let mut new = old.clone();
        new.finalizers_mut().clear();
        assert!(allowed(&review(request("UPDATE", &new, Some(&old)))));
    }

    #[test]
    fn test_spec_edit_of_deleted_object_is_validated() {
        let mut old = sample_customer(&["X"]);
        old.meta_mut().deletion_timestamp = Some(Time(Utc::now()));
        let mut new = old.clone();
        new.spec.projects = vec!["X".to_string(), "X".to_string()];
        assert!(!allowed(&review(request("UPDATE", &new, Some(&old)))));
    }

    #[test]
    fn test_delete_is_always_admitted() {
        let res = review(request("DELETE", &sample_customer(&["A", "A"]), None));
        assert!(allowed(&res));
    }
}
