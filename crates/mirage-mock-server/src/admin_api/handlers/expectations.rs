//! Expectation management handlers.

use crate::admin_api::types::{
    error_response, expectation_error_response, json_response, parse_expectations,
};
use crate::expectation::ExpectationStore;
use crate::response::ResponseDescriptor;
use hyper::StatusCode;
use tracing::{info, warn};

/// PUT /expectation - Register one expectation or an array of them
pub fn handle_create(body: &str, store: &ExpectationStore) -> ResponseDescriptor {
    let expectations = match parse_expectations(body) {
        Ok(expectations) => expectations,
        Err(e) => {
            warn!("Rejected expectation: {}", e);
            return expectation_error_response(&e);
        }
    };

    match store.add_all(expectations) {
        Ok(created) => {
            info!(count = created.len(), "Expectations registered");
            json_response(StatusCode::CREATED, &created)
        }
        Err(e) => {
            warn!("Rejected expectation: {}", e);
            expectation_error_response(&e)
        }
    }
}

/// GET /expectation/:id
pub fn handle_get(id: &str, store: &ExpectationStore) -> ResponseDescriptor {
    match store.get(id) {
        Some(expectation) => json_response(StatusCode::OK, &expectation),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("no expectation with id {id}"),
        ),
    }
}

/// DELETE /expectation/:id
pub fn handle_delete(id: &str, store: &ExpectationStore) -> ResponseDescriptor {
    if store.remove(id) {
        ResponseDescriptor::new(StatusCode::OK)
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &format!("no expectation with id {id}"),
        )
    }
}

/// PUT /reset - Remove every expectation
pub fn handle_reset(store: &ExpectationStore) -> ResponseDescriptor {
    store.clear();
    ResponseDescriptor::new(StatusCode::OK)
}

/// GET /expectations - All expectations in registration order
pub fn handle_list(store: &ExpectationStore) -> ResponseDescriptor {
    json_response(StatusCode::OK, &store.list())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::Expectation;

    const BUSES: &str = r#"{
        "httpRequest": {"method": "GET", "path": "/buses"},
        "httpResponse": {"statusCode": 200, "body": "[]"}
    }"#;

    fn created(resp: &ResponseDescriptor) -> Vec<Expectation> {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[test]
    fn test_create_assigns_id() {
        let store = ExpectationStore::new();
        let resp = handle_create(BUSES, &store);

        assert_eq!(resp.status, StatusCode::CREATED);
        let created = created(&resp);
        assert_eq!(created.len(), 1);
        assert!(created[0].id.is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_array() {
        let store = ExpectationStore::new();
        let body = format!("[{BUSES}, {BUSES}]");
        let resp = handle_create(&body, &store);

        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(created(&resp).len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_invalid_is_bad_request() {
        let store = ExpectationStore::new();

        let resp = handle_create(r#"{"httpRequest":{"path":"/x"}}"#, &store);
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);

        let resp = handle_create(
            r#"{"httpRequest":{"path":{"regex":"("}},"httpResponse":{}}"#,
            &store,
        );
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_delete_reset() {
        let store = ExpectationStore::new();
        let id = created(&handle_create(BUSES, &store))[0].id.clone().unwrap();

        assert_eq!(handle_get(&id, &store).status, StatusCode::OK);
        assert_eq!(handle_delete(&id, &store).status, StatusCode::OK);
        assert_eq!(handle_delete(&id, &store).status, StatusCode::NOT_FOUND);
        assert_eq!(handle_get(&id, &store).status, StatusCode::NOT_FOUND);

        handle_create(BUSES, &store);
        assert_eq!(handle_reset(&store).status, StatusCode::OK);
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_in_registration_order() {
        let store = ExpectationStore::new();
        let first = created(&handle_create(BUSES, &store))[0].id.clone();
        let second = created(&handle_create(BUSES, &store))[0].id.clone();

        let resp = handle_list(&store);
        let listed: Vec<Expectation> = serde_json::from_slice(&resp.body).unwrap();
        let ids: Vec<_> = listed.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}
