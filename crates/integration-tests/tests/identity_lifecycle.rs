//! Integration tests for the user lifecycle through the service facade.

#![allow(clippy::unwrap_used)]

use orion_api::context::RequestContext;
use orion_api::db::KvBackend;
use orion_api::models::{NewUser, UserUpdate};
use orion_api::services::IdentityOperations;
use orion_api::services::identity::IdentityError;
use orion_core::Email;
use orion_integration_tests::test_services;
use secrecy::SecretString;

fn ctx() -> RequestContext {
    RequestContext::background("identity-it")
}

fn email(addr: &str) -> Email {
    Email::parse(addr).unwrap()
}

fn new_user(addr: &str, password: &str) -> NewUser {
    NewUser {
        email: email(addr),
        first_name: "A".to_owned(),
        last_name: "X".to_owned(),
        password: SecretString::from(password.to_owned()),
    }
}

// =============================================================================
// Create / Get
// =============================================================================

#[tokio::test]
async fn test_create_then_get_strips_password() {
    let (services, _) = test_services();
    let handlers = services.handlers();

    handlers
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();
    let profile = handlers.get_user(&ctx(), &email("a@x.com")).await.unwrap();

    assert_eq!(profile.email.as_str(), "a@x.com");
    assert_eq!(profile.first_name, "A");
    assert_eq!(profile.last_name, "X");

    let json = serde_json::to_value(&profile).unwrap();
    assert!(json.get("password").is_none());
}

#[tokio::test]
async fn test_second_create_conflicts_and_keeps_record() {
    let (services, backend) = test_services();
    let handlers = services.handlers();

    handlers
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();
    let before = backend.get("a@x.com").await.unwrap();

    let mut dup = new_user("a@x.com", "other");
    dup.first_name = "B".to_owned();
    let err = handlers.create_user(&ctx(), dup).await.unwrap_err();

    assert!(matches!(err, IdentityError::Conflict));
    assert_eq!(backend.get("a@x.com").await.unwrap(), before);
}

#[tokio::test]
async fn test_stored_document_layout() {
    let (services, backend) = test_services();
    services
        .handlers()
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();

    let raw = backend.get("a@x.com").await.unwrap().unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();

    assert_eq!(doc["email"], "a@x.com");
    assert_eq!(doc["first_name"], "A");
    assert_eq!(doc["last_name"], "X");
    assert!(doc["password"].as_str().unwrap().starts_with("$argon2id$"));
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let (services, _) = test_services();
    let err = services
        .handlers()
        .get_user(&ctx(), &email("nobody@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::NotFound));
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_in_place_preserves_hash() {
    let (services, backend) = test_services();
    let handlers = services.handlers();
    handlers
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();
    let before: serde_json::Value =
        serde_json::from_slice(&backend.get("a@x.com").await.unwrap().unwrap()).unwrap();

    let update = UserUpdate {
        email: email("a@x.com"),
        first_name: "Ann".to_owned(),
        last_name: "Xu".to_owned(),
    };
    let profile = handlers
        .update_user(&ctx(), &email("a@x.com"), update)
        .await
        .unwrap();
    assert_eq!(profile.first_name, "Ann");

    let after: serde_json::Value =
        serde_json::from_slice(&backend.get("a@x.com").await.unwrap().unwrap()).unwrap();
    assert_eq!(after["password"], before["password"]);
    assert_eq!(after["last_name"], "Xu");
}

#[tokio::test]
async fn test_update_with_new_email_moves_record() {
    let (services, backend) = test_services();
    let handlers = services.handlers();
    handlers
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();
    let hash_before: serde_json::Value =
        serde_json::from_slice(&backend.get("a@x.com").await.unwrap().unwrap()).unwrap();

    let update = UserUpdate {
        email: email("b@x.com"),
        first_name: "A".to_owned(),
        last_name: "X".to_owned(),
    };
    handlers
        .update_user(&ctx(), &email("a@x.com"), update)
        .await
        .unwrap();

    assert!(!backend.exists("a@x.com").await.unwrap());
    let moved: serde_json::Value =
        serde_json::from_slice(&backend.get("b@x.com").await.unwrap().unwrap()).unwrap();
    assert_eq!(moved["email"], "b@x.com");
    assert_eq!(moved["password"], hash_before["password"]);
    assert_eq!(backend.len(), 1);
}

#[tokio::test]
async fn test_update_onto_existing_email_conflicts() {
    let (services, backend) = test_services();
    let handlers = services.handlers();
    handlers
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();
    handlers
        .create_user(&ctx(), new_user("b@x.com", "secret"))
        .await
        .unwrap();
    let a_before = backend.get("a@x.com").await.unwrap();
    let b_before = backend.get("b@x.com").await.unwrap();

    let update = UserUpdate {
        email: email("b@x.com"),
        first_name: "Z".to_owned(),
        last_name: "Z".to_owned(),
    };
    let err = handlers
        .update_user(&ctx(), &email("a@x.com"), update)
        .await
        .unwrap_err();

    assert!(matches!(err, IdentityError::Conflict));
    assert_eq!(backend.get("a@x.com").await.unwrap(), a_before);
    assert_eq!(backend.get("b@x.com").await.unwrap(), b_before);
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let (services, backend) = test_services();
    let update = UserUpdate {
        email: email("a@x.com"),
        first_name: "A".to_owned(),
        last_name: "X".to_owned(),
    };
    let err = services
        .handlers()
        .update_user(&ctx(), &email("a@x.com"), update)
        .await
        .unwrap_err();

    assert!(matches!(err, IdentityError::NotFound));
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_empty_password_update_is_bad_input() {
    let (services, _) = test_services();
    let handlers = services.handlers();
    handlers
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();

    let err = handlers
        .update_user_password(&ctx(), &email("a@x.com"), &SecretString::from(String::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::BadInput(_)));
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_then_get_is_not_found_and_delete_is_idempotent() {
    let (services, _) = test_services();
    let handlers = services.handlers();
    handlers
        .create_user(&ctx(), new_user("a@x.com", "secret"))
        .await
        .unwrap();

    handlers.delete_user(&ctx(), &email("a@x.com")).await.unwrap();
    let err = handlers.get_user(&ctx(), &email("a@x.com")).await.unwrap_err();
    assert!(matches!(err, IdentityError::NotFound));

    handlers.delete_user(&ctx(), &email("a@x.com")).await.unwrap();
}

#[tokio::test]
async fn test_operations_fail_after_backend_closed() {
    let (services, _) = test_services();
    let handlers = services.handlers().clone();
    services.close().await.unwrap();

    let err = handlers
        .get_user(&ctx(), &email("a@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::Store(_)));
}
