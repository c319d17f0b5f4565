// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end tests of the HTTP surface against a running runtime.

mod common;

use std::path::Path;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use common::*;
use radius_core::store::SqliteStorageClient;
use radius_rp::handlers::InMemoryKubernetes;
use radius_rp::model::ApplicationModel;
use radius_rp::runtime::RpRuntime;
use serde_json::json;

const EXTENDERS: &str = "Applications.Core/extenders";
const REDIS: &str = "Applications.Datastores/redisCaches";
const SQL: &str = "Applications.Datastores/sqlDatabases";
const STATE_STORES: &str = "Applications.Dapr/stateStores";

#[tokio::test]
async fn test_healthz() {
    let ctx = TestContext::new().await;
    let response = ctx.send(Method::GET, "/healthz", None, &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_put_get_and_etag_guards() {
    let ctx = TestContext::new().await;
    ctx.create_environment().await;
    let path = resource_path(EXTENDERS, "twilio");

    let first = ctx.put(&path, extender_body("111")).await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);
    assert_eq!(first.body["properties"]["provisioningState"], "Succeeded");
    assert_eq!(first.body["properties"]["fromNumber"], "111");
    let first_etag = first.etag();

    let second = ctx.put(&path, extender_body("222")).await;
    assert_eq!(second.status, StatusCode::OK);
    let second_etag = second.etag();
    assert_ne!(first_etag, second_etag);

    let stale = ctx
        .send(
            Method::PUT,
            &with_api_version(&path),
            Some(extender_body("333")),
            &[("if-match", format!("\"{first_etag}\"").as_str())],
        )
        .await;
    assert_eq!(stale.status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(stale.body["error"]["code"], "PreconditionFailed");

    let current = ctx
        .send(
            Method::PUT,
            &with_api_version(&path),
            Some(extender_body("444")),
            &[("if-match", second_etag.as_str())],
        )
        .await;
    assert_eq!(current.status, StatusCode::OK);

    let exists = ctx
        .send(
            Method::PUT,
            &with_api_version(&path),
            Some(extender_body("555")),
            &[("if-none-match", "*")],
        )
        .await;
    assert_eq!(exists.status, StatusCode::PRECONDITION_FAILED);

    let fetched = ctx.get(&path).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["properties"]["fromNumber"], "444");
    assert_eq!(fetched.etag(), current.etag());

    // Lookups ignore case.
    let fetched = ctx.get(&path.replace("twilio", "TWILIO")).await;
    assert_eq!(fetched.status, StatusCode::OK);

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let ctx = TestContext::new().await;
    ctx.create_environment().await;
    let path = resource_path(EXTENDERS, "twilio");

    let absent = ctx.delete(&path).await;
    assert_eq!(absent.status, StatusCode::NO_CONTENT);

    ctx.put(&path, extender_body("111")).await;
    let secrets_before = ctx.kubernetes.len().await;
    assert!(secrets_before > 0);

    let deleted = ctx.delete(&path).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(ctx.kubernetes.len().await, secrets_before - 1);

    let missing = ctx.get(&path).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"]["code"], "NotFound");

    let again = ctx.delete(&path).await;
    assert_eq!(again.status, StatusCode::NO_CONTENT);

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_list_follows_next_link() {
    let ctx = TestContext::new().await;
    ctx.create_environment().await;
    for name in ["a", "b", "c"] {
        let response = ctx.put(&resource_path(EXTENDERS, name), extender_body(name)).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let collection = format!("{SCOPE}/providers/{EXTENDERS}");
    let first = ctx
        .send(
            Method::GET,
            &format!("{}&top=2", with_api_version(&collection)),
            None,
            &[],
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["value"].as_array().unwrap().len(), 2);
    let next = url::Url::parse(first.body["nextLink"].as_str().unwrap()).unwrap();
    let next = format!("{}?{}", next.path(), next.query().unwrap());

    let second = ctx.send(Method::GET, &next, None, &[]).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["value"].as_array().unwrap().len(), 1);
    assert!(second.body.get("nextLink").is_none());

    let mut names: Vec<String> = first.body["value"]
        .as_array()
        .unwrap()
        .iter()
        .chain(second.body["value"].as_array().unwrap())
        .map(|v| v["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "b", "c"]);

    let empty = ctx
        .get(&format!("{SCOPE}/providers/Applications.Dapr/stateStores"))
        .await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body, json!({"value": []}));

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_request_validation() {
    let ctx = TestContext::new().await;
    let path = resource_path(EXTENDERS, "twilio");

    let missing = ctx.send(Method::GET, &path, None, &[]).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"]["code"], "InvalidApiVersionParameter");

    let unsupported = ctx
        .send(Method::GET, &format!("{path}?api-version=2022-03-15-privatepreview"), None, &[])
        .await;
    assert_eq!(unsupported.status, StatusCode::BAD_REQUEST);

    let unknown_type = ctx
        .get(&resource_path("Applications.Core/containers", "web"))
        .await;
    assert_eq!(unknown_type.status, StatusCode::NOT_FOUND);

    let wrong_method = ctx
        .send(Method::POST, &with_api_version(&path), Some(json!({})), &[])
        .await;
    assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);

    let bad_body = ctx.put(&path, json!({"properties": 5})).await;
    assert_eq!(bad_body.status, StatusCode::BAD_REQUEST, "{}", bad_body.body);

    let patch_absent = ctx
        .send(Method::PATCH, &with_api_version(&path), Some(extender_body("1")), &[])
        .await;
    assert_eq!(patch_absent.status, StatusCode::NOT_FOUND);

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_async_put_delete_and_secrets() {
    let ctx = TestContext::new().await;
    ctx.create_environment().await;
    let path = resource_path(REDIS, "cache");

    let created = ctx.put(&path, redis_body("p1")).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.body["properties"]["provisioningState"], "Accepted");
    assert!(created.header("retry-after").is_some());
    let status_path = created.header_path("azure-asyncoperation");
    let result_path = created.header_path("location");
    assert!(result_path.contains("operationResults"));

    let done = ctx.wait_for_operation(&status_path).await;
    assert_eq!(done["status"], "Succeeded", "{done}");
    assert!(done.get("endTime").is_some());

    let result = ctx.send(Method::GET, &result_path, None, &[]).await;
    assert_eq!(result.status, StatusCode::NO_CONTENT);

    let fetched = ctx.get(&path).await;
    assert_eq!(fetched.body["properties"]["provisioningState"], "Succeeded");
    assert_eq!(fetched.body["properties"]["host"], "redis.local");
    assert!(fetched.body["properties"].get("secrets").is_none());

    let list_secrets = format!("{path}/listSecrets");
    let secrets = ctx
        .send(Method::POST, &with_api_version(&list_secrets), None, &[])
        .await;
    assert_eq!(secrets.status, StatusCode::OK, "{}", secrets.body);
    assert_eq!(secrets.body["password"], "p1");

    // Rotating the password is visible through listSecrets once redeployed.
    let updated = ctx.put(&path, redis_body("p2")).await;
    assert_eq!(updated.status, StatusCode::OK);
    let done = ctx
        .wait_for_operation(&updated.header_path("azure-asyncoperation"))
        .await;
    assert_eq!(done["status"], "Succeeded");
    let secrets = ctx
        .send(Method::POST, &with_api_version(&list_secrets), None, &[])
        .await;
    assert_eq!(secrets.body["password"], "p2");

    let deleting = ctx.delete(&path).await;
    assert_eq!(deleting.status, StatusCode::ACCEPTED);
    let done = ctx
        .wait_for_operation(&deleting.header_path("azure-asyncoperation"))
        .await;
    assert_eq!(done["status"], "Succeeded");
    assert_eq!(ctx.get(&path).await.status, StatusCode::NOT_FOUND);
    assert!(ctx.kubernetes.is_empty().await);

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_generic_dapr_component_lifecycle() {
    let ctx = TestContext::new().await;
    ctx.create_environment().await;
    let path = resource_path(STATE_STORES, "zk");
    let objects_before = ctx.kubernetes.len().await;

    let created = ctx.put(&path, generic_state_store_body()).await;
    assert_eq!(created.status, StatusCode::OK, "{}", created.body);
    assert_eq!(ctx.kubernetes.len().await, objects_before + 1);

    // The stored Kubernetes identity reads back on every verb.
    let fetched = ctx.get(&path).await;
    assert_eq!(fetched.status, StatusCode::OK, "{}", fetched.body);
    assert_eq!(fetched.body["properties"]["type"], "state.zookeeper");

    let updated = ctx.put(&path, generic_state_store_body()).await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);

    let deleted = ctx.delete(&path).await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.body);
    assert_eq!(ctx.kubernetes.len().await, objects_before);

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_same_name_resources_keep_separate_secrets() {
    let ctx = TestContext::new().await;
    ctx.create_environment().await;
    let redis = resource_path(REDIS, "db");
    let sql = resource_path(SQL, "db");

    ctx.put_and_wait(&redis, redis_body("redis-pw")).await;
    ctx.put_and_wait(&sql, sql_body("sql-pw")).await;

    let secrets = ctx.list_secrets(&redis).await;
    assert_eq!(secrets.status, StatusCode::OK, "{}", secrets.body);
    assert_eq!(secrets.body["password"], "redis-pw");
    let secrets = ctx.list_secrets(&sql).await;
    assert_eq!(secrets.status, StatusCode::OK, "{}", secrets.body);
    assert_eq!(secrets.body["password"], "sql-pw");

    let deleting = ctx.delete(&sql).await;
    assert_eq!(deleting.status, StatusCode::ACCEPTED);
    let done = ctx
        .wait_for_operation(&deleting.header_path("azure-asyncoperation"))
        .await;
    assert_eq!(done["status"], "Succeeded", "{done}");

    let secrets = ctx.list_secrets(&redis).await;
    assert_eq!(secrets.status, StatusCode::OK, "{}", secrets.body);
    assert_eq!(secrets.body["password"], "redis-pw");

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_async_failure_is_recorded() {
    let ctx = TestContext::new().await;
    // No environment: the deployment cannot resolve it.
    let path = resource_path(REDIS, "orphan");

    let created = ctx.put(&path, redis_body("p1")).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let done = ctx
        .wait_for_operation(&created.header_path("azure-asyncoperation"))
        .await;
    assert_eq!(done["status"], "Failed");
    assert_eq!(done["error"]["code"], "BadRequest");
    assert!(done["error"]["message"].as_str().unwrap().contains("does not exist"));

    let fetched = ctx.get(&path).await;
    assert_eq!(fetched.body["properties"]["provisioningState"], "Failed");

    // A failed resource accepts a new mutation.
    ctx.create_environment().await;
    let retried = ctx.put(&path, redis_body("p1")).await;
    assert_eq!(retried.status, StatusCode::OK);
    let done = ctx
        .wait_for_operation(&retried.header_path("azure-asyncoperation"))
        .await;
    assert_eq!(done["status"], "Succeeded");

    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_operation_status_not_found() {
    let ctx = TestContext::new().await;
    let path = format!(
        "{SCOPE}/providers/Applications.Datastores/locations/global/operationStatuses/missing"
    );
    let response = ctx.get(&path).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    ctx.runtime.shutdown().await.unwrap();
}

async fn start_with_sqlite(db_path: &Path) -> RpRuntime {
    let storage = SqliteStorageClient::from_path(db_path).await.unwrap();
    let model = ApplicationModel::new(Arc::new(InMemoryKubernetes::new()), None);
    RpRuntime::builder()
        .config(test_config())
        .storage(Arc::new(storage))
        .model(Arc::new(model))
        .build()
        .unwrap()
        .start()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("radius.db");
    let path = resource_path(EXTENDERS, "twilio");

    let ctx = TestContext::attach(start_with_sqlite(&db_path).await);
    ctx.create_environment().await;
    let created = ctx.put(&path, extender_body("111")).await;
    assert_eq!(created.status, StatusCode::OK, "{}", created.body);
    let etag = created.etag();
    ctx.runtime.shutdown().await.unwrap();

    let ctx = TestContext::attach(start_with_sqlite(&db_path).await);
    let fetched = ctx.get(&path).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.etag(), etag);
    assert_eq!(fetched.body["properties"]["fromNumber"], "111");
    ctx.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_puts_all_land() {
    let ctx = TestContext::new().await;
    ctx.create_environment().await;

    let client = &ctx;
    let responses = futures::future::join_all((0..8).map(|i| async move {
        client
            .put(&resource_path(EXTENDERS, &format!("ext-{i}")), extender_body("1"))
            .await
    }))
    .await;
    assert!(responses.iter().all(|r| r.status == StatusCode::OK));

    let list = ctx.get(&format!("{SCOPE}/providers/{EXTENDERS}")).await;
    assert_eq!(list.body["value"].as_array().unwrap().len(), 8);
    ctx.runtime.shutdown().await.unwrap();
}
