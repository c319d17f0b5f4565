// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory document store.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Object, ObjectQueryResult, Query, QueryOptions, StorageClient, StorageKey, decode_token,
    encode_token, new_etag, page_size, scope_matches, validate_query,
};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
struct Entry {
    root_scope: String,
    resource_type: String,
    object: Object,
}

/// Store backed by a sorted map, for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStorageClient {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryStorageClient {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn get(&self, id: &str) -> Result<Object> {
        let key = StorageKey::from_id(id)?;
        self.entries
            .read()
            .await
            .get(&key.key)
            .map(|e| e.object.clone())
            .ok_or_else(|| CoreError::not_found(id))
    }

    async fn save(&self, object: &mut Object, etag: Option<&str>) -> Result<()> {
        let key = StorageKey::from_id(&object.metadata.id)?;
        let mut entries = self.entries.write().await;

        if let Some(expected) = etag {
            match entries.get(&key.key) {
                Some(existing) if existing.object.metadata.etag == expected => {}
                _ => return Err(CoreError::concurrency(&object.metadata.id)),
            }
        }

        object.metadata.etag = new_etag();
        entries.insert(
            key.key,
            Entry {
                root_scope: key.root_scope,
                resource_type: key.resource_type,
                object: object.clone(),
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &str, etag: Option<&str>) -> Result<()> {
        let key = StorageKey::from_id(id)?;
        let mut entries = self.entries.write().await;
        let existing = entries
            .get(&key.key)
            .ok_or_else(|| CoreError::not_found(id))?;
        if let Some(expected) = etag
            && existing.object.metadata.etag != expected
        {
            return Err(CoreError::concurrency(id));
        }
        entries.remove(&key.key);
        Ok(())
    }

    async fn query(&self, query: &Query, options: &QueryOptions) -> Result<ObjectQueryResult> {
        validate_query(query)?;
        let resource_type = query.resource_type.to_ascii_lowercase();
        let limit = page_size(options);

        let lower = match &options.pagination_token {
            Some(token) => Bound::Excluded(decode_token(token)?),
            None => Bound::Unbounded,
        };

        let entries = self.entries.read().await;
        let mut matching = entries
            .range((lower, Bound::Unbounded))
            .filter(|(_, e)| e.resource_type == resource_type && scope_matches(query, &e.root_scope));

        let mut items = Vec::new();
        let mut last_key = None;
        for (key, entry) in matching.by_ref().take(limit) {
            items.push(entry.object.clone());
            last_key = Some(key.clone());
        }

        let pagination_token = match (matching.next(), last_key) {
            (Some(_), Some(last)) => Some(encode_token(&last)),
            _ => None,
        };

        Ok(ObjectQueryResult {
            items,
            pagination_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_store_id(name: &str) -> String {
        format!(
            "/planes/radius/local/resourceGroups/rg/providers/Applications.Dapr/stateStores/{name}"
        )
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let store = MemoryStorageClient::new();
        let err = store.get(&state_store_id("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_save_generates_new_etag_each_write() {
        let store = MemoryStorageClient::new();
        let mut obj = Object::new(state_store_id("a"), json!({"v": 1}));
        store.save(&mut obj, None).await.unwrap();
        let first = obj.metadata.etag.clone();
        assert!(!first.is_empty());

        store.save(&mut obj, Some(&first)).await.unwrap();
        assert_ne!(obj.metadata.etag, first);

        let err = store.save(&mut obj, Some(&first)).await.unwrap_err();
        assert!(err.is_concurrency());
    }

    #[tokio::test]
    async fn test_save_with_etag_on_missing_document_conflicts() {
        let store = MemoryStorageClient::new();
        let mut obj = Object::new(state_store_id("a"), json!({}));
        let err = store.save(&mut obj, Some("abc")).await.unwrap_err();
        assert!(err.is_concurrency());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_is_case_insensitive() {
        let store = MemoryStorageClient::new();
        let mut obj = Object::new(state_store_id("MixedCase"), json!({"v": 1}));
        store.save(&mut obj, None).await.unwrap();
        let fetched = store
            .get(&state_store_id("MixedCase").to_lowercase())
            .await
            .unwrap();
        assert_eq!(fetched.metadata.id, state_store_id("MixedCase"));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStorageClient::new();
        let mut obj = Object::new(state_store_id("a"), json!({}));
        store.save(&mut obj, None).await.unwrap();

        let err = store
            .delete(&state_store_id("a"), Some("stale"))
            .await
            .unwrap_err();
        assert!(err.is_concurrency());

        store
            .delete(&state_store_id("a"), Some(&obj.metadata.etag))
            .await
            .unwrap();
        let err = store.delete(&state_store_id("a"), None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_query_pages_cover_all_items() {
        let store = MemoryStorageClient::new();
        for i in 0..7 {
            let mut obj = Object::new(state_store_id(&format!("s{i}")), json!({"i": i}));
            store.save(&mut obj, None).await.unwrap();
        }
        let mut other = Object::new(
            "/planes/radius/local/resourceGroups/rg/providers/Applications.Dapr/pubSubBrokers/p",
            json!({}),
        );
        store.save(&mut other, None).await.unwrap();

        let query = Query {
            root_scope: "/planes/radius/local/resourceGroups/rg".into(),
            resource_type: "Applications.Dapr/stateStores".into(),
            scope_recursive: false,
        };
        let mut seen = Vec::new();
        let mut token = None;
        loop {
            let page = store
                .query(
                    &query,
                    &QueryOptions {
                        pagination_token: token.clone(),
                        max_item_count: Some(3),
                    },
                )
                .await
                .unwrap();
            assert!(page.items.len() <= 3);
            seen.extend(page.items.into_iter().map(|o| o.metadata.id));
            token = page.pagination_token;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(seen.len(), 7);
        let mut dedup = seen.clone();
        dedup.dedup();
        assert_eq!(dedup, seen);
    }

    #[tokio::test]
    async fn test_query_exact_page_has_no_token() {
        let store = MemoryStorageClient::new();
        for i in 0..2 {
            let mut obj = Object::new(state_store_id(&format!("s{i}")), json!({}));
            store.save(&mut obj, None).await.unwrap();
        }
        let page = store
            .query(
                &Query {
                    root_scope: "/planes/radius/local/resourceGroups/rg".into(),
                    resource_type: "applications.dapr/statestores".into(),
                    scope_recursive: false,
                },
                &QueryOptions {
                    pagination_token: None,
                    max_item_count: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.pagination_token.is_none());
    }

    #[tokio::test]
    async fn test_query_requires_scope_and_type() {
        let store = MemoryStorageClient::new();
        let err = store
            .query(&Query::default(), &QueryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID");
    }

    #[tokio::test]
    async fn test_concurrent_conditional_writes_single_winner() {
        let store = std::sync::Arc::new(MemoryStorageClient::new());
        let mut obj = Object::new(state_store_id("race"), json!({}));
        store.save(&mut obj, None).await.unwrap();
        let etag = obj.metadata.etag.clone();

        let tasks = (0..8).map(|i| {
            let store = store.clone();
            let etag = etag.clone();
            tokio::spawn(async move {
                let mut o = Object::new(state_store_id("race"), json!({"writer": i}));
                store.save(&mut o, Some(&etag)).await.is_ok()
            })
        });
        let results = futures::future::join_all(tasks).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(winners, 1);
    }
}
