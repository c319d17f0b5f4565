// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mongo databases, Redis caches and SQL databases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{BasicResourceProperties, ResourceProvisioning, ResourceRecipe};
use super::{Resource, ResourceProperties, resource_types};

/// Computed value keys shared by the datastore renderers.
pub mod values {
    /// Host name.
    pub const HOST: &str = "host";
    /// Port.
    pub const PORT: &str = "port";
    /// Database name.
    pub const DATABASE: &str = "database";
    /// SQL server name.
    pub const SERVER: &str = "server";
    /// User name.
    pub const USERNAME: &str = "username";
    /// Password secret.
    pub const PASSWORD: &str = "password";
    /// Connection string secret.
    pub const CONNECTION_STRING: &str = "connectionString";
    /// URL secret.
    pub const URL: &str = "url";
    /// URI secret.
    pub const URI: &str = "uri";
}

pub(super) fn recipe_when(mode: ResourceProvisioning, recipe: &Option<ResourceRecipe>) -> Option<ResourceRecipe> {
    match mode {
        ResourceProvisioning::Recipe => Some(recipe.clone().unwrap_or_default()),
        ResourceProvisioning::Manual => None,
    }
}

fn copy_value<T: serde::de::DeserializeOwned>(
    computed: &BTreeMap<String, Value>,
    key: &str,
    target: &mut Option<T>,
) {
    if let Some(v) = computed
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        *target = Some(v);
    }
}

/// Applications.Datastores/mongoDatabases properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoDatabaseProperties {
    /// Application, environment and status.
    #[serde(flatten)]
    pub basic: BasicResourceProperties,
    /// Manual or recipe.
    #[serde(default)]
    pub resource_provisioning: ResourceProvisioning,
    /// Recipe selection in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<ResourceRecipe>,
    /// Existing Azure Cosmos Mongo database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Secrets supplied with a write request. Held in memory only.
    #[serde(skip)]
    pub secrets: BTreeMap<String, String>,
}

impl ResourceProperties for MongoDatabaseProperties {
    const RESOURCE_TYPE: &'static str = resource_types::MONGO_DATABASES;

    fn basic(&self) -> &BasicResourceProperties {
        &self.basic
    }

    fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        &mut self.basic
    }

    fn recipe(&self) -> Option<ResourceRecipe> {
        recipe_when(self.resource_provisioning, &self.recipe)
    }

    fn secrets_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        Some(&mut self.secrets)
    }

    fn apply_computed_values(&mut self, computed: &BTreeMap<String, Value>) {
        copy_value(computed, values::HOST, &mut self.host);
        copy_value(computed, values::PORT, &mut self.port);
        copy_value(computed, values::DATABASE, &mut self.database);
        copy_value(computed, values::USERNAME, &mut self.username);
    }
}

/// Applications.Datastores/mongoDatabases
pub type MongoDatabase = Resource<MongoDatabaseProperties>;

/// Applications.Datastores/redisCaches properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisCacheProperties {
    /// Application, environment and status.
    #[serde(flatten)]
    pub basic: BasicResourceProperties,
    /// Manual or recipe.
    #[serde(default)]
    pub resource_provisioning: ResourceProvisioning,
    /// Recipe selection in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<ResourceRecipe>,
    /// Existing Azure Cache for Redis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Whether TLS is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    /// Secrets supplied with a write request. Held in memory only.
    #[serde(skip)]
    pub secrets: BTreeMap<String, String>,
}

impl ResourceProperties for RedisCacheProperties {
    const RESOURCE_TYPE: &'static str = resource_types::REDIS_CACHES;

    fn basic(&self) -> &BasicResourceProperties {
        &self.basic
    }

    fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        &mut self.basic
    }

    fn recipe(&self) -> Option<ResourceRecipe> {
        recipe_when(self.resource_provisioning, &self.recipe)
    }

    fn secrets_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        Some(&mut self.secrets)
    }

    fn apply_computed_values(&mut self, computed: &BTreeMap<String, Value>) {
        copy_value(computed, values::HOST, &mut self.host);
        copy_value(computed, values::PORT, &mut self.port);
        copy_value(computed, values::USERNAME, &mut self.username);
    }
}

/// Applications.Datastores/redisCaches
pub type RedisCache = Resource<RedisCacheProperties>;

/// Applications.Datastores/sqlDatabases properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlDatabaseProperties {
    /// Application, environment and status.
    #[serde(flatten)]
    pub basic: BasicResourceProperties,
    /// Manual or recipe.
    #[serde(default)]
    pub resource_provisioning: ResourceProvisioning,
    /// Recipe selection in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<ResourceRecipe>,
    /// Existing Azure SQL database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Server host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Secrets supplied with a write request. Held in memory only.
    #[serde(skip)]
    pub secrets: BTreeMap<String, String>,
}

impl ResourceProperties for SqlDatabaseProperties {
    const RESOURCE_TYPE: &'static str = resource_types::SQL_DATABASES;

    fn basic(&self) -> &BasicResourceProperties {
        &self.basic
    }

    fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        &mut self.basic
    }

    fn recipe(&self) -> Option<ResourceRecipe> {
        recipe_when(self.resource_provisioning, &self.recipe)
    }

    fn secrets_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        Some(&mut self.secrets)
    }

    fn apply_computed_values(&mut self, computed: &BTreeMap<String, Value>) {
        copy_value(computed, values::SERVER, &mut self.server);
        copy_value(computed, values::PORT, &mut self.port);
        copy_value(computed, values::DATABASE, &mut self.database);
        copy_value(computed, values::USERNAME, &mut self.username);
    }
}

/// Applications.Datastores/sqlDatabases
pub type SqlDatabase = Resource<SqlDatabaseProperties>;
