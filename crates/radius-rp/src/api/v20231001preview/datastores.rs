// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mongo databases, Redis caches and SQL databases.
//!
//! Manual mode accepts either a backing `resource` or explicit connection
//! fields. Secrets are accepted on writes and never returned.

use std::collections::BTreeMap;

use radius_core::datamodel::datastores::values;
use radius_core::datamodel::{self, ProvisioningState, Resource};
use serde::{Deserialize, Serialize};

use super::{
    ProvisioningCheck, Recipe, ResourceStatus, VersionedProperties, basic_properties,
    non_empty, parse_provisioning, provisioning_state_of, recipe_of, status_of,
};
use crate::error::Result;

fn insert_secret(secrets: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        secrets.insert(key.to_string(), value);
    }
}

/// Secrets of a Mongo database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoDatabaseSecrets {
    /// Connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl MongoDatabaseSecrets {
    fn into_map(self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        insert_secret(&mut map, values::CONNECTION_STRING, self.connection_string);
        insert_secret(&mut map, values::PASSWORD, self.password);
        map
    }
}

/// `Applications.Datastores/mongoDatabases` properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoDatabaseProperties {
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Environment ID.
    #[serde(default)]
    pub environment: String,
    /// Application ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// `manual` or `recipe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_provisioning: Option<String>,
    /// Recipe, in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
    /// Backing Cosmos Mongo database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Write-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<MongoDatabaseSecrets>,
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl VersionedProperties for MongoDatabaseProperties {
    type DataModel = datamodel::MongoDatabaseProperties;

    fn convert_to(self) -> Result<Self::DataModel> {
        let mode = parse_provisioning(self.resource_provisioning.as_deref())?;
        let mut check = ProvisioningCheck::new(mode, self.recipe.as_ref());
        if self.resource.is_some() {
            check
                .optional("resource", true)
                .optional("host", self.host.is_some())
                .optional("port", self.port.is_some())
                .optional("database", self.database.is_some());
        } else {
            check
                .required("host", self.host.is_some())
                .required("port", self.port.is_some())
                .required("database", self.database.is_some());
        }
        check
            .optional("username", self.username.is_some())
            .optional("secrets", self.secrets.is_some())
            .finish()?;

        Ok(datamodel::MongoDatabaseProperties {
            basic: basic_properties(self.application, self.environment),
            resource_provisioning: mode,
            recipe: self.recipe.map(Recipe::convert_to),
            resource: self.resource,
            host: self.host,
            port: self.port,
            database: self.database,
            username: self.username,
            secrets: self.secrets.map(MongoDatabaseSecrets::into_map).unwrap_or_default(),
        })
    }

    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self {
        let props = &resource.properties;
        Self {
            provisioning_state: provisioning_state_of(resource.provisioning_state()),
            environment: props.basic.environment.clone(),
            application: non_empty(&props.basic.application),
            resource_provisioning: Some(props.resource_provisioning.as_str().to_string()),
            recipe: recipe_of(&props.recipe),
            resource: props.resource.clone(),
            host: props.host.clone(),
            port: props.port,
            database: props.database.clone(),
            username: props.username.clone(),
            secrets: None,
            status: status_of(&props.basic),
        }
    }
}

/// Secrets of a Redis cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisCacheSecrets {
    /// Connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RedisCacheSecrets {
    fn into_map(self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        insert_secret(&mut map, values::CONNECTION_STRING, self.connection_string);
        insert_secret(&mut map, values::PASSWORD, self.password);
        insert_secret(&mut map, values::URL, self.url);
        map
    }
}

/// `Applications.Datastores/redisCaches` properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisCacheProperties {
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Environment ID.
    #[serde(default)]
    pub environment: String,
    /// Application ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// `manual` or `recipe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_provisioning: Option<String>,
    /// Recipe, in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
    /// Backing Azure Cache for Redis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// TLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    /// Write-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<RedisCacheSecrets>,
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl VersionedProperties for RedisCacheProperties {
    type DataModel = datamodel::RedisCacheProperties;

    fn convert_to(self) -> Result<Self::DataModel> {
        let mode = parse_provisioning(self.resource_provisioning.as_deref())?;
        let mut check = ProvisioningCheck::new(mode, self.recipe.as_ref());
        if self.resource.is_some() {
            check
                .optional("resource", true)
                .optional("host", self.host.is_some())
                .optional("port", self.port.is_some());
        } else {
            check
                .required("host", self.host.is_some())
                .required("port", self.port.is_some());
        }
        check
            .optional("username", self.username.is_some())
            .optional("tls", self.tls.is_some())
            .optional("secrets", self.secrets.is_some())
            .finish()?;

        Ok(datamodel::RedisCacheProperties {
            basic: basic_properties(self.application, self.environment),
            resource_provisioning: mode,
            recipe: self.recipe.map(Recipe::convert_to),
            resource: self.resource,
            host: self.host,
            port: self.port,
            username: self.username,
            tls: self.tls,
            secrets: self.secrets.map(RedisCacheSecrets::into_map).unwrap_or_default(),
        })
    }

    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self {
        let props = &resource.properties;
        Self {
            provisioning_state: provisioning_state_of(resource.provisioning_state()),
            environment: props.basic.environment.clone(),
            application: non_empty(&props.basic.application),
            resource_provisioning: Some(props.resource_provisioning.as_str().to_string()),
            recipe: recipe_of(&props.recipe),
            resource: props.resource.clone(),
            host: props.host.clone(),
            port: props.port,
            username: props.username.clone(),
            tls: props.tls,
            secrets: None,
            status: status_of(&props.basic),
        }
    }
}

/// Secrets of a SQL database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlDatabaseSecrets {
    /// Connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl SqlDatabaseSecrets {
    fn into_map(self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        insert_secret(&mut map, values::CONNECTION_STRING, self.connection_string);
        insert_secret(&mut map, values::PASSWORD, self.password);
        map
    }
}

/// `Applications.Datastores/sqlDatabases` properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlDatabaseProperties {
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Environment ID.
    #[serde(default)]
    pub environment: String,
    /// Application ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// `manual` or `recipe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_provisioning: Option<String>,
    /// Recipe, in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
    /// Backing Azure SQL database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Server host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Write-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<SqlDatabaseSecrets>,
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl VersionedProperties for SqlDatabaseProperties {
    type DataModel = datamodel::SqlDatabaseProperties;

    fn convert_to(self) -> Result<Self::DataModel> {
        let mode = parse_provisioning(self.resource_provisioning.as_deref())?;
        let mut check = ProvisioningCheck::new(mode, self.recipe.as_ref());
        if self.resource.is_some() {
            check
                .optional("resource", true)
                .optional("server", self.server.is_some())
                .optional("database", self.database.is_some());
        } else {
            check
                .required("server", self.server.is_some())
                .required("database", self.database.is_some());
        }
        check
            .optional("port", self.port.is_some())
            .optional("username", self.username.is_some())
            .optional("secrets", self.secrets.is_some())
            .finish()?;

        Ok(datamodel::SqlDatabaseProperties {
            basic: basic_properties(self.application, self.environment),
            resource_provisioning: mode,
            recipe: self.recipe.map(Recipe::convert_to),
            resource: self.resource,
            server: self.server,
            port: self.port,
            database: self.database,
            username: self.username,
            secrets: self.secrets.map(SqlDatabaseSecrets::into_map).unwrap_or_default(),
        })
    }

    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self {
        let props = &resource.properties;
        Self {
            provisioning_state: provisioning_state_of(resource.provisioning_state()),
            environment: props.basic.environment.clone(),
            application: non_empty(&props.basic.application),
            resource_provisioning: Some(props.resource_provisioning.as_str().to_string()),
            recipe: recipe_of(&props.recipe),
            resource: props.resource.clone(),
            server: props.server.clone(),
            port: props.port,
            database: props.database.clone(),
            username: props.username.clone(),
            secrets: None,
            status: status_of(&props.basic),
        }
    }
}
