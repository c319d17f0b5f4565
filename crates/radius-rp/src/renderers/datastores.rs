// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mongo, Redis and SQL renderers.
//!
//! Manually provisioned datastores either point at an existing Azure
//! resource through `resource`, or describe the connection with plain
//! values. Azure resources are tracked but never owned: their output
//! resources are unmanaged, computed values are read from the deployed body
//! and secrets come from provider actions.

use radius_core::ResourceId;
use radius_core::datamodel::datastores::values;
use radius_core::datamodel::{
    AnyResource, ArmIdentity, ComputedValueReference, OutputResource, ResourceIdentity,
    ResourceProperties, ResourceType, SecretValueReference, kinds, local_ids, providers,
};
use serde_json::Value;

use super::{
    RenderOptions, Renderer, RendererOutput, application_name, invalid_model,
    parse_resource_field, recipe_data, secret_values,
};
use crate::error::Result;

const REDIS_TYPE: &str = "Microsoft.Cache/redis";
const REDIS_API_VERSION: &str = "2022-06-01";
const MONGO_TYPE: &str = "Microsoft.DocumentDB/databaseAccounts/mongodbDatabases";
const COSMOS_API_VERSION: &str = "2023-04-15";
const SQL_TYPE: &str = "Microsoft.Sql/servers/databases";
const SQL_API_VERSION: &str = "2021-11-01";
const SQL_PORT: i32 = 1433;

fn azure_output(local_id: &str, kind: &str, id: &ResourceId, api_version: &str) -> OutputResource {
    OutputResource::new(local_id, ResourceType::new(kind, providers::AZURE), Value::Null)
        .with_identity(ResourceIdentity::Arm(ArmIdentity {
            id: id.to_string(),
            api_version: api_version.to_string(),
        }))
        .unmanaged()
}

fn insert_value<T: Into<Value> + Clone>(output: &mut RendererOutput, key: &str, value: &Option<T>) {
    if let Some(v) = value {
        output
            .computed_values
            .insert(key.to_string(), ComputedValueReference::value(v.clone()));
    }
}

fn recipe_output<P: ResourceProperties>(properties: &P) -> Result<Option<RendererOutput>> {
    application_name(&properties.basic().application)?;
    Ok(properties.recipe().map(|recipe| RendererOutput {
        recipe_data: Some(recipe_data(recipe)),
        ..Default::default()
    }))
}

/// Renders `Applications.Datastores/redisCaches`.
#[derive(Debug, Default)]
pub struct RedisCacheRenderer;

impl Renderer for RedisCacheRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::RedisCache(r) = resource else {
            return Err(invalid_model());
        };
        if let Some(output) = recipe_output(&r.properties)? {
            return Ok(output);
        }
        let props = &r.properties;
        let mut output = RendererOutput::default();

        if props.resource.is_some() {
            let id = parse_resource_field(props.resource.as_deref(), REDIS_TYPE, "an Azure Redis Cache")?;
            output.resources.push(azure_output(
                local_ids::AZURE_REDIS,
                kinds::AZURE_REDIS,
                &id,
                REDIS_API_VERSION,
            ));
            output.computed_values.insert(
                values::HOST.to_string(),
                ComputedValueReference::pointer(local_ids::AZURE_REDIS, "/properties/hostName"),
            );
            output.computed_values.insert(
                values::PORT.to_string(),
                ComputedValueReference::pointer(local_ids::AZURE_REDIS, "/properties/sslPort"),
            );
            output.secret_values.insert(
                values::PASSWORD.to_string(),
                SecretValueReference::new(local_ids::AZURE_REDIS, "listKeys", "/primaryKey"),
            );
            output.secret_values.insert(
                values::CONNECTION_STRING.to_string(),
                SecretValueReference::new(local_ids::AZURE_REDIS, "listKeys", "/primaryKey")
                    .with_transformer(ResourceType::new(kinds::AZURE_REDIS, providers::AZURE)),
            );
        }

        insert_value(&mut output, values::HOST, &props.host);
        insert_value(&mut output, values::PORT, &props.port);
        insert_value(&mut output, values::USERNAME, &props.username);
        insert_value(&mut output, "tls", &props.tls);
        secret_values(&r.tracked.resource_type, r.name(), options, &props.secrets, &mut output);
        Ok(output)
    }
}

/// Renders `Applications.Datastores/mongoDatabases`.
#[derive(Debug, Default)]
pub struct MongoDatabaseRenderer;

impl Renderer for MongoDatabaseRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::MongoDatabase(r) = resource else {
            return Err(invalid_model());
        };
        if let Some(output) = recipe_output(&r.properties)? {
            return Ok(output);
        }
        let props = &r.properties;
        let mut output = RendererOutput::default();

        if props.resource.is_some() {
            let database = parse_resource_field(
                props.resource.as_deref(),
                MONGO_TYPE,
                "an Azure CosmosDB Mongo Database resource",
            )?;
            let account = database.truncate();
            output.resources.push(azure_output(
                local_ids::AZURE_COSMOS_ACCOUNT,
                kinds::AZURE_COSMOS_ACCOUNT,
                &account,
                COSMOS_API_VERSION,
            ));
            output.resources.push(
                azure_output(
                    local_ids::AZURE_COSMOS_DB_MONGO,
                    kinds::AZURE_COSMOS_DB_MONGO,
                    &database,
                    COSMOS_API_VERSION,
                )
                .depends_on(local_ids::AZURE_COSMOS_ACCOUNT),
            );
            output.computed_values.insert(
                values::DATABASE.to_string(),
                ComputedValueReference::value(database.name()),
            );
            output.secret_values.insert(
                values::CONNECTION_STRING.to_string(),
                SecretValueReference::new(
                    local_ids::AZURE_COSMOS_ACCOUNT,
                    "listConnectionStrings",
                    "/connectionStrings/0/connectionString",
                ),
            );
        }

        insert_value(&mut output, values::HOST, &props.host);
        insert_value(&mut output, values::PORT, &props.port);
        insert_value(&mut output, values::DATABASE, &props.database);
        insert_value(&mut output, values::USERNAME, &props.username);
        secret_values(&r.tracked.resource_type, r.name(), options, &props.secrets, &mut output);
        Ok(output)
    }
}

/// Renders `Applications.Datastores/sqlDatabases`.
#[derive(Debug, Default)]
pub struct SqlDatabaseRenderer;

impl Renderer for SqlDatabaseRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::SqlDatabase(r) = resource else {
            return Err(invalid_model());
        };
        if let Some(output) = recipe_output(&r.properties)? {
            return Ok(output);
        }
        let props = &r.properties;
        let mut output = RendererOutput::default();

        if props.resource.is_some() {
            let database =
                parse_resource_field(props.resource.as_deref(), SQL_TYPE, "an Azure SQL Database")?;
            let server = database.truncate();
            output.resources.push(azure_output(
                local_ids::AZURE_SQL_DATABASE,
                kinds::AZURE_SQL_DATABASE,
                &database,
                SQL_API_VERSION,
            ));
            output.computed_values.insert(
                values::SERVER.to_string(),
                ComputedValueReference::value(format!("{}.database.windows.net", server.name())),
            );
            output.computed_values.insert(
                values::DATABASE.to_string(),
                ComputedValueReference::value(database.name()),
            );
            output.computed_values.insert(
                values::PORT.to_string(),
                ComputedValueReference::value(SQL_PORT),
            );
        }

        insert_value(&mut output, values::SERVER, &props.server);
        insert_value(&mut output, values::PORT, &props.port);
        insert_value(&mut output, values::DATABASE, &props.database);
        insert_value(&mut output, values::USERNAME, &props.username);
        secret_values(&r.tracked.resource_type, r.name(), options, &props.secrets, &mut output);
        Ok(output)
    }
}
