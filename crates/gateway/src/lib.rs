use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::{
    error::GatewayError,
    query::{Filters, Operation, QueryDescriptor, QueryResult},
};

mod rest;
pub use rest::{RestGateway, RestGatewayConfig, SetupError};

/// JSON object sent as an insert body or update patch.
pub type Record = Map<String, Value>;

/// The only seam through which the back office talks to the store.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<QueryResult, GatewayError>;
    async fn count(&self, table: &str, filters: &Filters) -> Result<u64, GatewayError>;
    async fn insert(&self, table: &str, record: &Record) -> Result<Value, GatewayError>;
    async fn update(&self, table: &str, id: &str, changes: &Record)
        -> Result<Value, GatewayError>;
    async fn delete(&self, table: &str, id: &str) -> Result<bool, GatewayError>;
}

pub struct MissingGateway;

fn unavailable(table: &str, operation: Operation) -> GatewayError {
    GatewayError::new(table, operation, "store gateway is unavailable")
}

#[async_trait]
impl Gateway for MissingGateway {
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<QueryResult, GatewayError> {
        Err(unavailable(&descriptor.table, Operation::Query))
    }

    async fn count(&self, table: &str, _filters: &Filters) -> Result<u64, GatewayError> {
        Err(unavailable(table, Operation::Count))
    }

    async fn insert(&self, table: &str, _record: &Record) -> Result<Value, GatewayError> {
        Err(unavailable(table, Operation::Insert))
    }

    async fn update(
        &self,
        table: &str,
        _id: &str,
        _changes: &Record,
    ) -> Result<Value, GatewayError> {
        Err(unavailable(table, Operation::Update))
    }

    async fn delete(&self, table: &str, _id: &str) -> Result<bool, GatewayError> {
        Err(unavailable(table, Operation::Delete))
    }
}

/// Decodes raw rows into a typed schema. A single bad row fails the whole batch so callers
/// never see a partially decoded collection.
pub fn decode_rows<T: DeserializeOwned>(
    table: &str,
    operation: Operation,
    rows: Vec<Value>,
) -> Result<Vec<T>, GatewayError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(row).map_err(|err| {
                GatewayError::new(table, operation, format!("row {index} is malformed: {err}"))
            })
        })
        .collect()
}

/// Runs a descriptor and decodes its rows.
pub async fn fetch<T: DeserializeOwned>(
    gateway: &dyn Gateway,
    descriptor: &QueryDescriptor,
) -> Result<Vec<T>, GatewayError> {
    let result = gateway.query(descriptor).await?;
    decode_rows(&descriptor.table, Operation::Query, result.rows)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
