use async_trait::async_trait;
use reqwest::{header::CONTENT_RANGE, Client, RequestBuilder, Response};
use serde_json::Value;
use shared::{
    error::{GatewayError, StoreErrorBody},
    query::{Filters, Operation, QueryDescriptor, QueryResult},
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{Gateway, Record};

const REST_PREFIX: &str = "rest/v1/";
const PREFER_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Clone)]
pub struct RestGatewayConfig {
    pub base_url: String,
    pub api_key: String,
    /// Session token of the signed-in admin. Requests fall back to the anon key without it.
    pub access_token: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Gateway speaking the PostgREST dialect of the hosted store.
pub struct RestGateway {
    http: Client,
    rest_root: Url,
    api_key: String,
    bearer: String,
}

impl RestGateway {
    pub fn new(config: RestGatewayConfig) -> Result<Self, SetupError> {
        let mut base = config.base_url.trim().trim_end_matches('/').to_string();
        base.push('/');
        let rest_root = Url::parse(&base)?.join(REST_PREFIX)?;

        let mut builder = Client::builder();
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let bearer = config
            .access_token
            .clone()
            .unwrap_or_else(|| config.api_key.clone());

        Ok(Self {
            http: builder.build()?,
            rest_root,
            api_key: config.api_key,
            bearer,
        })
    }

    pub fn rest_root(&self) -> &Url {
        &self.rest_root
    }

    fn table_url(&self, table: &str, operation: Operation) -> Result<Url, GatewayError> {
        if table.is_empty() || table.contains('/') {
            return Err(GatewayError::new(
                table,
                operation,
                "table name must be a single path segment",
            ));
        }
        self.rest_root
            .join(table)
            .map_err(|err| GatewayError::new(table, operation, err.to_string()))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
    }

    async fn send(
        &self,
        table: &str,
        operation: Operation,
        builder: RequestBuilder,
    ) -> Result<Response, GatewayError> {
        debug!(table, %operation, "store request");
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|err| GatewayError::new(table, operation, format!("transport: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StoreErrorBody>(&raw)
            .ok()
            .and_then(|body| body.describe())
            .unwrap_or_else(|| {
                if raw.trim().is_empty() {
                    format!("store responded with {status}")
                } else {
                    format!("store responded with {status}: {}", raw.trim())
                }
            });
        warn!(table, %operation, %status, "store request rejected");
        Err(GatewayError::new(table, operation, message))
    }

    async fn json_rows(
        table: &str,
        operation: Operation,
        response: Response,
    ) -> Result<Vec<Value>, GatewayError> {
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|err| GatewayError::new(table, operation, format!("invalid body: {err}")))
    }

    async fn single_row(
        table: &str,
        operation: Operation,
        response: Response,
    ) -> Result<Value, GatewayError> {
        Self::json_rows(table, operation, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::new(table, operation, "no row matched"))
    }
}

fn append_filters(url: &mut Url, filters: &Filters) {
    let mut pairs = url.query_pairs_mut();
    for (field, value) in filters {
        pairs.append_pair(field, &format!("eq.{value}"));
    }
}

fn append_id(url: &mut Url, id: &str) {
    url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
}

/// Total from a `Content-Range` header (`0-24/573` or `*/573`). `*` totals yield `None`.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

fn content_range_total(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_range_total)
}

#[async_trait]
impl Gateway for RestGateway {
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<QueryResult, GatewayError> {
        let table = descriptor.table.as_str();
        let mut url = self.table_url(table, Operation::Query)?;
        url.query_pairs_mut()
            .append_pair("select", &descriptor.compact_select());
        append_filters(&mut url, &descriptor.filters);
        {
            let order = descriptor.effective_order();
            let direction = if order.ascending { "asc" } else { "desc" };
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("order", &format!("{}.{direction}", order.field));
            // An explicit window wins over a bare limit.
            match (descriptor.range, descriptor.limit) {
                (Some(range), _) => {
                    pairs.append_pair("offset", &range.from.to_string());
                    pairs.append_pair("limit", &range.len().to_string());
                }
                (None, Some(limit)) => {
                    pairs.append_pair("limit", &limit.to_string());
                }
                (None, None) => {}
            }
        }

        let response = self
            .send(table, Operation::Query, self.http.get(url))
            .await?;
        let count = content_range_total(&response);
        let rows = Self::json_rows(table, Operation::Query, response).await?;
        debug!(table, rows = rows.len(), "store query complete");
        Ok(QueryResult { rows, count })
    }

    async fn count(&self, table: &str, filters: &Filters) -> Result<u64, GatewayError> {
        let mut url = self.table_url(table, Operation::Count)?;
        url.query_pairs_mut().append_pair("select", "*");
        append_filters(&mut url, filters);

        let response = self
            .send(
                table,
                Operation::Count,
                self.http.head(url).header("Prefer", "count=exact"),
            )
            .await?;
        content_range_total(&response).ok_or_else(|| {
            GatewayError::new(table, Operation::Count, "response carried no row total")
        })
    }

    async fn insert(&self, table: &str, record: &Record) -> Result<Value, GatewayError> {
        let url = self.table_url(table, Operation::Insert)?;
        let response = self
            .send(
                table,
                Operation::Insert,
                self.http
                    .post(url)
                    .header("Prefer", PREFER_REPRESENTATION)
                    .json(record),
            )
            .await?;
        Self::single_row(table, Operation::Insert, response).await
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        changes: &Record,
    ) -> Result<Value, GatewayError> {
        let mut url = self.table_url(table, Operation::Update)?;
        append_id(&mut url, id);
        let response = self
            .send(
                table,
                Operation::Update,
                self.http
                    .patch(url)
                    .header("Prefer", PREFER_REPRESENTATION)
                    .json(changes),
            )
            .await?;
        Self::single_row(table, Operation::Update, response).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool, GatewayError> {
        let mut url = self.table_url(table, Operation::Delete)?;
        append_id(&mut url, id);
        let response = self
            .send(
                table,
                Operation::Delete,
                self.http
                    .delete(url)
                    .header("Prefer", PREFER_REPRESENTATION),
            )
            .await?;
        // A bodiless success means the store kept no representation, so nothing matched.
        let raw = response.text().await.map_err(|err| {
            GatewayError::new(table, Operation::Delete, format!("invalid body: {err}"))
        })?;
        if raw.trim().is_empty() {
            return Ok(false);
        }
        let rows: Vec<Value> = serde_json::from_str(&raw).map_err(|err| {
            GatewayError::new(table, Operation::Delete, format!("invalid body: {err}"))
        })?;
        debug!(table, removed = rows.len(), "store delete complete");
        Ok(!rows.is_empty())
    }
}
