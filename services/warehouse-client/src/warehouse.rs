//! Warehouse SQL API client
//!
//! Submits one statement per call to `/api/v2/statements`, presenting the
//! user's access token as an OAuth bearer credential. Optional `warehouse`
//! and `role` are passed through unmodified; config defaults fill them only
//! when the caller sends none.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::WarehouseConfig;
use crate::error::{Error, Result};

/// Slack on top of the server-side statement timeout, so the warehouse's own
/// timeout response arrives before we give up on the socket.
const RESPONSE_MARGIN: Duration = Duration::from_secs(10);

/// Statement submitted by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementRequest {
    pub sql: String,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Rows returned by a completed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementResult {
    pub statement_handle: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
}

#[derive(Deserialize)]
struct ColumnType {
    name: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "statementHandle")]
    statement_handle: Option<String>,
}

#[derive(Clone)]
pub struct WarehouseClient {
    http: reqwest::Client,
    base_url: String,
    default_warehouse: Option<String>,
    default_role: Option<String>,
    statement_timeout_secs: u64,
}

impl WarehouseClient {
    pub fn new(http: reqwest::Client, config: &WarehouseConfig) -> Self {
        Self {
            http,
            base_url: config.base_url(),
            default_warehouse: config.default_warehouse.clone(),
            default_role: config.default_role.clone(),
            statement_timeout_secs: config.statement_timeout_secs,
        }
    }

    /// Upper bound on one statement call. Replaces the shared client's
    /// timeout, which is sized for the token endpoint.
    fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs) + RESPONSE_MARGIN
    }

    /// Run one statement as the token's user.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn execute(&self, access_token: &str, request: &StatementRequest) -> Result<StatementResult> {
        let request_id = uuid::Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let body = SubmitBody {
            statement: &request.sql,
            timeout: self.statement_timeout_secs,
            warehouse: request.warehouse.as_deref().or(self.default_warehouse.as_deref()),
            role: request.role.as_deref().or(self.default_role.as_deref()),
        };

        let response = self
            .http
            .post(format!("{}/api/v2/statements", self.base_url))
            .query(&[("requestId", request_id.to_string())])
            .bearer_auth(access_token)
            .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.response_timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "warehouse unreachable");
                Error::Request(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Request(format!("reading response: {e}")))?;

        if status == reqwest::StatusCode::ACCEPTED {
            let pending: ErrorBody = serde_json::from_str(&text)
                .map_err(|e| Error::InvalidResponse(e.to_string()))?;
            return Err(Error::Pending {
                statement_handle: pending.statement_handle.unwrap_or_default(),
            });
        }

        if !status.is_success() {
            let parsed = serde_json::from_str::<ErrorBody>(&text).ok();
            let (code, message) = match parsed {
                Some(b) => (b.code, b.message.unwrap_or_else(|| text.clone())),
                None => (None, text),
            };
            warn!(status = status.as_u16(), code = ?code, "warehouse rejected statement");
            return Err(Error::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let parsed: SubmitResponse =
            serde_json::from_str(&text).map_err(|e| Error::InvalidResponse(e.to_string()))?;
        let columns = parsed
            .result_set_meta_data
            .map(|m| m.row_type.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();

        info!(rows = parsed.data.len(), "statement completed");
        Ok(StatementResult {
            statement_handle: parsed.statement_handle,
            columns,
            rows: parsed.data,
        })
    }
}
