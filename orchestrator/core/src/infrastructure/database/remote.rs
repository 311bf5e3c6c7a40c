// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote libSQL Engine
//!
//! Talks to a Turso / libSQL server through its stateless HTTP pipeline API.
//! Every call is one `POST` carrying the statements plus a trailing `close`,
//! so no server-side stream is held between requests.
//!
//! # API Endpoints
//!
//! - `POST /v2/pipeline` - execute statements or a conditional batch
//!
//! Transactions are sent as a single batch: `BEGIN`, each statement conditioned
//! on the previous step succeeding, `COMMIT`, and a `ROLLBACK` that only runs
//! when the commit step did not succeed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BackendKind, DatabaseError, SqlConnection, SqlRow, SqlValue, Statement};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteConnection {
    client: Client,
    /// `https://` base URL of the database
    base_url: String,
    token: String,
}

impl RemoteConnection {
    /// Build the client and verify the endpoint and credential with `SELECT 1`.
    pub async fn connect(url: &str, token: &str) -> Result<Self, DatabaseError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DatabaseError::Connection(format!("cannot build HTTP client: {e}")))?;

        let connection = Self {
            client,
            base_url: normalize_url(url),
            token: token.to_string(),
        };

        connection.ping().await.map_err(|e| match e {
            connection_error @ DatabaseError::Connection(_) => connection_error,
            other => DatabaseError::Connection(other.to_string()),
        })?;
        Ok(connection)
    }

    fn pipeline_url(&self) -> String {
        format!("{}/v2/pipeline", self.base_url)
    }

    async fn pipeline(&self, request: StreamRequest<'_>) -> Result<StreamResponse, DatabaseError> {
        let body = PipelineRequest {
            baton: None,
            requests: vec![request, StreamRequest::Close],
        };

        let response = self
            .client
            .post(self.pipeline_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DatabaseError::Connection(format!("remote database unreachable: {e}")))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DatabaseError::Connection(format!(
                    "remote database rejected the credential (HTTP {})",
                    response.status().as_u16()
                )));
            }
            status => {
                let text = response.text().await.unwrap_or_else(|_| format!("HTTP {status}"));
                return Err(DatabaseError::Query(format!("remote database returned {status}: {text}")));
            }
        }

        let parsed: PipelineResponse = response
            .json()
            .await
            .map_err(|e| DatabaseError::Decode(format!("invalid pipeline response: {e}")))?;

        match parsed.results.into_iter().next() {
            Some(StreamResult::Ok { response }) => Ok(response),
            Some(StreamResult::Error { error }) => Err(error.into_database_error()),
            None => Err(DatabaseError::Decode("empty pipeline response".to_string())),
        }
    }

    async fn execute_stmt(&self, statement: &Statement) -> Result<StmtResult, DatabaseError> {
        debug!(sql = %statement.sql, "Remote execute");
        match self
            .pipeline(StreamRequest::Execute { stmt: HranaStmt::from_statement(statement) })
            .await?
        {
            StreamResponse::Execute { result } => Ok(result),
            other => Err(DatabaseError::Decode(format!("unexpected response to execute: {other:?}"))),
        }
    }
}

/// `libsql://host` → `https://host`, trailing slash removed
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    match url.strip_prefix("libsql://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

#[async_trait]
impl SqlConnection for RemoteConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError> {
        Ok(self.execute_stmt(statement).await?.affected_row_count)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, DatabaseError> {
        self.execute_stmt(statement).await?.into_rows()
    }

    async fn transaction(&self, statements: &[Statement]) -> Result<Vec<u64>, DatabaseError> {
        let begin = Statement::new("BEGIN");
        let commit = Statement::new("COMMIT");
        let rollback = Statement::new("ROLLBACK");

        let mut steps = Vec::with_capacity(statements.len() + 3);
        steps.push(BatchStep { condition: None, stmt: HranaStmt::from_statement(&begin) });
        for (offset, statement) in statements.iter().enumerate() {
            steps.push(BatchStep {
                condition: Some(BatchCond::Ok { step: offset }),
                stmt: HranaStmt::from_statement(statement),
            });
        }
        let commit_step = statements.len() + 1;
        steps.push(BatchStep {
            condition: Some(BatchCond::Ok { step: commit_step - 1 }),
            stmt: HranaStmt::from_statement(&commit),
        });
        steps.push(BatchStep {
            condition: Some(BatchCond::Not { cond: Box::new(BatchCond::Ok { step: commit_step }) }),
            stmt: HranaStmt::from_statement(&rollback),
        });

        let request = StreamRequest::Batch { batch: HranaBatch { steps } };
        let result = match self.pipeline(request).await? {
            StreamResponse::Batch { result } => result,
            other => return Err(DatabaseError::Decode(format!("unexpected response to batch: {other:?}"))),
        };

        // The rollback step is the only one allowed to be skipped or fail silently.
        if let Some(error) = result.step_errors.into_iter().take(commit_step + 1).flatten().next() {
            return Err(error.into_database_error());
        }
        let committed = matches!(result.step_results.get(commit_step), Some(Some(_)));
        if !committed {
            return Err(DatabaseError::Query("transaction was not committed".to_string()));
        }

        Ok(result
            .step_results
            .into_iter()
            .skip(1)
            .take(statements.len())
            .map(|r| r.map(|r| r.affected_row_count).unwrap_or(0))
            .collect())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.execute_stmt(&Statement::new("SELECT 1")).await.map(|_| ())
    }

    async fn close(&self) {
        // Stateless HTTP; nothing is held open between pipeline calls.
    }
}

#[derive(Serialize)]
struct PipelineRequest<'a> {
    baton: Option<String>,
    requests: Vec<StreamRequest<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamRequest<'a> {
    Execute { stmt: HranaStmt<'a> },
    Batch { batch: HranaBatch<'a> },
    Close,
}

#[derive(Serialize)]
struct HranaStmt<'a> {
    sql: &'a str,
    args: Vec<HranaValue>,
    want_rows: bool,
}

impl<'a> HranaStmt<'a> {
    fn from_statement(statement: &'a Statement) -> Self {
        Self {
            sql: &statement.sql,
            args: statement.params.iter().map(HranaValue::from).collect(),
            want_rows: true,
        }
    }
}

#[derive(Serialize)]
struct HranaBatch<'a> {
    steps: Vec<BatchStep<'a>>,
}

#[derive(Serialize)]
struct BatchStep<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<BatchCond>,
    stmt: HranaStmt<'a>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum BatchCond {
    Ok { step: usize },
    Not { cond: Box<BatchCond> },
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum HranaValue {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl From<&SqlValue> for HranaValue {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => HranaValue::Null,
            SqlValue::Integer(i) => HranaValue::Integer { value: i.to_string() },
            SqlValue::Real(f) => HranaValue::Float { value: *f },
            SqlValue::Text(s) => HranaValue::Text { value: s.clone() },
            SqlValue::Blob(b) => HranaValue::Blob {
                base64: base64::engine::general_purpose::STANDARD_NO_PAD.encode(b),
            },
        }
    }
}

impl TryFrom<HranaValue> for SqlValue {
    type Error = DatabaseError;

    fn try_from(value: HranaValue) -> Result<Self, Self::Error> {
        Ok(match value {
            HranaValue::Null => SqlValue::Null,
            HranaValue::Integer { value } => SqlValue::Integer(
                value
                    .parse()
                    .map_err(|_| DatabaseError::Decode(format!("invalid integer '{value}'")))?,
            ),
            HranaValue::Float { value } => SqlValue::Real(value),
            HranaValue::Text { value } => SqlValue::Text(value),
            HranaValue::Blob { base64 } => SqlValue::Blob(
                base64::engine::general_purpose::STANDARD_NO_PAD
                    .decode(base64.trim_end_matches('='))
                    .map_err(|e| DatabaseError::Decode(format!("invalid blob: {e}")))?,
            ),
        })
    }
}

#[derive(Deserialize)]
struct PipelineResponse {
    results: Vec<StreamResult>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamResult {
    Ok { response: StreamResponse },
    Error { error: HranaError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamResponse {
    Execute { result: StmtResult },
    Batch { result: BatchResult },
    Close,
}

#[derive(Debug, Deserialize)]
struct StmtResult {
    #[serde(default)]
    cols: Vec<HranaColumn>,
    #[serde(default)]
    rows: Vec<Vec<HranaValue>>,
    #[serde(default)]
    affected_row_count: u64,
}

impl StmtResult {
    fn into_rows(self) -> Result<Vec<SqlRow>, DatabaseError> {
        let columns: Arc<[String]> = self
            .cols
            .into_iter()
            .enumerate()
            .map(|(idx, c)| c.name.unwrap_or_else(|| format!("column{idx}")))
            .collect();
        self.rows
            .into_iter()
            .map(|row| -> Result<SqlRow, DatabaseError> {
                let values = row
                    .into_iter()
                    .map(SqlValue::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SqlRow::new(columns.clone(), values))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct HranaColumn {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    step_results: Vec<Option<StmtResult>>,
    step_errors: Vec<Option<HranaError>>,
}

#[derive(Debug, Deserialize)]
struct HranaError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl HranaError {
    fn into_database_error(self) -> DatabaseError {
        let constraint = self.code.as_deref().is_some_and(|c| c.starts_with("SQLITE_CONSTRAINT"))
            || self.message.to_ascii_lowercase().contains("constraint failed");
        if constraint {
            DatabaseError::Constraint(self.message)
        } else {
            DatabaseError::Query(self.message)
        }
    }
}
