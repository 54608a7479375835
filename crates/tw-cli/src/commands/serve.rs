//! HTTP server exposing health, migration status, and streamed queries

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tw_core::{FrameFormat, MigrationSet, MigrationTarget, StreamConfig};
use tw_db::Database;
use tw_migrate::Migrator;
use tw_stream::{read_body, relay_query, ChannelResponse, ChannelSink, RelayOptions, StreamError};

use crate::cli::{GlobalArgs, ServeArgs};
use crate::context::RuntimeContext;

/// State shared across all handlers
pub(crate) struct AppState {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) steps: MigrationSet,
    pub(crate) target_id: String,
    pub(crate) stream: StreamConfig,
}

impl AppState {
    fn from_context(ctx: RuntimeContext) -> Self {
        let target_id = ctx.config.target_id().to_string();
        Self {
            db: ctx.db,
            steps: ctx.steps,
            target_id,
            stream: ctx.config.stream,
        }
    }

    fn migrator(&self) -> Migrator<'_> {
        Migrator::new(self.db.as_ref(), &self.steps, self.target_id.as_str())
    }
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let host = args
        .host
        .clone()
        .unwrap_or_else(|| ctx.config.server.host.clone());
    let port = args.port.unwrap_or(ctx.config.server.port);

    if ctx.config.server.migrate_on_start {
        let outcome = ctx
            .migrator()
            .migrate_to(&MigrationTarget::Latest)
            .await
            .context("Startup migration failed")?;
        println!(
            "Migrations: '{}' at position {} ({} step(s) applied)",
            outcome.target_id,
            outcome.to_index,
            outcome.applied.len()
        );
    }

    let app = router(Arc::new(AppState::from_context(ctx)));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("Invalid host:port")?;

    println!("Serving at http://{host}:{port}");
    println!("Press Ctrl+C to stop.\n");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {host}:{port}"))?;
    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/migrations", get(migrations))
        .route("/query", post(query))
        .with_state(state)
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// GET /migrations
async fn migrations(State(state): State<Arc<AppState>>) -> Response {
    match state.migrator().status().await {
        Ok(status) => match serde_json::to_string(&status) {
            Ok(json) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
                .into_response(),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryParams {
    format: Option<String>,
}

/// POST /query?format=csv|ndjson
///
/// The request body is the SQL text. The result is streamed back in the
/// requested frame format.
async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let format = match params.format.as_deref().map(str::parse::<FrameFormat>) {
        None => FrameFormat::default(),
        Some(Ok(format)) => format,
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let raw = match read_body(
        body.into_data_stream(),
        state.stream.max_body_bytes,
        declared_len,
    )
    .await
    {
        Ok(raw) => raw,
        Err(e @ StreamError::Oversize { .. }) => {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
        }
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let sql = match String::from_utf8(raw.to_vec()) {
        Ok(sql) if !sql.trim().is_empty() => sql,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "empty query".to_string()),
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "query is not valid UTF-8".to_string())
        }
    };

    stream_result(&state, sql, format).await
}

/// Start the relay and answer with its header once the first bytes are ready.
async fn stream_result(state: &AppState, sql: String, format: FrameFormat) -> Response {
    let (sink, ChannelResponse { header, body }) = ChannelSink::new(state.stream.channel_capacity);
    let options = RelayOptions::from_config(&state.stream, format);
    let relay = tokio::spawn(relay_query(state.db.clone(), sql, options, sink));

    let head = match header.await {
        Ok(head) => head,
        Err(_) => {
            // The relay gave up before declaring a header.
            let (status, message) = match relay.await {
                Ok(Err(e @ StreamError::Query(_))) => (StatusCode::BAD_REQUEST, e.to_string()),
                Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                Ok(Ok(_)) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "result stream ended without a header".to_string(),
                ),
                Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            };
            return error_response(status, message);
        }
    };

    tokio::spawn(async move {
        match relay.await {
            Ok(Ok(summary)) => log::debug!(
                "Streamed {} row(s) in {} write(s)",
                summary.rows,
                summary.flushes
            ),
            Ok(Err(e)) => log::warn!("Query stream aborted: {e}"),
            Err(e) => log::warn!("Query relay task failed: {e}"),
        }
    });

    let status = StatusCode::from_u16(head.status).unwrap_or(StatusCode::OK);
    (
        status,
        [(header::CONTENT_TYPE, head.content_type)],
        Body::from_stream(ReceiverStream::new(body)),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "error": message }).to_string(),
    )
        .into_response()
}

#[cfg(test)]
#[path = "serve_test.rs"]
mod tests;
