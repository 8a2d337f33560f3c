// # HTTP Listener
//
// Thin axum layer over `ddns_core::UpdateService`:
//
// - `GET /?mode=get|set&hostname=...&hash=...`
// - The peer socket address comes from axum's `ConnectInfo`
// - The configured forwarded-for header is passed through untouched; the
//   core decides whether the peer may assert it
// - `Accept: application/json` selects the JSON body

use anyhow::Result;
use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use ddns_core::{
    ConnectionMeta, Format, ResponseFormatter, UpdateQuery, UpdateResult, UpdateService,
    UpdateStatus,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// How long in-flight requests may run after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    service: Arc<UpdateService>,
    formatter: ResponseFormatter,
    forwarded_header: HeaderName,
}

impl AppState {
    pub fn new(
        service: UpdateService,
        formatter: ResponseFormatter,
        forwarded_header: &str,
    ) -> Result<Self> {
        let forwarded_header = HeaderName::from_bytes(forwarded_header.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid forwarded header '{}': {}", forwarded_header, e))?;

        Ok(Self {
            service: Arc::new(service),
            formatter,
            forwarded_header,
        })
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(update_handler))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests
///
/// Requests still running [`SHUTDOWN_GRACE`] after the signal are dropped.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = tokio::sync::watch::channel(false);
    let mut grace_rx = signalled_rx.clone();

    let server = axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        let _ = signalled_tx.send(true);
    });

    tokio::select! {
        result = server => {
            result.map_err(|e| anyhow::anyhow!("HTTP server terminated unexpectedly: {}", e))?;
            info!("HTTP listener stopped");
        }
        _ = async {
            let _ = grace_rx.wait_for(|signalled| *signalled).await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            warn!("Shutdown grace period of {:?} elapsed, dropping in-flight requests", SHUTDOWN_GRACE);
        }
    }

    drop(signalled_rx);
    Ok(())
}

async fn update_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: Result<Query<UpdateQuery>, QueryRejection>,
) -> Response {
    let format = Format::from_accept(headers.get(ACCEPT).and_then(|v| v.to_str().ok()));

    let result = match query {
        Ok(Query(query)) => {
            let meta = ConnectionMeta {
                peer: peer.ip(),
                forwarded_for: forwarded_for(&headers, &state.forwarded_header),
            };
            state.service.handle(&query, &meta).await
        }
        Err(rejection) => {
            debug!(peer = %peer, "Unparseable query string: {}", rejection);
            UpdateResult {
                status: UpdateStatus::InvalidRequest,
                address: None,
            }
        }
    };

    let formatted = state.formatter.format(&result, format);
    let status =
        StatusCode::from_u16(formatted.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        [(CONTENT_TYPE, formatted.content_type), (CACHE_CONTROL, "no-store")],
        formatted.body,
    )
        .into_response()
}

/// Join every value of the forwarded header, in arrival order
///
/// A value that is not valid text poisons the chain (an empty string), so a
/// trusted proxy's garbage is rejected rather than partially honoured.
fn forwarded_for(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let values: Vec<_> = headers.get_all(name).iter().collect();
    if values.is_empty() {
        return None;
    }

    let joined = values
        .iter()
        .map(|v| v.to_str())
        .collect::<std::result::Result<Vec<&str>, _>>()
        .map(|parts| parts.join(","))
        .unwrap_or_default();
    Some(joined)
}
