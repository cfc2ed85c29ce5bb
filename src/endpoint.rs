//! HTTP endpoint for viewing station data
//!
//! Read-only: every request loads the persisted state through the
//! endpoint's own store handle and renders it. Nothing here writes.
//!
//! Endpoints:
//! - GET /               - HTML page with expandable history/change panels
//! - GET /stations       - All current stations (JSON)
//! - GET /station/{id}   - One station with history and changes (JSON)
//! - GET /health         - Service health check

use serde_json::json;

use crate::logging::{self, Component};
use crate::model::PersistedState;
use crate::store::{KeyValueStore, load_state};
use crate::view::{render_html, station_view, station_views};

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

const CONTENT_JSON: &str = "application/json";
const CONTENT_HTML: &str = "text/html; charset=utf-8";

/// A rendered response, independent of the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl EndpointResponse {
    fn json(status: u16, value: serde_json::Value) -> Self {
        let body = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        EndpointResponse {
            status,
            content_type: CONTENT_JSON,
            body,
        }
    }

    fn html(status: u16, body: String) -> Self {
        EndpointResponse {
            status,
            content_type: CONTENT_HTML,
            body,
        }
    }
}

/// Route a GET request path to a response.
pub fn handle_request(store: &mut dyn KeyValueStore, url: &str) -> EndpointResponse {
    let path = url.split('?').next().unwrap_or("");

    if path == "/health" {
        return handle_health();
    }

    let state = match load_state(store) {
        Ok(state) => state,
        Err(e) => {
            logging::error(Component::Http, None, &format!("failed to load state: {}", e));
            return if path == "/" {
                EndpointResponse::html(503, "<p>❌ Lỗi khi tải dữ liệu!</p>".to_string())
            } else {
                EndpointResponse::json(503, json!({ "error": e.to_string() }))
            };
        }
    };

    if path == "/" {
        handle_page(&state)
    } else if path == "/stations" {
        handle_station_list(&state)
    } else if let Some(id) = path.strip_prefix("/station/") {
        handle_station_query(&state, id)
    } else {
        EndpointResponse::json(
            404,
            json!({
                "error": "Not found",
                "available_endpoints": ["/", "/health", "/stations", "/station/{id}"]
            }),
        )
    }
}

/// Handle /health endpoint
fn handle_health() -> EndpointResponse {
    EndpointResponse::json(
        200,
        json!({
            "status": "ok",
            "service": "rainmon_service",
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

fn handle_page(state: &PersistedState) -> EndpointResponse {
    EndpointResponse::html(200, render_html(&station_views(state), state.last_fetch_timestamp))
}

fn handle_station_list(state: &PersistedState) -> EndpointResponse {
    EndpointResponse::json(
        200,
        json!({
            "lastRainDay": state.last_rain_day,
            "lastFetch": state.last_fetch_timestamp,
            "stations": station_views(state),
        }),
    )
}

/// Handle /station/{id} endpoint
fn handle_station_query(state: &PersistedState, id: &str) -> EndpointResponse {
    match station_view(state, id) {
        Some(view) => EndpointResponse::json(200, json!(view)),
        None => EndpointResponse::json(
            404,
            json!({
                "error": format!("Station {} not found", id),
                "station_id": id
            }),
        ),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

fn to_tiny_http(response: EndpointResponse) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let mut out = tiny_http::Response::from_data(response.body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(response.status));
    if let Ok(header) = tiny_http::Header::from_bytes(&b"Content-Type"[..], response.content_type.as_bytes()) {
        out = out.with_header(header);
    }
    out
}

/// Start HTTP endpoint server on the specified port (blocks)
pub fn start_endpoint_server(port: u16, mut store: Box<dyn KeyValueStore + Send>) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    logging::info(
        Component::Http,
        None,
        &format!("📡 HTTP endpoint listening on http://0.0.0.0:{}", port),
    );

    for request in server.incoming_requests() {
        let response = if *request.method() == tiny_http::Method::Get {
            handle_request(store.as_mut(), request.url())
        } else {
            EndpointResponse::json(405, json!({ "error": "Method not allowed" }))
        };

        if let Err(e) = request.respond(to_tiny_http(response)) {
            logging::warn(Component::Http, None, &format!("Failed to send response: {}", e));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
