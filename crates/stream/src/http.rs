//! HTTP-Streaming-Endpunkte
//!
//! - `GET /stream/{sessionId}` – Chunked Opus-Bytestrom
//! - `GET /stream/{sessionId}/pcm` – Chunked s16le-PCM-Bytestrom
//! - `GET /health` – JSON-Diagnose (Status, aktive Streams, Session-IDs)
//!
//! Beide Stream-Endpunkte antworten 404 wenn kein Tap fuer die Session
//! lebt. Ein Client-Disconnect laesst den Antwort-Body fallen; die Wache
//! im [`HoererStrom`](crate::tap::HoererStrom) meldet den Hoerer sofort ab.
//! CORS ist offen, Caching ist deaktiviert.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use hearsay_core::{ScopeId, StreamFormat};

use crate::tap::TapRegister;

// ---------------------------------------------------------------------------
// Zustand & Router
// ---------------------------------------------------------------------------

/// Geteilter Zustand der Streaming-Endpunkte
#[derive(Clone)]
pub struct StreamZustand {
    /// Das Tap-Register (geteilt mit dem Session-Verwalter)
    pub register: TapRegister,
    /// Startzeitpunkt des Servers (fuer die Uptime im Health-Check)
    pub start_zeit: Arc<Instant>,
}

impl StreamZustand {
    /// Erstellt einen neuen Zustand um ein bestehendes Register
    pub fn neu(register: TapRegister) -> Self {
        Self {
            register,
            start_zeit: Arc::new(Instant::now()),
        }
    }
}

/// Axum-Router fuer Streaming- und Diagnose-Endpunkte
pub fn stream_router(zustand: StreamZustand) -> Router {
    Router::new()
        .route("/stream/:session_id", get(opus_stream_handler))
        .route("/stream/:session_id/pcm", get(pcm_stream_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(zustand)
}

// ---------------------------------------------------------------------------
// Stream-Handler
// ---------------------------------------------------------------------------

/// `GET /stream/{sessionId}` – Opus-Bytestrom ab Verbindungszeitpunkt
async fn opus_stream_handler(
    State(zustand): State<StreamZustand>,
    Path(session_id): Path<String>,
) -> Response {
    stream_antwort(&zustand, &session_id, StreamFormat::Opus)
}

/// `GET /stream/{sessionId}/pcm` – Roh-PCM-Bytestrom ab Verbindungszeitpunkt
async fn pcm_stream_handler(
    State(zustand): State<StreamZustand>,
    Path(session_id): Path<String>,
) -> Response {
    stream_antwort(&zustand, &session_id, StreamFormat::Pcm)
}

fn stream_antwort(zustand: &StreamZustand, session_id: &str, format: StreamFormat) -> Response {
    let Ok(scope) = session_id.parse::<ScopeId>() else {
        return kein_stream_antwort(session_id);
    };

    let Some(anschluss) = zustand.register.verbinden(scope, format) else {
        return kein_stream_antwort(session_id);
    };

    tracing::info!(
        scope = %scope,
        format = %format,
        hoerer = %anschluss.id,
        "Stream-Hoerer verbunden"
    );

    let content_type = match format {
        StreamFormat::Opus => "audio/opus",
        StreamFormat::Pcm => "audio/pcm",
    };

    let mut antwort = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from_stream(anschluss.strom),
    )
        .into_response();

    if format == StreamFormat::Pcm {
        // Format-Beschreibung fuer Konsumenten ohne Container
        let headers = antwort.headers_mut();
        headers.insert("x-pcm-sample-rate", header::HeaderValue::from_static("48000"));
        headers.insert("x-pcm-channels", header::HeaderValue::from_static("1"));
        headers.insert("x-pcm-encoding", header::HeaderValue::from_static("s16le"));
    }

    antwort
}

fn kein_stream_antwort(session_id: &str) -> Response {
    tracing::debug!(session_id, "Stream-Anfrage ohne aktiven Tap");
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "no active stream for this session" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Health-Check
// ---------------------------------------------------------------------------

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAntwort {
    pub status: String,
    pub active_stream_count: usize,
    pub session_ids: Vec<u64>,
    pub uptime_seconds: u64,
    pub version: String,
}

/// `GET /health` – gibt den Relay-Status zurueck
async fn health_handler(State(zustand): State<StreamZustand>) -> impl IntoResponse {
    let session_ids: Vec<u64> = zustand
        .register
        .aktive_taps()
        .into_iter()
        .map(|scope| scope.inner())
        .collect();

    let antwort = HealthAntwort {
        status: "ok".to_string(),
        active_stream_count: session_ids.len(),
        session_ids,
        uptime_seconds: zustand.start_zeit.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(antwort))
}

// ---------------------------------------------------------------------------
// Stream-URL-Ableitung
// ---------------------------------------------------------------------------

/// Oeffentliche URL des Opus-Streams einer Session
pub fn stream_url(basis_url: &str, scope: ScopeId) -> String {
    format!("{}/stream/{}", basis_url.trim_end_matches('/'), scope.inner())
}

/// Oeffentliche URL des PCM-Streams einer Session
pub fn pcm_stream_url(basis_url: &str, scope: ScopeId) -> String {
    format!("{}/pcm", stream_url(basis_url, scope))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
