use crate::backend::BackendClient;
use crate::config::RelayConfig;
use crate::controller::{Controller, RequestState};
use crate::format::format_response;
use askama::Template;
use axum::{
    Json, Router,
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;

pub struct AppState {
    pub controller: Controller,
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: RelayConfig) -> Result<(), WebError> {
    let endpoint = config.resolved_endpoint();
    let state = Arc::new(AppState {
        controller: Controller::new(BackendClient::new(endpoint.clone())),
    });
    let router = build_router(state);
    info!(%config.addr, backend = %endpoint, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ask", post(ask_html))
        .route("/api/ask", post(api_ask))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct AskForm {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    prompt: String,
}

async fn home() -> impl IntoResponse {
    render_page(PageTemplate::idle())
}

async fn ask_html(
    State(state): State<SharedState>,
    Form(form): Form<AskForm>,
) -> impl IntoResponse {
    let outcome = state.controller.submit(&form.prompt).await;
    render_page(PageTemplate::settled(form.prompt, &outcome))
}

async fn api_ask(
    State(state): State<SharedState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.controller.submit(&request.prompt).await {
        RequestState::Succeeded(text) => Ok(Json(json!({ "response": text }))),
        RequestState::Failed(message) => Err(ApiError::bad_gateway(message)),
        RequestState::Loading | RequestState::Idle => {
            Err(ApiError::conflict("A request is already in flight."))
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "assistant-relay" }))
}

fn render_page(template: PageTemplate) -> Html<String> {
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(err.to_string())),
    )
}

fn render_error_page(message: String) -> String {
    let message = crate::format::escape_html(&message);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head><meta charset="utf-8" /><title>Assistant Relay • Error</title></head>
  <body>
    <h1>Something went wrong</h1>
    <p>{message}</p>
    <a href="/">Back to the form</a>
  </body>
</html>"#
    )
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Assistant Relay</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="bg-gray-50 text-gray-900">
    <main class="min-h-screen flex flex-col items-center justify-center p-4">
      <h1 class="text-2xl font-bold mb-4">Assistant Relay</h1>
      <form method="post" action="/ask" class="flex flex-col gap-4 w-full max-w-md">
        <input
          type="text"
          name="prompt"
          class="border rounded px-3 py-2"
          placeholder="Enter your prompt..."
          value="{{ prompt }}"
          required
        />
        <button
          type="submit"
          class="bg-blue-600 text-white px-4 py-2 rounded hover:bg-blue-700 disabled:opacity-50"
          {% if loading %}disabled{% endif %}
        >
          {% if loading %}Loading...{% else %}Send{% endif %}
        </button>
      </form>
      {% if response_html.is_some() %}
      <div class="mt-6 p-4 bg-white rounded shadow w-full max-w-md">
        <h2 class="font-semibold mb-2">Response:</h2>
        <div class="whitespace-pre-wrap break-words text-gray-800">{{ response_html.as_ref().unwrap()|safe }}</div>
      </div>
      {% endif %}
      {% if error.is_some() %}
      <div class="mt-6 p-4 bg-red-100 text-red-700 rounded w-full max-w-md">
        <strong>Error:</strong> {{ error.as_ref().unwrap() }}
      </div>
      {% endif %}
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct PageTemplate {
    prompt: String,
    loading: bool,
    response_html: Option<String>,
    error: Option<String>,
}

impl PageTemplate {
    fn idle() -> Self {
        Self {
            prompt: String::new(),
            loading: false,
            response_html: None,
            error: None,
        }
    }

    /// The `safe` filter in the template only ever sees the output of
    /// `Formatted::to_html`, which escapes text runs itself.
    fn settled(prompt: String, outcome: &RequestState) -> Self {
        Self {
            prompt,
            loading: outcome.is_loading(),
            response_html: outcome.response().map(|raw| format_response(raw).to_html()),
            error: outcome.error().map(|message| message.to_string()),
        }
    }
}
