use crate::backend::{BackendClient, BackendError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

pub const NO_RESPONSE_MESSAGE: &str = "No response from backend.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Lifecycle of one prompt round. Exactly one of the terminal variants
/// carries a payload; `Loading` carries nothing, so stale output from a
/// previous round can never render while a request is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Loading,
    Succeeded(String),
    Failed(String),
}

impl RequestState {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            RequestState::Succeeded(text) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Drives the request lifecycle: one backend call per submit, with at most
/// one round logically in flight.
pub struct Controller {
    client: BackendClient,
    state: Mutex<RequestState>,
    in_flight: AtomicBool,
}

impl Controller {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            state: Mutex::new(RequestState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state.lock().clone()
    }

    /// Runs one round: clears the previous outcome, issues the backend call,
    /// and settles into `Succeeded` or `Failed`.
    ///
    /// While a round is outstanding this is inert: the current `Loading`
    /// snapshot is returned and no second request is issued. The in-flight
    /// flag is cleared on every terminal transition, including transport
    /// failure, so the next submit is always accepted after settlement.
    pub async fn submit(&self, prompt: &str) -> RequestState {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return self.state.lock().clone();
        }
        *self.state.lock() = RequestState::Loading;
        info!(endpoint = self.client.endpoint(), "submitting prompt");

        let outcome = match self.client.ask(prompt).await {
            Ok(body) => classify(&body),
            Err(err) => RequestState::Failed(transport_message(&err)),
        };

        *self.state.lock() = outcome.clone();
        self.in_flight.store(false, Ordering::Release);
        outcome
    }
}

/// Maps a settled response body onto a terminal state.
///
/// A body that is not JSON is the designed plain-text success, not a failure.
/// When several recognized keys are present, `response` wins, then
/// `messages`, then `error`; a JSON body with none of the three is the fixed
/// no-response failure.
pub fn classify(body: &str) -> RequestState {
    let Ok(data) = serde_json::from_str::<Value>(body) else {
        return RequestState::Succeeded(body.to_string());
    };
    if let Some(response) = data.get("response").and_then(Value::as_str) {
        return RequestState::Succeeded(response.to_string());
    }
    if let Some(messages) = data.get("messages").filter(|value| !value.is_null()) {
        let pretty = serde_json::to_string_pretty(messages)
            .unwrap_or_else(|_| messages.to_string());
        return RequestState::Succeeded(pretty);
    }
    if let Some(error) = data.get("error").and_then(Value::as_str) {
        return RequestState::Failed(error.to_string());
    }
    RequestState::Failed(NO_RESPONSE_MESSAGE.to_string())
}

fn transport_message(err: &BackendError) -> String {
    let message = err.to_string();
    if message.is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, extract::State, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    async fn spawn_backend(body: &'static str) -> String {
        let app = Router::new().route("/", post(move || async move { body }));
        serve_app(app).await
    }

    async fn serve_app(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test backend");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test backend");
        });
        format!("http://{addr}/")
    }

    async fn one_round(body: &'static str) -> RequestState {
        let endpoint = spawn_backend(body).await;
        let controller = Controller::new(BackendClient::new(endpoint));
        controller.submit("hello").await
    }

    #[tokio::test]
    async fn response_field_succeeds() {
        let state = one_round(r#"{"response":"hello"}"#).await;
        assert_eq!(state, RequestState::Succeeded("hello".to_string()));
    }

    #[tokio::test]
    async fn messages_field_is_pretty_printed() {
        let state = one_round(r#"{"messages":[{"role":"user","text":"hi"}]}"#).await;
        let expected = serde_json::to_string_pretty(
            &serde_json::json!([{"role": "user", "text": "hi"}]),
        )
        .unwrap();
        assert_eq!(state, RequestState::Succeeded(expected));
    }

    #[tokio::test]
    async fn error_field_fails_verbatim() {
        let state = one_round(r#"{"error":"bad request"}"#).await;
        assert_eq!(state, RequestState::Failed("bad request".to_string()));
    }

    #[tokio::test]
    async fn non_json_body_is_plain_text_success() {
        let state = one_round("not json at all").await;
        assert_eq!(state, RequestState::Succeeded("not json at all".to_string()));
    }

    #[tokio::test]
    async fn unrecognized_json_shape_is_fixed_failure() {
        let state = one_round(r#"{"foo":"bar"}"#).await;
        assert_eq!(state, RequestState::Failed(NO_RESPONSE_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn response_wins_over_error() {
        let state = one_round(r#"{"response":"ok","error":"ignored"}"#).await;
        assert_eq!(state, RequestState::Succeeded("ok".to_string()));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_a_message() {
        // Port 9 (discard) is never bound here; connection is refused.
        let controller = Controller::new(BackendClient::new("http://127.0.0.1:9/"));
        let state = controller.submit("hello").await;
        match state {
            RequestState::Failed(message) => assert!(!message.is_empty()),
            other => panic!("expected transport failure, got {other:?}"),
        }
        // Settlement re-enables the trigger even after a transport failure.
        assert!(!controller.state().is_loading());
    }

    #[tokio::test]
    async fn resubmit_while_loading_is_inert() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    r#"{"response":"slow"}"#
                }),
            )
            .with_state(hits.clone());
        let endpoint = serve_app(app).await;

        let controller = Arc::new(Controller::new(BackendClient::new(endpoint)));
        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit("first").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = controller.submit("second").await;
        assert_eq!(second, RequestState::Loading);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let settled = first.await.expect("first round task");
        assert_eq!(settled, RequestState::Succeeded("slow".to_string()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // A fresh submit goes through once the first round has settled.
        let third = controller.submit("third").await;
        assert_eq!(third, RequestState::Succeeded("slow".to_string()));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn classify_prefers_messages_over_error() {
        let state = classify(r#"{"messages":[1,2],"error":"ignored"}"#);
        assert!(matches!(state, RequestState::Succeeded(_)));
    }

    #[test]
    fn classify_treats_null_messages_as_absent() {
        let state = classify(r#"{"messages":null,"error":"real problem"}"#);
        assert_eq!(state, RequestState::Failed("real problem".to_string()));
    }
}
