//! Canned-response HTTP upstream for client tests, served with axum.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the client under test actually sent.
#[derive(Debug)]
pub(crate) struct CapturedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl CapturedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    body: &'static str,
    required_bearer: Option<&'static str>,
    first_request: Arc<Mutex<Option<oneshot::Sender<CapturedRequest>>>>,
}

async fn respond(
    State(canned): State<Canned>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let authorized = match canned.required_bearer {
        Some(token) => headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            == Some(token),
        None => true,
    };

    if let Some(tx) = canned.first_request.lock().unwrap().take() {
        let _ = tx.send(CapturedRequest {
            path: uri.path().to_string(),
            headers,
            body,
        });
    }

    if authorized {
        (canned.status, [(CONTENT_TYPE, "application/json")], canned.body)
    } else {
        (StatusCode::UNAUTHORIZED, [(CONTENT_TYPE, "application/json")], "{}")
    }
}

/// Serve `body` with `status` for every request on a fresh local port.
///
/// When `required_bearer` is set, requests without that bearer token get a
/// 401 instead. The first request received is delivered through the
/// returned receiver.
pub(crate) async fn serve_canned(
    status: u16,
    body: &'static str,
    required_bearer: Option<&'static str>,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let (tx, rx) = oneshot::channel();
    let canned = Canned {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        required_bearer,
        first_request: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new().fallback(respond).with_state(canned);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), rx)
}
