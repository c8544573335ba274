//! HTTP front end: static pages and the form submission endpoint.
//!
//! Submissions never touch the store. The endpoint forwards the raw body
//! through a [`DatagramRelay`] and redirects back to `/` whatever the relay
//! outcome. GET routing is independent of submission handling and shares no
//! state with it beyond the immutable router state.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
        HeaderMap, Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::relay::DatagramRelay;

const INDEX_PAGE: &str = "index.html";
const MESSAGE_PAGE: &str = "message.html";
const ERROR_PAGE: &str = "error.html";

#[derive(Clone)]
pub struct AppState {
    relay: DatagramRelay,
    static_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(relay: DatagramRelay, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            relay,
            static_dir: Arc::new(static_dir.into()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/message", get(message_form).post(submit))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// The submission endpoint bound to its listening socket.
pub struct HttpFrontend {
    listener: TcpListener,
    state: AppState,
}

impl HttpFrontend {
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<(), Error> {
        info!("HTTP server started: http://{}", self.local_addr()?);

        let result = axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;

        info!("HTTP server stopped");
        result.map_err(Error::TransportFailure)
    }
}

async fn index(State(state): State<AppState>) -> Response {
    send_page(&state, INDEX_PAGE, StatusCode::OK).await
}

async fn message_form(State(state): State<AppState>) -> Response {
    send_page(&state, MESSAGE_PAGE, StatusCode::OK).await
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    let length = content_length(&headers)?;
    let payload = body.slice(..length.min(body.len()));

    match state.relay.send(&payload).await {
        Ok(sent) => debug!("Relayed {} bytes to {}", sent, state.relay.target()),
        Err(e) => error!("Can't relay message to {}: {}", state.relay.target(), e),
    }

    Ok((StatusCode::FOUND, [(LOCATION, "/")]).into_response())
}

async fn fallback(
    state: State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::POST {
        submit(state, headers, body).await.into_response()
    } else if method == Method::GET || method == Method::HEAD {
        send_static(&state, uri.path()).await
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

fn content_length(headers: &HeaderMap) -> Result<usize, Error> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| Error::BadRequest("missing Content-Length".to_string()))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| Error::BadRequest(format!("invalid Content-Length {:?}", value)))
}

async fn send_page(state: &AppState, name: &str, status: StatusCode) -> Response {
    match tokio::fs::read(state.static_dir.join(name)).await {
        Ok(bytes) => (status, [(CONTENT_TYPE, "text/html")], bytes).into_response(),
        Err(e) => {
            warn!("Page {} unavailable: {}", name, e);
            if status == StatusCode::NOT_FOUND {
                (status, "Not Found").into_response()
            } else {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn send_static(state: &AppState, path: &str) -> Response {
    let relative = Path::new(path.trim_start_matches('/'));
    let is_plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));

    if is_plain && relative.components().next().is_some() {
        let file = state.static_dir.join(relative);
        let is_file = tokio::fs::metadata(&file)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        if is_file {
            match tokio::fs::read(&file).await {
                Ok(bytes) => {
                    return (StatusCode::OK, [(CONTENT_TYPE, content_type(&file))], bytes)
                        .into_response();
                }
                Err(e) => warn!("Failed to read {}: {}", file.display(), e),
            }
        }
    }

    send_page(state, ERROR_PAGE, StatusCode::NOT_FOUND).await
}

fn content_type(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("text/plain")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use tokio::net::UdpSocket;

    fn static_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")
    }

    fn state_for(relay: SocketAddr) -> AppState {
        AppState::new(DatagramRelay::new(relay), static_dir())
    }

    fn unused_relay() -> AppState {
        state_for("127.0.0.1:9".parse().unwrap())
    }

    fn form_headers(len: usize) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, len.to_string().parse().unwrap());
        headers
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn post_relays_body_and_redirects() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let state = state_for(receiver.local_addr().unwrap());
        let body = Bytes::from_static(b"name=Alice&msg=Hi+there");

        let response = submit(State(state), form_headers(body.len()), body)
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/");

        let mut buf = [0u8; 128];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"name=Alice&msg=Hi+there");
    }

    #[tokio::test]
    async fn post_redirects_even_when_relay_send_fails() {
        let state = state_for("255.255.255.255:5000".parse().unwrap());
        let body = Bytes::from_static(b"a=1");

        let response = submit(State(state), form_headers(3), body)
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/");
    }

    #[tokio::test]
    async fn post_without_content_length_is_bad_request() {
        let response = submit(State(unused_relay()), HeaderMap::new(), Bytes::from_static(b"a=1"))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_with_unparsable_content_length_is_bad_request() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "ten".parse().unwrap());

        let response = submit(State(unused_relay()), headers, Bytes::from_static(b"a=1"))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_to_any_path_is_a_submission() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let state = state_for(receiver.local_addr().unwrap());

        let response = fallback(
            State(state),
            Method::POST,
            Uri::from_static("/contact"),
            form_headers(5),
            Bytes::from_static(b"x=abc"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"x=abc");
    }

    #[tokio::test]
    async fn index_and_message_pages_are_served() {
        let index = index(State(unused_relay())).await;
        assert_eq!(index.status(), StatusCode::OK);
        assert_eq!(index.headers()[CONTENT_TYPE], "text/html");

        let form = message_form(State(unused_relay())).await;
        assert_eq!(form.status(), StatusCode::OK);
        assert!(body_text(form).await.contains("<form"));
    }

    #[tokio::test]
    async fn static_file_gets_type_from_extension() {
        let response = send_static(&unused_relay(), "/style.css").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/css");
    }

    #[tokio::test]
    async fn unknown_path_returns_error_page() {
        let expected = std::fs::read_to_string(static_dir().join(ERROR_PAGE)).unwrap();

        let response = send_static(&unused_relay(), "/no/such/file.txt").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, expected);
    }

    #[tokio::test]
    async fn parent_directory_escape_is_not_served() {
        let response = send_static(&unused_relay(), "/../Cargo.toml").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directories_are_not_served() {
        let dir = std::env::temp_dir().join(format!("form-relay-http-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join(ERROR_PAGE), "gone").unwrap();
        let state = AppState::new(DatagramRelay::new("127.0.0.1:9".parse().unwrap()), &dir);

        let response = send_static(&state, "/sub").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "gone");
    }

    #[test]
    fn unknown_extension_defaults_to_plain_text() {
        assert_eq!(content_type(Path::new("notes.nosuchext")), "text/plain");
        assert_eq!(content_type(Path::new("README")), "text/plain");
        assert_eq!(content_type(Path::new("logo.PNG")), "image/png");
        assert_eq!(content_type(Path::new("site/style.css")), "text/css");
    }
}
