//! Shared utilities for integration testing: a programmable mock CAD
//! backend and a bridge running on an ephemeral port.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use cad_bridge::config::BridgeConfig;
use cad_bridge::multipart::{self, RawPart};
use cad_bridge::{HttpServer, Shutdown};

/// One request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub content_type: String,
    pub fields: Vec<RawPart>,
}

impl Captured {
    pub fn field(&self, name: &str) -> Option<&RawPart> {
        self.fields.iter().find(|f| f.name() == Some(name))
    }
}

/// What the mock backend answers.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl MockReply {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".into()),
            content_disposition: None,
            body: serde_json::to_vec(&value).unwrap(),
        }
    }

    pub fn text(status: u16, text: &str) -> Self {
        Self {
            status,
            content_type: Some("text/plain".into()),
            content_disposition: None,
            body: text.as_bytes().to_vec(),
        }
    }

    pub fn multipart(parts: &[RawPart]) -> Self {
        let boundary = "mock-cad-boundary";
        Self {
            status: 200,
            content_type: Some(format!("multipart/mixed; boundary={boundary}")),
            content_disposition: None,
            body: multipart::encode(parts, boundary),
        }
    }

    pub fn raw(content_type: &str, body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            content_disposition: None,
            body: body.to_vec(),
        }
    }

    pub fn with_disposition(mut self, disposition: &str) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }
}

/// Build a part for a multipart reply.
pub fn part(content_type: &str, disposition: &str, payload: &[u8]) -> RawPart {
    RawPart::new(
        vec![
            ("Content-Type".to_string(), content_type.to_string()),
            ("Content-Disposition".to_string(), disposition.to_string()),
        ],
        payload.to_vec(),
    )
}

type ReplyFn = dyn Fn(&Captured) -> MockReply + Send + Sync;

struct MockInner {
    reply: Box<ReplyFn>,
    captured: Mutex<Vec<Captured>>,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    inner: Arc<MockInner>,
}

impl MockUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn captured(&self) -> Vec<Captured> {
        self.inner.captured.lock().unwrap().clone()
    }
}

/// Start a mock backend that answers every request with `reply`.
pub async fn start_mock_upstream<F>(reply: F) -> MockUpstream
where
    F: Fn(&Captured) -> MockReply + Send + Sync + 'static,
{
    let inner = Arc::new(MockInner {
        reply: Box::new(reply),
        captured: Mutex::new(Vec::new()),
    });

    let app = Router::new().fallback(mock_handler).with_state(inner.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, inner }
}

async fn mock_handler(State(inner): State<Arc<MockInner>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let fields = if multipart::is_multipart(&content_type) {
        multipart::parse(&body, &content_type).unwrap()
    } else {
        Vec::new()
    };

    let captured = Captured {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        content_type,
        fields,
    };
    let reply = (inner.reply)(&captured);
    inner.captured.lock().unwrap().push(captured);

    let mut builder = Response::builder().status(reply.status);
    if let Some(ct) = &reply.content_type {
        builder = builder.header(CONTENT_TYPE, ct);
    }
    if let Some(cd) = &reply.content_disposition {
        builder = builder.header(CONTENT_DISPOSITION, cd);
    }
    builder.body(Body::from(reply.body)).unwrap()
}

/// A bridge served on an ephemeral port with its own workspace root.
pub struct TestBridge {
    pub addr: SocketAddr,
    pub tmp: tempfile::TempDir,
    _shutdown: Shutdown,
}

impl TestBridge {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn tmp_root(&self) -> std::path::PathBuf {
        self.tmp.path().join("tmp")
    }
}

pub async fn start_bridge(upstream: &str) -> TestBridge {
    start_bridge_with(upstream, |_| {}).await
}

pub async fn start_bridge_with(upstream: &str, tune: impl FnOnce(&mut BridgeConfig)) -> TestBridge {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = BridgeConfig::default();
    config.upstream.base_url = upstream.to_string();
    config.storage.tmp_root = tmp.path().join("tmp").to_string_lossy().into_owned();
    tune(&mut config);

    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestBridge {
        addr,
        tmp,
        _shutdown: shutdown,
    }
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// A `file` part as a browser would send it.
pub fn upload(filename: &str, bytes: &[u8]) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string())
}
