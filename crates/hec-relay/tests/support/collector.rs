use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use tokio::net::TcpListener;

pub const SUCCESS: &str = r#"{"text":"Success","code":0}"#;

/// One request as seen by the mock collector.
#[derive(Clone, Debug)]
pub struct CollectedRequest {
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub type CollectorStore = Arc<Mutex<Vec<CollectedRequest>>>;

/// A mock HEC endpoint answering every POST with a fixed status and body.
pub struct MockCollector {
    pub port: u16,
    pub store: CollectorStore,
}

impl MockCollector {
    pub async fn start(status: StatusCode, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind collector listener");
        let port = listener.local_addr().unwrap().port();
        let store: CollectorStore = Arc::new(Mutex::new(Vec::new()));
        let store_clone = store.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener
                    .accept()
                    .await
                    .expect("failed to accept connection");
                let store = store_clone.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let store = store.clone();
                        handle(req, store, status, body)
                    });
                    let _ = Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { port, store }
    }

    pub fn requests(&self) -> Vec<CollectedRequest> {
        self.store.lock().unwrap().clone()
    }
}

async fn handle<B>(
    req: Request<B>,
    store: CollectorStore,
    status: StatusCode,
    reply: &'static str,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
{
    if req.method() != Method::POST {
        return Ok(Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Full::default())
            .unwrap());
    }

    let path = req.uri().path().to_owned();

    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.as_str().to_owned(), v.to_owned());
        }
    }

    let body_bytes = req
        .collect()
        .await
        .map(|c| c.to_bytes())
        .unwrap_or_default();

    store.lock().unwrap().push(CollectedRequest {
        path,
        headers,
        body: String::from_utf8_lossy(&body_bytes).into_owned(),
    });

    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(reply.as_bytes())))
        .unwrap())
}
