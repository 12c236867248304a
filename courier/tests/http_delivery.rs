//! End-to-end HTTP delivery tests against a local receiver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use courier::Error;
use courier::callback::HttpDestination;
use courier::callback::adapters::{HttpAdapter, HttpDeliveryConfig};

#[derive(Debug, Clone)]
struct CapturedRequest {
    method: String,
    path: String,
    query: Option<String>,
    content_type: Option<String>,
    content_length: Option<String>,
    body: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    location: Option<String>,
    delay: Option<Duration>,
}

impl Reply {
    fn status(status: u16) -> Self {
        Self {
            status,
            location: None,
            delay: None,
        }
    }

    fn redirect(status: u16, location: &str) -> Self {
        Self {
            status,
            location: Some(location.to_string()),
            delay: None,
        }
    }
}

#[derive(Default)]
struct Receiver {
    requests: Mutex<Vec<CapturedRequest>>,
    replies: Mutex<HashMap<String, Reply>>,
}

impl Receiver {
    fn reply_with(&self, path: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(path.to_string(), reply);
    }

    fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn capture(
    State(receiver): State<Arc<Receiver>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receiver.requests.lock().unwrap().push(CapturedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(String::from),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        content_length: headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: body.to_vec(),
    });

    let reply = receiver
        .replies
        .lock()
        .unwrap()
        .get(uri.path())
        .cloned()
        .unwrap_or(Reply::status(200));

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap();
    match reply.location {
        Some(location) => (status, [(header::LOCATION, location)]).into_response(),
        None => status.into_response(),
    }
}

async fn spawn_receiver() -> (String, Arc<Receiver>) {
    let receiver = Arc::new(Receiver::default());
    let app = Router::new()
        .fallback(capture)
        .with_state(receiver.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), receiver)
}

fn destination(url: String) -> HttpDestination {
    HttpDestination {
        url,
        method: "POST".to_string(),
        content_type: Some("application/json".to_string()),
        name: None,
    }
}

fn envelope() -> Value {
    json!({
        "Time": "2024-05-01T12:00:00.000Z",
        "Timestamp": 1714564800.0,
        "TaskResult": {"Task": "Copy", "Título": "épisode"}
    })
}

#[tokio::test]
async fn delivers_json_body_verbatim() {
    let (base, receiver) = spawn_receiver().await;
    let adapter = HttpAdapter::new(HttpDeliveryConfig::default());

    adapter
        .deliver(&destination(format!("{base}/hook")), &envelope())
        .await
        .unwrap();

    let requests = receiver.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.content_type.as_deref(), Some("application/json"));

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body, envelope());

    // Content-Length must count bytes, and the body is not pure ASCII.
    let declared: usize = request.content_length.as_deref().unwrap().parse().unwrap();
    assert_eq!(declared, request.body.len());
    assert!(request.body.len() > String::from_utf8(request.body.clone()).unwrap().chars().count());
}

#[tokio::test]
async fn missing_endpoints_count_as_delivered() {
    let (base, receiver) = spawn_receiver().await;
    receiver.reply_with("/gone", Reply::status(410));
    receiver.reply_with("/missing", Reply::status(404));
    let adapter = HttpAdapter::new(HttpDeliveryConfig::default());

    adapter
        .deliver(&destination(format!("{base}/gone")), &envelope())
        .await
        .unwrap();
    adapter
        .deliver(&destination(format!("{base}/missing")), &envelope())
        .await
        .unwrap();
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let (base, receiver) = spawn_receiver().await;
    receiver.reply_with("/hook", Reply::status(500));
    let adapter = HttpAdapter::new(HttpDeliveryConfig::default());

    let err = adapter
        .deliver(&destination(format!("{base}/hook")), &envelope())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RemoteRejection { status: 500, .. }));
}

#[tokio::test]
async fn redirect_resends_identical_request() {
    let (base, receiver) = spawn_receiver().await;
    receiver.reply_with("/old", Reply::redirect(302, "/new"));
    let adapter = HttpAdapter::new(HttpDeliveryConfig::default());

    adapter
        .deliver(&destination(format!("{base}/old")), &envelope())
        .await
        .unwrap();

    let requests = receiver.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/old");
    assert_eq!(requests[1].path, "/new");
    assert_eq!(requests[0].method, requests[1].method);
    assert_eq!(requests[0].body, requests[1].body);
    assert_eq!(requests[0].content_type, requests[1].content_type);
}

#[tokio::test]
async fn redirect_loop_stops_at_limit() {
    let (base, receiver) = spawn_receiver().await;
    receiver.reply_with("/loop", Reply::redirect(301, "/loop"));
    let adapter = HttpAdapter::new(HttpDeliveryConfig {
        max_redirects: 2,
        ..Default::default()
    });

    let err = adapter
        .deliver(&destination(format!("{base}/loop")), &envelope())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RedirectLimitExceeded { limit: 2 }));
    // Initial request plus two followed redirects.
    assert_eq!(receiver.requests().len(), 3);
}

#[tokio::test]
async fn get_destination_sends_payload_as_query_parameter() {
    let (base, receiver) = spawn_receiver().await;
    let adapter = HttpAdapter::new(HttpDeliveryConfig::default());

    adapter
        .deliver(
            &HttpDestination {
                url: format!("{base}/notify?stale=1"),
                method: "GET".to_string(),
                content_type: None,
                name: Some("cb".to_string()),
            },
            &json!({"k": "x=y"}),
        )
        .await
        .unwrap();

    let requests = receiver.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert!(requests[0].body.is_empty());

    let query = requests[0].query.as_deref().unwrap();
    assert!(query.starts_with("cb="));
    assert!(!query.contains("stale"));
    let encoded = query.trim_start_matches("cb=");
    let decoded = urlencoding::decode(encoded).unwrap();
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(decoded.as_bytes())
        .into_owned()
        .collect();
    assert_eq!(pairs, vec![("k".to_string(), "x=y".to_string())]);
}

#[tokio::test]
async fn form_destination_sends_urlencoded_pairs() {
    let (base, receiver) = spawn_receiver().await;
    let adapter = HttpAdapter::new(HttpDeliveryConfig::default());

    adapter
        .deliver(
            &HttpDestination {
                url: format!("{base}/form"),
                method: "POST".to_string(),
                content_type: Some("application/x-www-form-urlencoded".to_string()),
                name: None,
            },
            &json!({"Time": "2024-05-01", "Count": 3}),
        )
        .await
        .unwrap();

    let requests = receiver.requests();
    assert_eq!(
        requests[0].content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains("Time=2024-05-01"));
    assert!(body.contains("Count=3"));
}

#[tokio::test]
async fn unsupported_content_type_never_reaches_the_wire() {
    let (base, receiver) = spawn_receiver().await;
    let adapter = HttpAdapter::new(HttpDeliveryConfig::default());

    let err = adapter
        .deliver(
            &HttpDestination {
                url: format!("{base}/hook"),
                method: "POST".to_string(),
                content_type: Some("text/xml".to_string()),
                name: None,
            },
            &envelope(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedContentType(_)));
    assert!(receiver.requests().is_empty());
}

#[tokio::test]
async fn slow_chain_hits_overall_deadline() {
    let (base, receiver) = spawn_receiver().await;
    receiver.reply_with(
        "/slow",
        Reply {
            status: 200,
            location: None,
            delay: Some(Duration::from_millis(500)),
        },
    );
    let adapter = HttpAdapter::new(HttpDeliveryConfig {
        overall_deadline: Duration::from_millis(100),
        ..Default::default()
    });

    let err = adapter
        .deliver(&destination(format!("{base}/slow")), &envelope())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
}
