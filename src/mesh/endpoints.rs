//! Node HTTP API
//!
//! - `POST /gossip`  inbound gossip delivery
//! - `POST /trigger` run one push round now
//! - `GET  /status`  point-in-time node status
//! - `POST /set`     manual value override (`?value=...`)

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use epidemic_mesh::{GossipEngine, GossipError, GossipMessage};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetValueResponse {
    pub status: String,
    pub value: String,
}

pub fn node_router(engine: Arc<GossipEngine>) -> Router {
    Router::new()
        .route("/gossip", post(receive_gossip))
        .route("/trigger", post(trigger_gossip))
        .route("/status", get(get_status))
        .route("/set", post(set_value))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn receive_gossip(State(engine): State<Arc<GossipEngine>>, body: Bytes) -> Response {
    let message: GossipMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            let err = GossipError::from(e);
            debug!("[{}] Rejected gossip payload: {}", engine.id(), err);
            return error::from_gossip_error(&err);
        }
    };

    engine.receive(&message);
    Json(AckResponse {
        status: "received".to_string(),
    })
    .into_response()
}

async fn trigger_gossip(State(engine): State<Arc<GossipEngine>>) -> Response {
    match engine.push().await {
        Ok(target) => Json(TriggerResponse {
            status: "sent".to_string(),
            target,
        })
        .into_response(),
        Err(e) => {
            if let Some(peer) = e.peer() {
                debug!("[{}] Triggered round could not reach {}", engine.id(), peer);
            }
            error::from_gossip_error(&e)
        }
    }
}

async fn get_status(State(engine): State<Arc<GossipEngine>>) -> Response {
    Json(engine.status()).into_response()
}

async fn set_value(
    State(engine): State<Arc<GossipEngine>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let Query(params) = match query {
        Ok(query) => query,
        Err(e) => return error::bad_request("malformed_query", e.body_text()),
    };
    // First `value` wins when the parameter repeats.
    let Some(value) = params
        .into_iter()
        .find(|(key, _)| key == "value")
        .map(|(_, value)| value)
        .filter(|v| !v.is_empty())
    else {
        return error::bad_request("missing_value", "value parameter required");
    };

    engine.set_value(&value);
    Json(SetValueResponse {
        status: "updated".to_string(),
        value,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::Request,
        http::{header::CONTENT_TYPE, StatusCode},
    };
    use epidemic_mesh::{NodeState, NodeStatus, TransportError, INITIAL_VALUE};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::mesh::GossipTransport;

    struct RefusingTransport;

    #[async_trait::async_trait]
    impl GossipTransport for RefusingTransport {
        async fn deliver(&self, peer: &str, _msg: &GossipMessage) -> Result<(), TransportError> {
            Err(TransportError::Connect(format!("{} refused", peer)))
        }
    }

    fn engine_with_peers(peers: Vec<String>) -> Arc<GossipEngine> {
        let state = NodeState::new("node-0", "127.0.0.1:18000", peers, INITIAL_VALUE);
        Arc::new(GossipEngine::new(state, Arc::new(RefusingTransport)))
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_gossip_endpoint_applies_value() {
        let engine = engine_with_peers(vec![]);
        let app = node_router(engine.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/gossip")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"from":"node-1","value":"hello","timestamp":1}"#,
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let ack: AckResponse = body_json(resp).await;
        assert_eq!(ack.status, "received");
        assert_eq!(engine.get_value(), "hello");
    }

    #[tokio::test]
    async fn test_gossip_endpoint_rejects_malformed_body() {
        let engine = engine_with_peers(vec![]);
        let app = node_router(engine.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/gossip")
            .body(Body::from("{\"from\": 3"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error::extract_error_code_from_response(&resp),
            "malformed_message"
        );
        assert_eq!(engine.get_value(), INITIAL_VALUE);
        assert_eq!(engine.state().last_seen(), 0);
    }

    #[tokio::test]
    async fn test_gossip_endpoint_wrong_method() {
        let app = node_router(engine_with_peers(vec![]));
        let req = Request::builder()
            .method("GET")
            .uri("/gossip")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let engine = engine_with_peers(vec!["127.0.0.1:18001".to_string()]);
        let app = node_router(engine);

        let req = Request::builder()
            .uri("/status")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let status: NodeStatus = body_json(resp).await;
        assert_eq!(status.id, "node-0");
        assert_eq!(status.value, INITIAL_VALUE);
        assert_eq!(status.peers, vec!["127.0.0.1:18001".to_string()]);
        assert_eq!(status.last_seen, 0);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let engine = engine_with_peers(vec![]);
        let app = node_router(engine.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/set?value=hello%20world")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body: SetValueResponse = body_json(resp).await;
        assert_eq!(body.status, "updated");
        assert_eq!(body.value, "hello world");
        assert_eq!(engine.get_value(), "hello world");
    }

    #[tokio::test]
    async fn test_set_endpoint_requires_value() {
        let engine = engine_with_peers(vec![]);

        for uri in ["/set", "/set?value="] {
            let req = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let resp = node_router(engine.clone()).oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                error::extract_error_code_from_response(&resp),
                "missing_value"
            );
        }
        assert_eq!(engine.get_value(), INITIAL_VALUE);
    }

    #[tokio::test]
    async fn test_set_endpoint_repeated_value_takes_first() {
        let engine = engine_with_peers(vec![]);
        let req = Request::builder()
            .method("POST")
            .uri("/set?value=a&value=b")
            .body(Body::empty())
            .unwrap();
        let resp = node_router(engine.clone()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body: SetValueResponse = body_json(resp).await;
        assert_eq!(body.value, "a");
        assert_eq!(engine.get_value(), "a");
    }

    #[tokio::test]
    async fn test_set_endpoint_odd_encoding_keeps_error_contract() {
        let engine = engine_with_peers(vec![]);
        for uri in ["/set?value=%ZZ", "/set?other=1&value", "/set?%"] {
            let req = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let resp = node_router(engine.clone()).oneshot(req).await.unwrap();
            if resp.status() != StatusCode::OK {
                assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
                assert!(
                    !error::extract_error_code_from_response(&resp).is_empty(),
                    "{} returned a 400 without an error code",
                    uri
                );
            }
        }
    }

    #[tokio::test]
    async fn test_trigger_without_peers() {
        let app = node_router(engine_with_peers(vec![]));
        let req = Request::builder()
            .method("POST")
            .uri("/trigger")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            error::extract_error_code_from_response(&resp),
            "no_peer_available"
        );
    }

    #[tokio::test]
    async fn test_trigger_delivery_failure() {
        let engine = engine_with_peers(vec!["127.0.0.1:18001".to_string()]);
        engine.set_value("X");
        let last_seen = engine.state().last_seen();

        let req = Request::builder()
            .method("POST")
            .uri("/trigger")
            .body(Body::empty())
            .unwrap();
        let resp = node_router(engine.clone()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            error::extract_error_code_from_response(&resp),
            "delivery_failed"
        );
        assert_eq!(engine.get_value(), "X");
        assert_eq!(engine.state().last_seen(), last_seen);
    }
}
