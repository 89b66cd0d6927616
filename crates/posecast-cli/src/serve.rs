//! Reference collector over HTTP

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use posecast_core::collector::{Rejection, ReportCollector};
use posecast_core::config::SECRET_ENV_VAR;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    collector: Arc<Mutex<ReportCollector>>,
}

pub fn router(collector: ReportCollector) -> Router {
    let state = AppState {
        collector: Arc::new(Mutex::new(collector)),
    };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/report", post(report))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, collector: ReportCollector) -> anyhow::Result<()> {
    let enforced = collector.authenticator().is_enforced();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, hmac = enforced, "Collector listening");
    axum::serve(listener, router(collector)).await?;
    Ok(())
}

/// Refuse to expose an unauthenticated collector beyond loopback unless asked to
pub fn check_exposure(addr: SocketAddr, authenticated: bool, insecure: bool) -> anyhow::Result<()> {
    if authenticated || insecure || addr.ip().is_loopback() {
        return Ok(());
    }
    anyhow::bail!(
        "Refusing to listen on {} without authentication. Set {} or pass --insecure.",
        addr,
        SECRET_ENV_VAR
    )
}

async fn healthz() -> &'static str {
    "ok"
}

async fn report(State(st): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, ReportError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let receipt = st.collector.lock().await.receive(authorization, &body)?;
    Ok(Json(json!({ "status": "success", "sequence": receipt.sequence })))
}

#[derive(Debug)]
pub struct ReportError(Rejection);

impl From<Rejection> for ReportError {
    fn from(value: Rejection) -> Self {
        Self(value)
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        let body = Json(json!({ "status": self.0.status() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use posecast_core::collector::ReportAuthenticator;
    use posecast_core::transport::RequestSigner;
    use tower::ServiceExt;

    const BODY: &str = r#"{"position":{"x":0.0,"y":1.6,"z":0.0},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}"#;

    fn signed_collector() -> (ReportCollector, RequestSigner) {
        let signer = RequestSigner::new("abc").unwrap();
        (ReportCollector::new(ReportAuthenticator::new(Some(signer.clone()))), signer)
    }

    fn post_report(authorization: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/report")
            .header("content-type", "application/json");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_unauthenticated_public_bind_refused() {
        let public: SocketAddr = "0.0.0.0:8000".parse().unwrap();
        let err = check_exposure(public, false, false).unwrap_err();
        assert!(err.to_string().contains(SECRET_ENV_VAR));

        assert!(check_exposure(public, true, false).is_ok());
        assert!(check_exposure(public, false, true).is_ok());
        assert!(check_exposure("127.0.0.1:8000".parse().unwrap(), false, false).is_ok());
        assert!(check_exposure("[::1]:8000".parse().unwrap(), false, false).is_ok());
    }

    #[tokio::test]
    async fn test_healthz() {
        let resp = router(ReportCollector::default())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_collector_accepts() {
        let resp = router(ReportCollector::default())
            .oneshot(post_report(None, BODY))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "success");
    }

    #[tokio::test]
    async fn test_missing_hmac_is_forbidden() {
        let (collector, _) = signed_collector();
        let resp = router(collector).oneshot(post_report(None, BODY)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(resp).await["status"], "missing hmac");
    }

    #[tokio::test]
    async fn test_invalid_hmac_is_forbidden() {
        let (collector, signer) = signed_collector();
        let header = signer.authorization(b"something else").unwrap();
        let resp = router(collector)
            .oneshot(post_report(Some(&header), BODY))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(resp).await["status"], "invalid hmac");
    }

    #[tokio::test]
    async fn test_valid_hmac_accepted() {
        let (collector, signer) = signed_collector();
        let header = signer.authorization(BODY.as_bytes()).unwrap();
        let resp = router(collector)
            .oneshot(post_report(Some(&header), BODY))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["sequence"], 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let resp = router(ReportCollector::default())
            .oneshot(post_report(None, "{"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
