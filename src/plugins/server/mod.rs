mod handlers;

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
  Router, middleware,
  routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

/// Operator API; everything except `/health` needs the `x-api-key` header.
fn routes(app: Arc<AppState>) -> Router {
  let api = Router::new()
    .route("/api/giveaways", post(handlers::create_giveaway))
    .route("/api/giveaways/expired", post(handlers::process_expired))
    .route("/api/giveaways/{id}/participants", post(handlers::join))
    .route("/api/giveaways/{id}/tickets", put(handlers::set_tickets))
    .route("/api/giveaways/{id}/pre-winners", put(handlers::submit_pre_winners))
    .route("/api/giveaways/{id}/complete", post(handlers::complete))
    .route("/api/giveaways/{id}/archive", post(handlers::archive))
    .route("/api/giveaways/{id}/wins", get(handlers::wins))
    .route_layer(middleware::from_fn_with_state(
      app.clone(),
      handlers::require_key,
    ));

  Router::new()
    .route("/health", get(handlers::health))
    .merge(api)
    .with_state(app)
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let limiter = governor_conf.limiter().clone();

    let router = routes(app.clone())
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));
    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP Server listening on {addr}");

    let limiter = async {
      loop {
        time::sleep(Duration::from_secs(60)).await;
        limiter.retain_recent();
      }
    };

    let shutdown = app.shutdown.clone();
    let server = async {
      axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Axum server error")
    };

    tokio::select! {
      result = server => {
        match &result {
            Ok(_) => info!("Server stopped gracefully"),
            Err(err) => error!("Server stopped with error: {err}"),
        }
        result
      }
      _ = limiter => {
        error!("Rate limiter cleaner stopped unexpectedly!");
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use tokio_util::sync::CancellationToken;
  use tower::ServiceExt;

  use super::*;
  use crate::state::Config;

  async fn app() -> Arc<AppState> {
    let config = Config {
      database_url: "sqlite::memory:".into(),
      token: "123456:test".into(),
      secret: "operator-key".into(),
      ..Default::default()
    };
    let (app, _postman) =
      AppState::new(config, CancellationToken::new()).await.unwrap();
    Arc::new(app)
  }

  fn request(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
      builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
  }

  fn json_request(method: &str, uri: &str, body: json::Value) -> Request<Body> {
    Request::builder()
      .method(method)
      .uri(uri)
      .header("x-api-key", "operator-key")
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  async fn read_json(response: axum::response::Response) -> json::Value {
    let bytes =
      axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn test_health_is_public() {
    let response =
      routes(app().await).oneshot(request("GET", "/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_api_requires_key() {
    let router = routes(app().await);

    let response = router
      .clone()
      .oneshot(request("POST", "/api/giveaways/expired", None))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
      .clone()
      .oneshot(request("POST", "/api/giveaways/expired", Some("wrong")))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
      .oneshot(request("POST", "/api/giveaways/expired", Some("operator-key")))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_errors_map_to_status() {
    let router = routes(app().await);

    let response = router
      .clone()
      .oneshot(request("POST", "/api/giveaways/404/archive", Some("operator-key")))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
      .oneshot(request("GET", "/api/giveaways/404/wins", Some("operator-key")))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_registry_routes() {
    let router = routes(app().await);

    let response = router
      .clone()
      .oneshot(json_request(
        "POST",
        "/api/giveaways",
        json::json!({
          "creator_id": 1,
          "title": "Launch party",
          "duration_seconds": 3600,
          "winners_count": 2,
          "allow_tickets": true,
          "prizes": [{ "name": "Sticker pack", "kind": "internal" }],
          "requirements": [{ "kind": "subscription", "channel": "@news" }]
        }),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let giveaway = read_json(response).await;
    assert_eq!(giveaway["status"], "active");
    let id = giveaway["id"].as_i64().unwrap();

    let join = |user_id: i64| {
      json_request(
        "POST",
        &format!("/api/giveaways/{id}/participants"),
        json::json!({ "user_id": user_id, "username": "neo" }),
      )
    };
    let response = router.clone().oneshot(join(10)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = router.clone().oneshot(join(10)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = router.clone().oneshot(join(1)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let tickets = |user_id: i64, count: i64| {
      json_request(
        "PUT",
        &format!("/api/giveaways/{id}/tickets"),
        json::json!({ "user_id": user_id, "count": count }),
      )
    };
    let response = router.clone().oneshot(tickets(10, 4)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = router.clone().oneshot(tickets(11, 4)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
      .oneshot(request(
        "GET",
        &format!("/api/giveaways/{id}/wins"),
        Some("operator-key"),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["wins"], json::json!([]));
  }
}
