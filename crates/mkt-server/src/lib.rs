//! HTTP server for the marketplace listing indexer.
//!
//! Accepts raw marketplace events over `POST /v1/events` and serves the
//! reconciled listing table under `/v1/listings`.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, HealthResponse, ListParams, ListingView};
pub use server::ListingServer;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use mkt_fabric::Indexer;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    const SELLER: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const CONTRACT: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
    const BUYER: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn app() -> (Router, Arc<Indexer>) {
        let indexer = Arc::new(Indexer::in_memory());
        let router = router::build_router(Arc::clone(&indexer), router::DEFAULT_BODY_LIMIT);
        (router, indexer)
    }

    fn listing_id(token: u64) -> String {
        format!("{CONTRACT}_{token}_{SELLER}")
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn post_event(app: &Router, event: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/events")
                    .header("content-type", "application/json")
                    .body(Body::from(event.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn created(token: u64, price: u64, block: u64) -> Value {
        json!({
            "kind": "created",
            "seller": SELLER,
            "contract": CONTRACT,
            "token_id": token.to_string(),
            "price": price.to_string(),
            "block": block,
        })
    }

    // ----- health / info -----

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = app();
        let (status, body) = get(&app, "/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (app, _) = app();
        post_event(&app, created(1, 100, 1)).await;
        let (status, body) = get(&app, "/v1/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listings"], 1);
        assert_eq!(body["durable"], false);
        assert_eq!(body["stats"]["applied"], 1);
    }

    // ----- ingestion -----

    #[tokio::test]
    async fn post_event_applies_and_dedups() {
        let (app, indexer) = app();

        let (status, body) = post_event(&app, created(1, 100, 1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "applied", "effect": "inserted"}));

        let (_, body) = post_event(&app, created(1, 100, 1)).await;
        assert_eq!(body, json!({"status": "duplicate"}));
        assert_eq!(indexer.stats().unwrap().duplicates, 1);
    }

    #[tokio::test]
    async fn post_event_on_missing_listing_is_ignored() {
        let (app, _) = app();
        let (status, body) = post_event(
            &app,
            json!({
                "kind": "canceled",
                "seller": SELLER,
                "contract": CONTRACT,
                "token_id": "9",
                "block": 3,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["effect"], "ignored");
    }

    #[tokio::test]
    async fn malformed_event_is_422() {
        let (app, indexer) = app();
        let (status, body) = post_event(
            &app,
            json!({"kind": "created", "seller": "0x1234", "block": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("seller"));
        assert_eq!(indexer.query().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn wrongly_typed_body_is_422_and_counted() {
        let (app, indexer) = app();
        let (status, body) = post_event(&app, json!({"kind": "created", "block": "7"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
        assert_eq!(indexer.stats().unwrap().rejected, 1);
    }

    #[tokio::test]
    async fn non_json_body_is_422_and_counted() {
        let (app, indexer) = app();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/events")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("json"));
        assert_eq!(indexer.stats().unwrap().rejected, 1);
    }

    // ----- queries -----

    #[tokio::test]
    async fn get_listing_lifecycle() {
        let (app, _) = app();
        post_event(&app, created(1, 100, 1)).await;
        post_event(
            &app,
            json!({
                "kind": "ListingPurchased",
                "seller": SELLER,
                "nftAddress": CONTRACT,
                "tokenId": 1,
                "buyer": BUYER,
                "blockNumber": 2,
            }),
        )
        .await;

        let (status, body) = get(&app, &format!("/v1/listings/{}", listing_id(1))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], listing_id(1));
        assert_eq!(body["price"], "100");
        assert_eq!(body["buyer"], BUYER);
        assert_eq!(body["state"], "sold");
    }

    #[tokio::test]
    async fn get_missing_listing_is_404() {
        let (app, _) = app();
        let (status, _) = get(&app, &format!("/v1/listings/{}", listing_id(7))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_malformed_key_is_400() {
        let (app, _) = app();
        let (status, _) = get(&app, "/v1/listings/not-a-key").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_filters() {
        let (app, _) = app();
        post_event(&app, created(1, 100, 1)).await;
        post_event(&app, created(2, 200, 2)).await;
        post_event(
            &app,
            json!({
                "kind": "purchased",
                "seller": SELLER,
                "contract": CONTRACT,
                "token_id": "2",
                "buyer": BUYER,
                "block": 3,
            }),
        )
        .await;

        let (_, all) = get(&app, "/v1/listings").await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, active) = get(&app, "/v1/listings?active=true").await;
        let active = active.as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["tokenId"], "1");
        assert!(active[0]["buyer"].is_null());

        let (_, by_seller) = get(&app, &format!("/v1/listings?seller={BUYER}")).await;
        assert!(by_seller.as_array().unwrap().is_empty());

        let (_, by_contract) = get(&app, &format!("/v1/listings?contract={CONTRACT}")).await;
        assert_eq!(by_contract.as_array().unwrap().len(), 2);

        let (_, by_token) =
            get(&app, &format!("/v1/listings?contract={CONTRACT}&token_id=2")).await;
        let by_token = by_token.as_array().unwrap();
        assert_eq!(by_token.len(), 1);
        assert_eq!(by_token[0]["id"], listing_id(2));

        let (_, active_token) = get(&app, "/v1/listings?active=true&token_id=0x02").await;
        assert!(active_token.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_with_bad_address_is_400() {
        let (app, _) = app();
        let (status, body) = get(&app, "/v1/listings?contract=0xzz").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("contract"));
    }

    #[tokio::test]
    async fn list_with_bad_token_id_is_400() {
        let (app, _) = app();
        let (status, body) = get(&app, "/v1/listings?token_id=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("token_id"));
    }
}
