//! Item endpoints under `/sample`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use depot_repo::Item;
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::extractors::ValidItem;
use crate::http::server::AppState;

/// Location of a created item, e.g. `ID: /sample/item/42`
const ID_HEADER: &str = "id";

/// Create item response
#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// POST /sample/item - any id in the body is ignored
async fn create_item(
    State(state): State<AppState>,
    ValidItem(mut item): ValidItem,
) -> Result<impl IntoResponse, ApiError> {
    item.id.clear();
    let id = state.repos.items()?.create(&item).await?;
    tracing::debug!(id = %id, "created item");

    let location = format!("/sample/item/{}", id);
    Ok((
        StatusCode::CREATED,
        [(ID_HEADER, location)],
        Json(CreatedResponse { id }),
    ))
}

/// GET /sample/item/{id}
async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let item = state.repos.items()?.get(&id).await?;
    Ok(Json(item))
}

/// PUT /sample/item/{id} - full overwrite, the path id wins over the body
async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidItem(mut item): ValidItem,
) -> Result<StatusCode, ApiError> {
    item.id = id;
    if !state.repos.items()?.update(&item).await? {
        return Err(ApiError::not_found("item", item.id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /sample/item/{id} - idempotent
async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existed = state.repos.items()?.delete(&id).await?;
    tracing::debug!(id = %id, existed, "deleted item");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sample/items - first page, ordered by id
async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.repos.items()?.list().await?.collect_all().await?;
    Ok(Json(items))
}

/// Item routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sample/item", post(create_item))
        .route(
            "/sample/item/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/sample/items", get(list_items))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::http::server::{build_router, AppState, ServerConfig};
    use crate::http::testing::FakeRepos;

    fn app(repos: FakeRepos) -> axum::Router {
        build_router(AppState::new(Arc::new(repos)), &ServerConfig::default())
    }

    async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_get_delete_get() {
        let app = app(FakeRepos::started());

        let created = send(&app, "POST", "/sample/item", Some(json!({"name": "box", "weight": 2.5}))).await;
        assert_eq!(created.status(), 201);
        assert_eq!(created.headers()["id"], "/sample/item/42");
        assert_eq!(json_body(created).await["id"], "42");

        let got = send(&app, "GET", "/sample/item/42", None).await;
        assert_eq!(got.status(), 200);
        let body = json_body(got).await;
        assert_eq!(body["id"], "42");
        assert_eq!(body["name"], "box");
        assert_eq!(body["weight"], 2.5);
        assert_eq!(body["warehouseLocation"], "");

        let deleted = send(&app, "DELETE", "/sample/item/42", None).await;
        assert_eq!(deleted.status(), 204);

        let gone = send(&app, "GET", "/sample/item/42", None).await;
        assert_eq!(gone.status(), 404);
    }

    #[tokio::test]
    async fn body_id_is_ignored_on_create() {
        let app = app(FakeRepos::started());

        let created = send(&app, "POST", "/sample/item", Some(json!({"id": "999", "name": "box"}))).await;
        assert_eq!(json_body(created).await["id"], "42");

        let missing = send(&app, "GET", "/sample/item/999", None).await;
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn blank_name_is_400() {
        let app = app(FakeRepos::started());

        let response = send(&app, "POST", "/sample/item", Some(json!({"name": ""}))).await;
        assert_eq!(response.status(), 400);
        assert_eq!(json_body(response).await["error"], "validation_error");

        let response = send(&app, "POST", "/sample/item", Some(json!({"weight": 1.0}))).await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn update_overwrites_or_404s() {
        let app = app(FakeRepos::started());
        send(&app, "POST", "/sample/item", Some(json!({"name": "box"}))).await;

        let updated = send(&app, "PUT", "/sample/item/42", Some(json!({"id": "7", "name": "crate"}))).await;
        assert_eq!(updated.status(), 204);
        let body = json_body(send(&app, "GET", "/sample/item/42", None).await).await;
        assert_eq!(body["name"], "crate");
        assert_eq!(body["id"], "42");

        let missing = send(&app, "PUT", "/sample/item/1000", Some(json!({"name": "x"}))).await;
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn delete_of_missing_item_is_204() {
        let app = app(FakeRepos::started());
        let response = send(&app, "DELETE", "/sample/item/12345", None).await;
        assert_eq!(response.status(), 204);
    }

    #[tokio::test]
    async fn list_returns_items_in_id_order() {
        let app = app(FakeRepos::started());
        for name in ["a", "b", "c"] {
            send(&app, "POST", "/sample/item", Some(json!({ "name": name }))).await;
        }

        let response = send(&app, "GET", "/sample/items", None).await;
        assert_eq!(response.status(), 200);
        let body = json_body(response).await;
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["42", "43", "44"]);
    }

    #[tokio::test]
    async fn not_started_repository_is_503() {
        let app = app(FakeRepos::not_started());
        let response = send(&app, "GET", "/sample/item/1", None).await;
        assert_eq!(response.status(), 503);

        let health = send(&app, "GET", "/health", None).await;
        assert_eq!(health.status(), 503);
    }
}
