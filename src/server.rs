use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::entity::Entity;
use crate::error::Soft7Error;
use crate::store::EntityStore;

pub type SharedStore = Arc<Mutex<EntityStore>>;

type Reply = (StatusCode, Json<serde_json::Value>);

#[derive(Deserialize)]
pub struct FetchParams {
    pub identity: String,
}

/// The dataspace router: list, fetch, create and update entity schemas.
pub fn router(store: SharedStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
        ])
        .allow_headers(Any);
    Router::new()
        .route(
            "/v1/entities",
            get(list_entities).post(create_entity).put(update_entity),
        )
        .route("/v1/entities/fetch", get(fetch_entity))
        .layer(cors)
        .with_state(store)
}

fn failure(status: StatusCode, message: String) -> Reply {
    (status, Json(json!({ "status": "error", "error": message })))
}

fn locked(store: &SharedStore) -> std::result::Result<std::sync::MutexGuard<'_, EntityStore>, Reply> {
    store.lock().map_err(|error| {
        warn!(error = %error, "store lock poisoned");
        failure(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    })
}

async fn list_entities(State(store): State<SharedStore>) -> Reply {
    let store = match locked(&store) {
        Ok(store) => store,
        Err(reply) => return reply,
    };
    match store.list() {
        Ok(identities) => (StatusCode::OK, Json(json!(identities))),
        Err(error) => {
            warn!(error = %error, "listing entities failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}

async fn fetch_entity(
    State(store): State<SharedStore>,
    Query(params): Query<FetchParams>,
) -> Reply {
    let store = match locked(&store) {
        Ok(store) => store,
        Err(reply) => return reply,
    };
    match store.read(&params.identity) {
        Ok(Some(entity)) => match serde_json::to_value(&entity) {
            Ok(document) => (StatusCode::OK, Json(document)),
            Err(error) => failure(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        },
        Ok(None) => failure(
            StatusCode::NOT_FOUND,
            format!("entity with identity '{}' not found", params.identity),
        ),
        Err(error) => {
            warn!(error = %error, "reading entity failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}

async fn create_entity(
    State(store): State<SharedStore>,
    Json(document): Json<serde_json::Value>,
) -> Reply {
    let entity = match Entity::from_json(document) {
        Ok(entity) => entity,
        Err(error) => return failure(StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
    };
    let store = match locked(&store) {
        Ok(store) => store,
        Err(reply) => return reply,
    };
    match store.create(&entity) {
        Ok(()) => {
            info!(identity = entity.identity().iri(), "entity created");
            (
                StatusCode::CREATED,
                Json(json!({ "status": "ok", "identity": entity.identity().iri() })),
            )
        }
        Err(Soft7Error::EntityExists(message)) => failure(StatusCode::CONFLICT, message),
        Err(error) => {
            warn!(error = %error, "creating entity failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}

async fn update_entity(
    State(store): State<SharedStore>,
    Json(document): Json<serde_json::Value>,
) -> Reply {
    let entity = match Entity::from_json(document) {
        Ok(entity) => entity,
        Err(error) => return failure(StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
    };
    let store = match locked(&store) {
        Ok(store) => store,
        Err(reply) => return reply,
    };
    match store.update(&entity) {
        Ok(()) => {
            info!(identity = entity.identity().iri(), "entity replaced");
            (
                StatusCode::OK,
                Json(json!({ "status": "ok", "identity": entity.identity().iri() })),
            )
        }
        Err(Soft7Error::EntityNotFound(message)) => failure(StatusCode::NOT_FOUND, message),
        Err(error) => {
            warn!(error = %error, "updating entity failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}
