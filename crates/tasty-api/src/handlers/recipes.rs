//! Recipe endpoints under `/v1/recipes`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use tasty_core::{logging, CreateRecipeRequest, UpdateRecipeRequest};

use crate::error::ApiError;
use crate::AppState;

/// Accept only positive integer ids.
fn parse_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    match path {
        Ok(Path(id)) if id >= 1 => Ok(id),
        _ => Err(ApiError::BadRequest("invalid id parameter".to_string())),
    }
}

/// Unwrap a JSON body, reporting malformed input as 400.
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    body: Result<Json<CreateRecipeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = parse_body(body)?;
    let id = state.recipes.insert(req).await.map_err(|e| state.error(e))?;
    let recipe = state.recipes.get(id).await.map_err(|e| state.error(e))?;

    info!(subsystem = logging::API, op = "create_recipe", recipe_id = id, "Recipe created");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/recipes/{}", id))],
        Json(json!({ "recipe": recipe })),
    ))
}

pub async fn list_recipes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let recipes = state.recipes.get_all().await.map_err(|e| state.error(e))?;
    Ok(Json(json!({ "recipes": recipes })))
}

pub async fn show_recipe(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(path)?;
    let recipe = state.recipes.get(id).await.map_err(|e| state.error(e))?;
    Ok(Json(json!({ "recipe": recipe })))
}

/// Partial update: omitted fields keep their stored values.
pub async fn update_recipe(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    body: Result<Json<UpdateRecipeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(path)?;
    let changes = parse_body(body)?;

    let stored = state.recipes.get(id).await.map_err(|e| state.error(e))?;
    state
        .recipes
        .update(changes.merge_into(stored))
        .await
        .map_err(|e| state.error(e))?;
    let recipe = state.recipes.get(id).await.map_err(|e| state.error(e))?;

    info!(subsystem = logging::API, op = "update_recipe", recipe_id = id, "Recipe updated");
    Ok(Json(json!({ "recipe": recipe })))
}

pub async fn delete_recipe(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(path)?;
    state.recipes.delete(id).await.map_err(|e| state.error(e))?;

    info!(subsystem = logging::API, op = "delete_recipe", recipe_id = id, "Recipe deleted");
    Ok(Json(json!({ "message": "recipe successfully deleted" })))
}
