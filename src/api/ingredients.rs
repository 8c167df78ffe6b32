//! Ingredient handlers: search, fetch, add, update, delete.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::sea_query::{Expr, NullOrdering, Order};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use super::patch::{check_name, check_rating, FieldKind, Patch, PatchOp};
use super::query::{search_key, SearchFilter, SearchParams};
use super::types::{MessageResponse, RequestLink};
use super::AppState;
use crate::db::{self, entities::ingredient};
use crate::error::{ApiError, Result};

const RESOURCE: &str = "ingredients";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_ingredients))
        .route("/add", post(add_ingredient))
        .route("/update/:id", put(update_ingredient))
        .route("/:id", get(get_ingredient).delete(delete_ingredient))
}

/// POST /ingredients/add request body
#[derive(Debug, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub ingredient_type: Option<String>,
    pub description: Option<String>,
    pub energy: f64,
    pub hsr: Option<f64>,
    pub hsr_id: Option<String>,
    pub ghg: Option<f64>,
    pub emission_id: Option<String>,
    pub protein: f64,
    pub sodium: f64,
    pub sugar: f64,
    pub saturated_fat: f64,
    pub fibre: f64,
    pub fat: Option<f64>,
    pub carbohydrate: Option<f64>,
}

/// Search result item
#[derive(Debug, Serialize)]
pub struct IngredientSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub ingredient_type: Option<String>,
    pub hsr: Option<f64>,
    pub ghg: Option<f64>,
    pub energy: f64,
    pub request: RequestLink,
}

#[derive(Debug, Serialize)]
pub struct IngredientList {
    pub count: usize,
    pub ingredients: Vec<IngredientSummary>,
}

#[derive(Debug, Serialize)]
pub struct AddedIngredient {
    pub name: String,
    pub ingredient_type: Option<String>,
    #[serde(rename = "_id")]
    pub id: String,
    pub request: RequestLink,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientAdded {
    pub message: &'static str,
    pub added_ingredient: AddedIngredient,
}

/// Fields an update body may touch
fn writable_field(name: &str) -> Option<(ingredient::Column, FieldKind)> {
    use ingredient::Column;

    let field = match name {
        "name" => (Column::Name, FieldKind::Text),
        "ingredient_type" => (Column::IngredientType, FieldKind::OptionalText),
        "description" => (Column::Description, FieldKind::OptionalText),
        "energy" => (Column::Energy, FieldKind::Number),
        "hsr" => (Column::Hsr, FieldKind::OptionalRating),
        "hsr_id" => (Column::HsrId, FieldKind::OptionalText),
        "ghg" => (Column::Ghg, FieldKind::OptionalNumber),
        "emission_id" => (Column::EmissionId, FieldKind::OptionalText),
        "protein" => (Column::Protein, FieldKind::Number),
        "sodium" => (Column::Sodium, FieldKind::Number),
        "sugar" => (Column::Sugar, FieldKind::Number),
        "saturated_fat" => (Column::SaturatedFat, FieldKind::Number),
        "fibre" => (Column::Fibre, FieldKind::Number),
        "fat" => (Column::Fat, FieldKind::OptionalNumber),
        "carbohydrate" => (Column::Carbohydrate, FieldKind::OptionalNumber),
        _ => return None,
    };

    Some(field)
}

/// GET /ingredients - search by name and/or maximum rating.
/// Healthier, lower-emission ingredients come first; unrated ones last.
pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<IngredientList>> {
    let filter = SearchFilter::from_params(&params)?;

    let docs = ingredient::Entity::find()
        .filter(filter.condition(ingredient::Column::NameKey, Some(ingredient::Column::Hsr)))
        .order_by_with_nulls(ingredient::Column::Hsr, Order::Desc, NullOrdering::Last)
        .order_by_with_nulls(ingredient::Column::Ghg, Order::Asc, NullOrdering::Last)
        .all(&state.db)
        .await?;

    tracing::debug!("Ingredient search {:?} matched {}", filter, docs.len());

    let base_url = state.base_url(&headers);
    let ingredients: Vec<IngredientSummary> = docs
        .into_iter()
        .map(|doc| IngredientSummary {
            request: RequestLink::get(&base_url, RESOURCE, &doc.id),
            id: doc.id,
            name: doc.name,
            ingredient_type: doc.ingredient_type,
            hsr: doc.hsr,
            ghg: doc.ghg,
            energy: doc.energy,
        })
        .collect();

    Ok(Json(IngredientList {
        count: ingredients.len(),
        ingredients,
    }))
}

/// POST /ingredients/add
pub async fn add_ingredient(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<NewIngredient>, JsonRejection>,
) -> Result<(StatusCode, Json<IngredientAdded>)> {
    let Json(new) = payload?;
    check_name(&new.name)?;
    check_rating("hsr", new.hsr)?;

    let now = db::now();
    let doc = ingredient::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name_key: Set(search_key(&new.name)),
        name: Set(new.name),
        ingredient_type: Set(new.ingredient_type),
        description: Set(new.description),
        energy: Set(new.energy),
        hsr: Set(new.hsr),
        hsr_id: Set(new.hsr_id),
        ghg: Set(new.ghg),
        emission_id: Set(new.emission_id),
        protein: Set(new.protein),
        sodium: Set(new.sodium),
        sugar: Set(new.sugar),
        saturated_fat: Set(new.saturated_fat),
        fibre: Set(new.fibre),
        fat: Set(new.fat),
        carbohydrate: Set(new.carbohydrate),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Ingredient added: {} ({})", doc.name, doc.id);

    let base_url = state.base_url(&headers);
    Ok((
        StatusCode::CREATED,
        Json(IngredientAdded {
            message: "Ingredient Added",
            added_ingredient: AddedIngredient {
                request: RequestLink::get(&base_url, RESOURCE, &doc.id),
                name: doc.name,
                ingredient_type: doc.ingredient_type,
                id: doc.id,
            },
        }),
    ))
}

/// GET /ingredients/:id
pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ingredient::Model>> {
    let doc = ingredient::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(doc))
}

/// PUT /ingredients/update/:id - body is `[{propName, value}, ...]`
pub async fn update_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<Vec<PatchOp>>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(ops) = payload?;
    let patch = Patch::parse(&ops, writable_field)?
        .with_search_key(ingredient::Column::Name, ingredient::Column::NameKey);

    let result = patch
        .apply(ingredient::Entity::update_many())
        .col_expr(ingredient::Column::UpdatedAt, Expr::value(db::now()))
        .filter(ingredient::Column::Id.eq(id.as_str()))
        .exec(&state.db)
        .await?;

    tracing::debug!("Ingredient {} update touched {} row(s)", id, result.rows_affected);

    let base_url = state.base_url(&headers);
    Ok(Json(
        MessageResponse::new("Ingredient updated")
            .with_request(RequestLink::get(&base_url, RESOURCE, &id)),
    ))
}

/// DELETE /ingredients/:id - succeeds whether or not the record existed
pub async fn delete_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let result = ingredient::Entity::delete_by_id(id.as_str())
        .exec(&state.db)
        .await?;

    tracing::info!("Ingredient {} deleted ({} row(s))", id, result.rows_affected);

    Ok(Json(MessageResponse::new("Ingredient deleted")))
}
