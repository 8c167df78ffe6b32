//! Meal handlers.
//!
//! A meal holds an ordered list of `(ingredient id, quantity)` lines. Lines are
//! listed as bare ids and expanded to full ingredient records when a single
//! meal is fetched. Referenced ingredients are not checked on write; a line
//! whose ingredient is missing expands to `null`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use super::patch::{check_name, check_rating, FieldKind, Patch, PatchOp};
use super::query::{search_key, SearchFilter, SearchParams};
use super::types::{MessageResponse, RequestLink};
use super::AppState;
use crate::db::{
    self,
    entities::{ingredient, meal, meal_ingredient},
};
use crate::error::{ApiError, Result};

const RESOURCE: &str = "meals";

/// Update field that replaces the whole ingredient list
const INGREDIENTS_FIELD: &str = "ingredients";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_meals))
        .route("/add", post(add_meal))
        .route("/update/:id", put(update_meal))
        .route("/:id", get(get_meal).delete(delete_meal))
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Ingredient line as submitted; quantity defaults to 1
#[derive(Debug, Clone, Deserialize)]
pub struct NewLine {
    pub ingredient: String,
    pub quantity: Option<f64>,
}

/// POST /meals/add request body
#[derive(Debug, Deserialize)]
pub struct NewMeal {
    pub name: String,
    pub description: Option<String>,
    pub energy: Option<f64>,
    pub ghg: Option<f64>,
    pub hsr: Option<f64>,
    #[serde(default)]
    pub ingredients: Vec<NewLine>,
}

/// Stored ingredient line, unexpanded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientLine {
    pub ingredient: String,
    pub quantity: f64,
}

/// Ingredient line with the reference resolved
#[derive(Debug, Serialize)]
pub struct ExpandedLine {
    pub ingredient: Option<ingredient::Model>,
    pub quantity: f64,
}

/// GET /meals/:id response
#[derive(Debug, Serialize)]
pub struct MealDetail {
    #[serde(flatten)]
    pub meal: meal::Model,
    pub ingredients: Vec<ExpandedLine>,
}

#[derive(Debug, Serialize)]
pub struct MealSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub energy: Option<f64>,
    pub ghg: Option<f64>,
    pub hsr: Option<f64>,
    pub ingredients: Vec<IngredientLine>,
    pub request: RequestLink,
}

#[derive(Debug, Serialize)]
pub struct MealList {
    pub count: usize,
    pub meals: Vec<MealSummary>,
}

#[derive(Debug, Serialize)]
pub struct AddedMeal {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<IngredientLine>,
    pub hsr: Option<f64>,
    pub ghg: Option<f64>,
    pub energy: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealAdded {
    pub message: &'static str,
    pub added_meal: AddedMeal,
    pub request: RequestLink,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn writable_field(name: &str) -> Option<(meal::Column, FieldKind)> {
    use meal::Column;

    let field = match name {
        "name" => (Column::Name, FieldKind::Text),
        "description" => (Column::Description, FieldKind::OptionalText),
        "energy" => (Column::Energy, FieldKind::OptionalNumber),
        "ghg" => (Column::Ghg, FieldKind::OptionalNumber),
        "hsr" => (Column::Hsr, FieldKind::OptionalRating),
        _ => return None,
    };

    Some(field)
}

/// Apply the default quantity and reject unusable lines
fn resolve_lines(lines: Vec<NewLine>) -> Result<Vec<IngredientLine>> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            if line.ingredient.trim().is_empty() {
                return Err(ApiError::ValidationFailed(format!(
                    "ingredients[{}]: missing ingredient id",
                    i
                )));
            }

            let quantity = line.quantity.unwrap_or(1.0);
            if !quantity.is_finite() || quantity <= 0.0 {
                return Err(ApiError::ValidationFailed(format!(
                    "ingredients[{}]: quantity must be positive, got {}",
                    i, quantity
                )));
            }

            Ok(IngredientLine {
                ingredient: line.ingredient,
                quantity,
            })
        })
        .collect()
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    meal_id: &str,
    lines: &[IngredientLine],
) -> std::result::Result<(), DbErr> {
    if lines.is_empty() {
        return Ok(());
    }

    let rows = lines
        .iter()
        .enumerate()
        .map(|(position, line)| meal_ingredient::ActiveModel {
            meal_id: Set(meal_id.to_string()),
            position: Set(position as i32),
            ingredient_id: Set(line.ingredient.clone()),
            quantity: Set(line.quantity),
        });

    meal_ingredient::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await?;

    Ok(())
}

/// Unexpanded lines of every meal matching `condition`, keyed by meal id, in
/// stored order. Joins on the meals table so the filter runs in one query.
async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
) -> std::result::Result<HashMap<String, Vec<IngredientLine>>, DbErr> {
    let rows = meal_ingredient::Entity::find()
        .inner_join(meal::Entity)
        .filter(condition)
        .order_by_asc(meal_ingredient::Column::MealId)
        .order_by_asc(meal_ingredient::Column::Position)
        .all(conn)
        .await?;

    let mut by_meal: HashMap<String, Vec<IngredientLine>> = HashMap::new();
    for row in rows {
        by_meal.entry(row.meal_id).or_default().push(IngredientLine {
            ingredient: row.ingredient_id,
            quantity: row.quantity,
        });
    }

    Ok(by_meal)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /meals - search by name and/or maximum rating
pub async fn list_meals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<MealList>> {
    let filter = SearchFilter::from_params(&params)?;

    let condition = filter.condition(meal::Column::NameKey, Some(meal::Column::Hsr));

    let docs = meal::Entity::find()
        .filter(condition.clone())
        .all(&state.db)
        .await?;

    let mut lines = load_lines(&state.db, condition).await?;

    let base_url = state.base_url(&headers);
    let meals: Vec<MealSummary> = docs
        .into_iter()
        .map(|doc| MealSummary {
            request: RequestLink::get(&base_url, RESOURCE, &doc.id),
            ingredients: lines.remove(&doc.id).unwrap_or_default(),
            id: doc.id,
            name: doc.name,
            description: doc.description,
            energy: doc.energy,
            ghg: doc.ghg,
            hsr: doc.hsr,
        })
        .collect();

    Ok(Json(MealList {
        count: meals.len(),
        meals,
    }))
}

/// POST /meals/add
pub async fn add_meal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<NewMeal>, JsonRejection>,
) -> Result<(StatusCode, Json<MealAdded>)> {
    let Json(new) = payload?;
    check_name(&new.name)?;
    check_rating("hsr", new.hsr)?;
    let lines = resolve_lines(new.ingredients)?;

    let now = db::now();
    let txn = state.db.begin().await?;

    let doc = meal::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name_key: Set(search_key(&new.name)),
        name: Set(new.name),
        description: Set(new.description),
        energy: Set(new.energy),
        ghg: Set(new.ghg),
        hsr: Set(new.hsr),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    insert_lines(&txn, &doc.id, &lines).await?;
    txn.commit().await?;

    tracing::info!("Meal added: {} ({}) with {} ingredient(s)", doc.name, doc.id, lines.len());

    let base_url = state.base_url(&headers);
    Ok((
        StatusCode::CREATED,
        Json(MealAdded {
            message: "Meal Added",
            request: RequestLink::get(&base_url, RESOURCE, &doc.id),
            added_meal: AddedMeal {
                id: doc.id,
                name: doc.name,
                description: doc.description,
                ingredients: lines,
                hsr: doc.hsr,
                ghg: doc.ghg,
                energy: doc.energy,
            },
        }),
    ))
}

/// GET /meals/:id - ingredient references expanded to full records
pub async fn get_meal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MealDetail>> {
    let doc = meal::Entity::find_by_id(id.as_str())
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound)?;

    let ingredients = meal_ingredient::Entity::find()
        .filter(meal_ingredient::Column::MealId.eq(id.as_str()))
        .order_by_asc(meal_ingredient::Column::Position)
        .find_also_related(ingredient::Entity)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|(line, ingredient)| ExpandedLine {
            ingredient,
            quantity: line.quantity,
        })
        .collect();

    Ok(Json(MealDetail {
        meal: doc,
        ingredients,
    }))
}

/// PUT /meals/update/:id - `ingredients` replaces every line of the meal
pub async fn update_meal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<Vec<PatchOp>>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(ops) = payload?;

    let (line_ops, field_ops): (Vec<PatchOp>, Vec<PatchOp>) = ops
        .into_iter()
        .partition(|op| op.prop_name == INGREDIENTS_FIELD);

    let patch = Patch::parse(&field_ops, writable_field)?
        .with_search_key(meal::Column::Name, meal::Column::NameKey);
    let lines = match line_ops.last() {
        Some(op) => {
            let submitted: Vec<NewLine> = serde_json::from_value(op.value.clone()).map_err(|e| {
                ApiError::ValidationFailed(format!("field `{}`: {}", INGREDIENTS_FIELD, e))
            })?;
            Some(resolve_lines(submitted)?)
        }
        None => None,
    };

    let txn = state.db.begin().await?;

    let result = patch
        .apply(meal::Entity::update_many())
        .col_expr(meal::Column::UpdatedAt, Expr::value(db::now()))
        .filter(meal::Column::Id.eq(id.as_str()))
        .exec(&txn)
        .await?;

    // Only rewrite lines of a meal that exists, so no orphans are left behind
    if let (Some(lines), true) = (lines, result.rows_affected > 0) {
        meal_ingredient::Entity::delete_many()
            .filter(meal_ingredient::Column::MealId.eq(id.as_str()))
            .exec(&txn)
            .await?;
        insert_lines(&txn, &id, &lines).await?;
    }

    txn.commit().await?;

    let base_url = state.base_url(&headers);
    Ok(Json(
        MessageResponse::new("Meal updated")
            .with_request(RequestLink::get(&base_url, RESOURCE, &id)),
    ))
}

/// DELETE /meals/:id - removes the meal and its lines, never the ingredients
pub async fn delete_meal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let txn = state.db.begin().await?;

    meal_ingredient::Entity::delete_many()
        .filter(meal_ingredient::Column::MealId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    let result = meal::Entity::delete_by_id(id.as_str()).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!("Meal {} deleted ({} row(s))", id, result.rows_affected);

    Ok(Json(MessageResponse::new("Meal deleted")))
}
