//! Market handlers. Search is by name only; markets carry no rating.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use super::patch::{check_name, FieldKind, Patch, PatchOp};
use super::query::{search_key, SearchFilter, SearchParams};
use super::types::{MessageResponse, RequestLink};
use super::AppState;
use crate::db::{self, entities::market};
use crate::error::{ApiError, Result};

const RESOURCE: &str = "markets";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_markets))
        .route("/add", post(add_market))
        .route("/update/:id", put(update_market))
        .route("/:id", get(get_market).delete(delete_market))
}

/// POST /markets/add request body
#[derive(Debug, Deserialize)]
pub struct NewMarket {
    pub name: String,
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub postcode: Option<i32>,
    pub state: Option<String>,
    pub business_category: Option<String>,
    pub lga: Option<String>,
    pub region: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MarketSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub suburb: Option<String>,
    pub business_category: Option<String>,
    pub request: RequestLink,
}

#[derive(Debug, Serialize)]
pub struct MarketList {
    pub count: usize,
    pub markets: Vec<MarketSummary>,
}

#[derive(Debug, Serialize)]
pub struct AddedMarket {
    pub name: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub request: RequestLink,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAdded {
    pub message: &'static str,
    pub added_market: AddedMarket,
}

fn writable_field(name: &str) -> Option<(market::Column, FieldKind)> {
    use market::Column;

    let field = match name {
        "name" => (Column::Name, FieldKind::Text),
        "address" => (Column::Address, FieldKind::OptionalText),
        "suburb" => (Column::Suburb, FieldKind::OptionalText),
        "postcode" => (Column::Postcode, FieldKind::OptionalInteger),
        "state" => (Column::State, FieldKind::OptionalText),
        "business_category" => (Column::BusinessCategory, FieldKind::OptionalText),
        "lga" => (Column::Lga, FieldKind::OptionalText),
        "region" => (Column::Region, FieldKind::OptionalText),
        "lon" => (Column::Lon, FieldKind::OptionalNumber),
        "lat" => (Column::Lat, FieldKind::OptionalNumber),
        _ => return None,
    };

    Some(field)
}

/// GET /markets - optional `?name=` substring search
pub async fn list_markets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<MarketList>> {
    let filter = SearchFilter::name_only(&params);

    let docs = market::Entity::find()
        .filter(filter.condition(market::Column::NameKey, None))
        .all(&state.db)
        .await?;

    let base_url = state.base_url(&headers);
    let markets: Vec<MarketSummary> = docs
        .into_iter()
        .map(|doc| MarketSummary {
            request: RequestLink::get(&base_url, RESOURCE, &doc.id),
            id: doc.id,
            name: doc.name,
            suburb: doc.suburb,
            business_category: doc.business_category,
        })
        .collect();

    Ok(Json(MarketList {
        count: markets.len(),
        markets,
    }))
}

/// POST /markets/add
pub async fn add_market(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<NewMarket>, JsonRejection>,
) -> Result<(StatusCode, Json<MarketAdded>)> {
    let Json(new) = payload?;
    check_name(&new.name)?;

    let now = db::now();
    let doc = market::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name_key: Set(search_key(&new.name)),
        name: Set(new.name),
        address: Set(new.address),
        suburb: Set(new.suburb),
        postcode: Set(new.postcode),
        state: Set(new.state),
        business_category: Set(new.business_category),
        lga: Set(new.lga),
        region: Set(new.region),
        lon: Set(new.lon),
        lat: Set(new.lat),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Market added: {} ({})", doc.name, doc.id);

    let base_url = state.base_url(&headers);
    Ok((
        StatusCode::CREATED,
        Json(MarketAdded {
            message: "Market Added",
            added_market: AddedMarket {
                request: RequestLink::get(&base_url, RESOURCE, &doc.id),
                name: doc.name,
                id: doc.id,
            },
        }),
    ))
}

/// GET /markets/:id
pub async fn get_market(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<market::Model>> {
    market::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// PUT /markets/update/:id
pub async fn update_market(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<Vec<PatchOp>>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(ops) = payload?;
    let patch = Patch::parse(&ops, writable_field)?
        .with_search_key(market::Column::Name, market::Column::NameKey);

    patch
        .apply(market::Entity::update_many())
        .col_expr(market::Column::UpdatedAt, Expr::value(db::now()))
        .filter(market::Column::Id.eq(id.as_str()))
        .exec(&state.db)
        .await?;

    let base_url = state.base_url(&headers);
    Ok(Json(
        MessageResponse::new("Market updated")
            .with_request(RequestLink::get(&base_url, RESOURCE, &id)),
    ))
}

/// DELETE /markets/:id
pub async fn delete_market(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    market::Entity::delete_by_id(id.as_str())
        .exec(&state.db)
        .await?;

    tracing::info!("Market {} deleted", id);

    Ok(Json(MessageResponse::new("Market deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use axum::http::Method;
    use serde_json::{json, Value};

    fn market(name: &str, suburb: &str) -> Value {
        json!({
            "name": name,
            "address": "1 Market St",
            "suburb": suburb,
            "postcode": 3000,
            "state": "VIC",
            "business_category": "Farmers market",
            "lga": "Melbourne",
            "region": "Metro",
            "lon": 144.96,
            "lat": -37.81
        })
    }

    async fn add(app: &Router, body: Value) -> String {
        let (status, reply) = send(app, Method::POST, "/markets/add", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{reply}");
        id_from_url(&reply["addedMarket"]["request"]["url"])
    }

    #[tokio::test]
    async fn test_add_then_get_round_trip() {
        let app = test_app().await;
        let body = market("Queen Victoria Market", "Melbourne");

        let (status, reply) = send(&app, Method::POST, "/markets/add", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reply["message"], "Market Added");
        assert_eq!(reply["addedMarket"]["name"], "Queen Victoria Market");

        let id = reply["addedMarket"]["_id"].as_str().unwrap();
        let (status, doc) = send(&app, Method::GET, &format!("/markets/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        for (key, value) in body.as_object().unwrap() {
            assert_eq!(&doc[key], value, "{key}");
        }
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let app = test_app().await;
        add(&app, market("Queen Victoria Market", "Melbourne")).await;
        add(&app, market("Prahran Market", "South Yarra")).await;
        add(&app, market("Farmers' Market", "Carlton")).await;

        let (_, all) = send(&app, Method::GET, "/markets", None).await;
        assert_eq!(all["count"], 3);

        let (status, reply) = send(&app, Method::GET, "/markets?name=prahran", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["count"], 1);
        let item = &reply["markets"][0];
        assert_eq!(item["name"], "Prahran Market");
        assert_eq!(item["suburb"], "South Yarra");
        assert_eq!(item["business_category"], "Farmers market");
        assert!(item.get("address").is_none());

        // hsr has no meaning for markets and is ignored
        let (status, reply) = send(&app, Method::GET, "/markets?name=market&hsr=x", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["count"], 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = test_app().await;
        let id = add(&app, market("Prahran Market", "South Yarra")).await;

        let ops = json!([
            {"propName": "postcode", "value": 3181},
            {"propName": "region", "value": null}
        ]);
        let (status, reply) =
            send(&app, Method::PUT, &format!("/markets/update/{id}"), Some(ops)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["message"], "Market updated");

        let (_, doc) = send(&app, Method::GET, &format!("/markets/{id}"), None).await;
        assert_eq!(doc["postcode"], 3181);
        assert!(doc["region"].is_null());

        let (status, reply) = send(&app, Method::DELETE, &format!("/markets/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["message"], "Market deleted");

        let (status, _) = send(&app, Method::GET, &format!("/markets/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_market_conflicts() {
        let app = test_app().await;
        add(&app, market("Prahran Market", "South Yarra")).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/markets/add",
            Some(market("Prahran Market", "Elsewhere")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
