//! Market entity

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "markets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(rename = "_id")]
    pub id: String,
    #[sea_orm(unique)]
    pub name: String,
    /// Lowercased `name`, the column name search matches against
    #[serde(skip)]
    pub name_key: String,
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub postcode: Option<i32>,
    pub state: Option<String>,
    pub business_category: Option<String>,
    pub lga: Option<String>,
    pub region: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
