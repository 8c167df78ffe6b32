//! Meal entity. Ingredient lines live in `meal_ingredient`.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "meals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(rename = "_id")]
    pub id: String,
    #[sea_orm(unique)]
    pub name: String,
    /// Lowercased `name`, the column name search matches against
    #[serde(skip)]
    pub name_key: String,
    pub description: Option<String>,
    pub energy: Option<f64>,
    pub ghg: Option<f64>,
    pub hsr: Option<f64>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::meal_ingredient::Entity")]
    Lines,
}

impl Related<super::meal_ingredient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
