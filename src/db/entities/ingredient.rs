//! Ingredient entity

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "ingredients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(rename = "_id")]
    pub id: String,
    #[sea_orm(unique)]
    pub name: String,
    /// Lowercased `name`, the column name search matches against
    #[serde(skip)]
    pub name_key: String,
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
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::meal_ingredient::Entity")]
    MealIngredients,
}

impl Related<super::meal_ingredient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MealIngredients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
