//! Database entities

pub mod ingredient;
pub mod market;
pub mod meal;
pub mod meal_ingredient;
