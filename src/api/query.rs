//! Search filters for list endpoints.
//!
//! `?name=` is a case-insensitive, literal substring match and `?hsr=` an
//! upper bound on the health-star-rating. Either, both or neither may be
//! given; an empty parameter counts as absent.

use sea_orm::sea_query::{LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition};
use serde::Deserialize;

use crate::error::{ApiError, Result};

/// Escape character used in generated LIKE patterns
const LIKE_ESCAPE: char = '\\';

/// Raw query string of a list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
    pub hsr: Option<String>,
}

/// Typed filter built from [`SearchParams`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub name: Option<String>,
    pub max_hsr: Option<f64>,
}

impl SearchFilter {
    /// Name and rating filter (ingredients, meals)
    pub fn from_params(params: &SearchParams) -> Result<Self> {
        let max_hsr = match non_empty(&params.hsr) {
            Some(raw) => Some(parse_hsr(raw)?),
            None => None,
        };

        Ok(Self {
            name: non_empty(&params.name).map(str::to_string),
            max_hsr,
        })
    }

    /// Name-only filter (markets carry no rating)
    pub fn name_only(params: &SearchParams) -> Self {
        Self {
            name: non_empty(&params.name).map(str::to_string),
            max_hsr: None,
        }
    }

    /// Translate into a storage condition. `key_column` holds the lowercased
    /// name. An empty filter matches everything.
    pub fn condition<C: ColumnTrait>(&self, key_column: C, hsr_column: Option<C>) -> Condition {
        let mut condition = Condition::all();

        if let Some(name) = &self.name {
            condition = condition.add(name_contains(key_column, name));
        }
        if let (Some(max), Some(column)) = (self.max_hsr, hsr_column) {
            condition = condition.add(column.lte(max));
        }

        condition
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_hsr(raw: &str) -> Result<f64> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ApiError::ValidationFailed(format!(
            "hsr must be a number, got {:?}",
            raw
        ))),
    }
}

/// Lowercase a name the way its search key is stored
pub fn search_key(name: &str) -> String {
    name.to_lowercase()
}

/// `key LIKE '%needle%' ESCAPE '\'` with the needle taken literally.
/// Both sides are lowercased in Rust, so non-ASCII letters fold too.
fn name_contains<C: ColumnTrait>(key_column: C, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&search_key(needle)));
    key_column.like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

/// Escape LIKE wildcards (`%`, `_`) and the escape character itself
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
