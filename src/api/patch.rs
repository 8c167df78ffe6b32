//! Typed partial updates.
//!
//! Update bodies are a list of `{propName, value}` pairs. Each name is looked
//! up in the entity's table of writable fields and its value checked against
//! the field's kind before anything reaches the database.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, UpdateMany, Value};
use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::{ApiError, Result};

/// Valid health-star-rating range (inclusive)
pub const HSR_RANGE: std::ops::RangeInclusive<f64> = 0.5..=5.0;

/// One entry of an update body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOp {
    pub prop_name: String,
    #[serde(default)]
    pub value: Json,
}

/// Shape a writable field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Required, non-blank string
    Text,
    OptionalText,
    Number,
    OptionalNumber,
    OptionalInteger,
    /// Optional health-star-rating, checked against [`HSR_RANGE`]
    OptionalRating,
}

/// Validated set of column assignments
#[derive(Debug, Clone)]
pub struct Patch<C> {
    sets: Vec<(C, Value)>,
}

impl<C: ColumnTrait> Patch<C> {
    /// Validate `ops` against `field`, the entity's writable-field lookup.
    /// A later op on the same field replaces an earlier one.
    pub fn parse<F>(ops: &[PatchOp], field: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<(C, FieldKind)>,
    {
        let mut sets: Vec<(C, Value)> = Vec::with_capacity(ops.len());

        for op in ops {
            let (column, kind) = field(&op.prop_name).ok_or_else(|| {
                ApiError::ValidationFailed(format!("unknown field `{}`", op.prop_name))
            })?;
            let value = convert(&op.prop_name, kind, &op.value)?;

            match sets.iter_mut().find(|(c, _)| c.as_str() == column.as_str()) {
                Some(existing) => existing.1 = value,
                None => sets.push((column, value)),
            }
        }

        Ok(Self { sets })
    }

    /// Mirror a new value of `source` into `key`, lowercased. Keeps the
    /// column that name search runs against in step with the name.
    pub fn with_search_key(mut self, source: C, key: C) -> Self {
        let lowered = self.sets.iter().find_map(|(c, v)| match v {
            Value::String(Some(s)) if c.as_str() == source.as_str() => Some(s.to_lowercase()),
            _ => None,
        });
        if let Some(lowered) = lowered {
            self.sets.push((key, Value::from(lowered)));
        }
        self
    }

    #[cfg(test)]
    pub fn columns(&self) -> Vec<&str> {
        self.sets.iter().map(|(c, _)| c.as_str()).collect()
    }

    /// Add the assignments to an update statement
    pub fn apply<E>(self, mut update: UpdateMany<E>) -> UpdateMany<E>
    where
        E: EntityTrait<Column = C>,
    {
        for (column, value) in self.sets {
            update = update.col_expr(column, Expr::value(value));
        }
        update
    }
}

fn convert(name: &str, kind: FieldKind, value: &Json) -> Result<Value> {
    let mismatch = |expected: &str| {
        ApiError::ValidationFailed(format!("field `{}` expects {}", name, expected))
    };

    let converted = match kind {
        FieldKind::Text => match value {
            Json::String(s) if !s.trim().is_empty() => Value::from(s.clone()),
            _ => return Err(mismatch("a non-empty string")),
        },
        FieldKind::OptionalText => match value {
            Json::String(s) => Value::from(Some(s.clone())),
            Json::Null => Value::from(None::<String>),
            _ => return Err(mismatch("a string or null")),
        },
        FieldKind::Number => match value.as_f64() {
            Some(n) => Value::from(n),
            None => return Err(mismatch("a number")),
        },
        FieldKind::OptionalNumber => match value {
            Json::Null => Value::from(None::<f64>),
            _ => match value.as_f64() {
                Some(n) => Value::from(Some(n)),
                None => return Err(mismatch("a number or null")),
            },
        },
        FieldKind::OptionalInteger => match value {
            Json::Null => Value::from(None::<i32>),
            _ => match value.as_i64().and_then(|n| i32::try_from(n).ok()) {
                Some(n) => Value::from(Some(n)),
                None => return Err(mismatch("an integer or null")),
            },
        },
        FieldKind::OptionalRating => match value {
            Json::Null => Value::from(None::<f64>),
            _ => {
                let rating = value.as_f64().ok_or_else(|| mismatch("a number or null"))?;
                check_rating(name, Some(rating))?;
                Value::from(Some(rating))
            }
        },
    };

    Ok(converted)
}

/// Names are the unique key of every collection and may not be blank
pub fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ApiError::ValidationFailed("field `name` may not be empty".to_string()));
    }
    Ok(())
}

/// Reject ratings outside [`HSR_RANGE`]
pub fn check_rating(name: &str, rating: Option<f64>) -> Result<()> {
    match rating {
        Some(r) if !HSR_RANGE.contains(&r) => Err(ApiError::ValidationFailed(format!(
            "field `{}` must be between {} and {}, got {}",
            name,
            HSR_RANGE.start(),
            HSR_RANGE.end(),
            r
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::market;
    use serde_json::json;

    fn ops(body: Json) -> Vec<PatchOp> {
        serde_json::from_value(body).unwrap()
    }

    fn market_field(name: &str) -> Option<(market::Column, FieldKind)> {
        match name {
            "name" => Some((market::Column::Name, FieldKind::Text)),
            "suburb" => Some((market::Column::Suburb, FieldKind::OptionalText)),
            "postcode" => Some((market::Column::Postcode, FieldKind::OptionalInteger)),
            "lat" => Some((market::Column::Lat, FieldKind::OptionalNumber)),
            _ => None,
        }
    }

    #[test]
    fn test_known_fields_accepted() {
        let patch = Patch::parse(
            &ops(json!([
                {"propName": "name", "value": "Night Market"},
                {"propName": "suburb", "value": null},
                {"propName": "postcode", "value": 3000},
                {"propName": "lat", "value": -37.8}
            ])),
            market_field,
        )
        .unwrap();

        assert_eq!(patch.columns(), vec!["name", "suburb", "postcode", "lat"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Patch::parse(
            &ops(json!([{"propName": "owner", "value": "me"}])),
            market_field,
        )
        .unwrap_err();

        match err {
            ApiError::ValidationFailed(msg) => assert!(msg.contains("owner")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_rejected() {
        for body in [
            json!([{"propName": "name", "value": 12}]),
            json!([{"propName": "name", "value": null}]),
            json!([{"propName": "postcode", "value": 30.5}]),
            json!([{"propName": "lat", "value": "north"}]),
        ] {
            assert!(Patch::parse(&ops(body), market_field).is_err());
        }
    }

    #[test]
    fn test_repeated_field_last_wins() {
        let patch = Patch::parse(
            &ops(json!([
                {"propName": "suburb", "value": "Carlton"},
                {"propName": "suburb", "value": "Fitzroy"}
            ])),
            market_field,
        )
        .unwrap();

        assert_eq!(patch.columns(), vec!["suburb"]);
        assert_eq!(patch.sets[0].1, Value::from(Some("Fitzroy".to_string())));
    }

    #[test]
    fn test_search_key_follows_name() {
        let patch = Patch::parse(
            &ops(json!([{"propName": "name", "value": "ÉCLAIR Stand"}])),
            market_field,
        )
        .unwrap()
        .with_search_key(market::Column::Name, market::Column::NameKey);

        assert_eq!(patch.columns(), vec!["name", "name_key"]);
        assert_eq!(patch.sets[1].1, Value::from("éclair stand".to_string()));

        let untouched = Patch::parse(
            &ops(json!([{"propName": "suburb", "value": "Carlton"}])),
            market_field,
        )
        .unwrap()
        .with_search_key(market::Column::Name, market::Column::NameKey);
        assert_eq!(untouched.columns(), vec!["suburb"]);
    }

    #[test]
    fn test_rating_range() {
        assert!(check_rating("hsr", Some(0.5)).is_ok());
        assert!(check_rating("hsr", Some(5.0)).is_ok());
        assert!(check_rating("hsr", None).is_ok());
        assert!(check_rating("hsr", Some(0.0)).is_err());
        assert!(check_rating("hsr", Some(5.5)).is_err());
    }

    #[test]
    fn test_blank_name() {
        assert!(check_name("Apple").is_ok());
        assert!(check_name("  ").is_err());
    }
}
