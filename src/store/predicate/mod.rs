
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::collection::{Metadata, MetadataValue};
use crate::PressError;

/// Metadata filter: a conjunction of equality leaves
///
/// Reads and writes the document-store syntax
/// `{"$and": [{"field": {"$eq": value}}, ...]}`, including the single-clause
/// form and the bare `{"field": value}` shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Where {
    And(Vec<Where>),
    Eq { field: String, value: MetadataValue },
}

impl Where {
    #[inline]
    pub fn equals(field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Where::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjunction of equality clauses, in the given order
    #[inline]
    pub fn all_eq<I, K, V>(clauses: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetadataValue>,
    {
        Where::And(clauses.into_iter().map(|(k, v)| Where::equals(k, v)).collect())
    }

    /// Evaluate against one record's metadata; a missing field never matches
    #[inline]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Where::And(clauses) => clauses.iter().all(|clause| clause.matches(metadata)),
            Where::Eq { field, value } => metadata
                .get(field)
                .is_some_and(|stored| stored.matches(value)),
        }
    }

    /// Whether this predicate accepts every record
    #[inline]
    pub fn is_trivial(&self) -> bool {
        match self {
            Where::And(clauses) => clauses.iter().all(Where::is_trivial),
            Where::Eq { .. } => false,
        }
    }
}

/// Evaluate an optional predicate; `None` matches everything
#[inline]
pub fn matches_filter(filter: Option<&Where>, metadata: &Metadata) -> bool {
    filter.is_none_or(|f| f.matches(metadata))
}

impl TryFrom<Value> for Where {
    type Error = PressError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(object) = value else {
            return Err(invalid("a filter must be a JSON object"));
        };

        let mut clauses = Vec::with_capacity(object.len());
        for (key, operand) in object {
            clauses.push(parse_clause(key, operand)?);
        }

        if clauses.len() == 1 {
            if let Some(only) = clauses.pop() {
                return Ok(only);
            }
        }
        Ok(Where::And(clauses))
    }
}

fn parse_clause(key: String, operand: Value) -> Result<Where, PressError> {
    if key == "$and" {
        let Value::Array(items) = operand else {
            return Err(invalid("$and expects an array"));
        };
        return items
            .into_iter()
            .map(Where::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Where::And);
    }
    if key.starts_with('$') {
        return Err(invalid(&format!("unsupported operator '{key}'")));
    }

    match operand {
        Value::Object(mut ops) => {
            let eq = ops.remove("$eq");
            match (eq, ops.is_empty()) {
                (Some(value), true) => Ok(Where::Eq {
                    field: key,
                    value: scalar(value)?,
                }),
                _ => Err(invalid(&format!(
                    "field '{key}' supports only the $eq operator"
                ))),
            }
        }
        value => Ok(Where::Eq {
            field: key,
            value: scalar(value)?,
        }),
    }
}

fn scalar(value: Value) -> Result<MetadataValue, PressError> {
    serde_json::from_value(value)
        .map_err(|_| invalid("filter values must be strings, numbers or booleans"))
}

fn invalid(message: &str) -> PressError {
    PressError::Validation(format!("invalid filter: {message}"))
}

impl From<Where> for Value {
    fn from(filter: Where) -> Self {
        match filter {
            Where::And(clauses) => {
                let mut object = Map::new();
                object.insert(
                    "$and".to_string(),
                    Value::Array(clauses.into_iter().map(Value::from).collect()),
                );
                Value::Object(object)
            }
            Where::Eq { field, value } => {
                let mut op = Map::new();
                op.insert(
                    "$eq".to_string(),
                    serde_json::to_value(value).unwrap_or(Value::Null),
                );
                let mut object = Map::new();
                object.insert(field, Value::Object(op));
                Value::Object(object)
            }
        }
    }
}
