//! Filter and projection evaluation over topic documents.
//!
//! Filters follow the familiar document-store shape: `{"field": value}` matches
//! by equality, `{"field": {"$op": ...}}` applies operators, and top-level
//! `$and` / `$or` combine sub-filters. Projections use `1`/`0` per field.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use thiserror::Error;

use topichub_core::{TopicDocument, ID_FIELD};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unsupported filter operator `{0}`")]
    UnsupportedOperator(String),
    #[error("operator `{operator}` expects {expected}")]
    InvalidOperand { operator: String, expected: &'static str },
    #[error("invalid regular expression `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("projection value for `{0}` must be 0, 1, true or false")]
    InvalidProjectionValue(String),
    #[error("projection cannot mix inclusion and exclusion")]
    MixedProjection,
}

#[derive(Clone, Debug)]
enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Field { name: String, conditions: Vec<Condition> },
}

#[derive(Clone, Debug)]
enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Projection {
    All,
    Include { fields: Vec<String>, with_id: bool },
    Exclude { fields: Vec<String> },
}

/// A validated filter plus projection, ready to run against documents.
#[derive(Clone, Debug)]
pub struct DocumentQuery {
    filter: FilterExpr,
    projection: Projection,
}

impl DocumentQuery {
    pub fn parse(
        filter: &Map<String, Value>,
        projection: &Map<String, Value>,
    ) -> Result<Self, QueryError> {
        Ok(Self { filter: parse_filter(filter)?, projection: parse_projection(projection)? })
    }

    pub fn matches(&self, document: &TopicDocument) -> bool {
        self.filter.matches(&document.to_fields())
    }

    pub fn project(&self, document: &TopicDocument) -> Map<String, Value> {
        let fields = document.to_fields();
        match &self.projection {
            Projection::All => fields,
            Projection::Include { fields: included, with_id } => fields
                .into_iter()
                .filter(|(name, _)| {
                    if name == ID_FIELD {
                        *with_id
                    } else {
                        included.contains(name)
                    }
                })
                .collect(),
            Projection::Exclude { fields: excluded } => {
                fields.into_iter().filter(|(name, _)| !excluded.contains(name)).collect()
            }
        }
    }

    /// Identifier every match must carry, when the filter pins `_id` by equality.
    pub fn pinned_id(&self) -> Option<&str> {
        self.filter.pinned_id()
    }

    /// First matching document in iteration order, projected.
    pub fn first_match<I>(&self, documents: I) -> Option<Map<String, Value>>
    where
        I: IntoIterator<Item = TopicDocument>,
    {
        documents.into_iter().find(|document| self.matches(document)).map(|document| {
            self.project(&document)
        })
    }
}

impl FilterExpr {
    fn matches(&self, fields: &Map<String, Value>) -> bool {
        match self {
            Self::And(children) => children.iter().all(|child| child.matches(fields)),
            Self::Or(children) => children.iter().any(|child| child.matches(fields)),
            Self::Field { name, conditions } => {
                let value = fields.get(name);
                conditions.iter().all(|condition| condition.matches(value))
            }
        }
    }
}

impl FilterExpr {
    fn pinned_id(&self) -> Option<&str> {
        match self {
            Self::And(children) => children.iter().find_map(Self::pinned_id),
            Self::Or(_) => None,
            Self::Field { name, conditions } if name == ID_FIELD => {
                conditions.iter().find_map(|condition| match condition {
                    Condition::Eq(Value::String(id)) => Some(id.as_str()),
                    _ => None,
                })
            }
            Self::Field { .. } => None,
        }
    }
}

impl Condition {
    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => values_equal(value, expected),
            Self::Ne(expected) => !values_equal(value, expected),
            Self::In(candidates) => {
                candidates.iter().any(|candidate| values_equal(value, candidate))
            }
            Self::Nin(candidates) => {
                !candidates.iter().any(|candidate| values_equal(value, candidate))
            }
            Self::Exists(expected) => value.is_some() == *expected,
            Self::Regex(pattern) => {
                matches!(value, Some(Value::String(text)) if pattern.is_match(text))
            }
        }
    }
}

// A missing field compares equal to null.
fn values_equal(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        Some(value) => value == expected,
        None => expected.is_null(),
    }
}

fn parse_filter(filter: &Map<String, Value>) -> Result<FilterExpr, QueryError> {
    let mut clauses = Vec::with_capacity(filter.len());

    for (key, value) in filter {
        match key.as_str() {
            "$and" => clauses.push(FilterExpr::And(parse_filter_list("$and", value)?)),
            "$or" => clauses.push(FilterExpr::Or(parse_filter_list("$or", value)?)),
            other if other.starts_with('$') => {
                return Err(QueryError::UnsupportedOperator(other.to_string()));
            }
            field => clauses.push(FilterExpr::Field {
                name: field.to_string(),
                conditions: parse_conditions(value)?,
            }),
        }
    }

    Ok(FilterExpr::And(clauses))
}

fn parse_filter_list(operator: &str, value: &Value) -> Result<Vec<FilterExpr>, QueryError> {
    let invalid =
        || QueryError::InvalidOperand { operator: operator.to_string(), expected: "an array of filters" };

    let items = value.as_array().ok_or_else(invalid)?;
    items
        .iter()
        .map(|item| item.as_object().ok_or_else(invalid).and_then(parse_filter))
        .collect()
}

fn parse_conditions(value: &Value) -> Result<Vec<Condition>, QueryError> {
    let operators = match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|key| key.starts_with('$')) => map,
        other => return Ok(vec![Condition::Eq(other.clone())]),
    };

    let mut conditions = Vec::with_capacity(operators.len());
    for (operator, operand) in operators {
        let condition = match operator.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$in" => Condition::In(array_operand(operator, operand)?),
            "$nin" => Condition::Nin(array_operand(operator, operand)?),
            "$exists" => Condition::Exists(truthy(operand).ok_or_else(|| {
                QueryError::InvalidOperand { operator: operator.clone(), expected: "a boolean" }
            })?),
            "$regex" => {
                let options = operators.get("$options").and_then(Value::as_str).unwrap_or("");
                Condition::Regex(regex_operand(operand, options)?)
            }
            "$options" if operators.contains_key("$regex") => continue,
            "$options" => {
                return Err(QueryError::InvalidOperand {
                    operator: operator.clone(),
                    expected: "a sibling $regex",
                })
            }
            other => return Err(QueryError::UnsupportedOperator(other.to_string())),
        };
        conditions.push(condition);
    }

    Ok(conditions)
}

fn array_operand(operator: &str, operand: &Value) -> Result<Vec<Value>, QueryError> {
    operand.as_array().cloned().ok_or_else(|| QueryError::InvalidOperand {
        operator: operator.to_string(),
        expected: "an array",
    })
}

fn regex_operand(operand: &Value, options: &str) -> Result<Regex, QueryError> {
    let pattern = operand.as_str().ok_or_else(|| QueryError::InvalidOperand {
        operator: "$regex".to_string(),
        expected: "a string pattern",
    })?;

    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|error| QueryError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: error.to_string(),
        })
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

fn parse_projection(projection: &Map<String, Value>) -> Result<Projection, QueryError> {
    let mut with_id = None;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, value) in projection {
        let include =
            truthy(value).ok_or_else(|| QueryError::InvalidProjectionValue(field.clone()))?;
        if field == ID_FIELD {
            with_id = Some(include);
        } else if include {
            included.push(field.clone());
        } else {
            excluded.push(field.clone());
        }
    }

    match (included.is_empty(), excluded.is_empty(), with_id) {
        (false, false, _) => Err(QueryError::MixedProjection),
        (false, true, with_id) => {
            Ok(Projection::Include { fields: included, with_id: with_id.unwrap_or(true) })
        }
        (true, false, Some(false)) => {
            excluded.push(ID_FIELD.to_string());
            Ok(Projection::Exclude { fields: excluded })
        }
        (true, false, _) => Ok(Projection::Exclude { fields: excluded }),
        (true, true, Some(true)) => Ok(Projection::Include { fields: Vec::new(), with_id: true }),
        (true, true, Some(false)) => Ok(Projection::Exclude { fields: vec![ID_FIELD.to_string()] }),
        (true, true, None) => Ok(Projection::All),
    }
}
