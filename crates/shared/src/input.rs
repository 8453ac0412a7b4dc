//! Loosely-typed form input and its coercion into wire values.

use std::str::FromStr;

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// A numeric field as it arrives from a form: either a JSON number or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(Decimal),
    Text(String),
}

impl NumericInput {
    /// Parses the input as a decimal. Blank or malformed text yields `None`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            NumericInput::Number(value) => Some(*value),
            NumericInput::Text(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return None;
                }
                Decimal::from_str(raw)
                    .or_else(|_| Decimal::from_scientific(raw))
                    .ok()
            }
        }
    }

    /// Parses the input as a non-negative count, truncating any fraction.
    pub fn to_count(&self) -> Option<u32> {
        let value = self.to_decimal()?;
        if value.is_sign_negative() && !value.is_zero() {
            return None;
        }
        value.trunc().to_u32()
    }

    /// True for input a form leaves untouched: blank text or zero.
    pub fn is_blank(&self) -> bool {
        match self {
            NumericInput::Number(value) => value.is_zero(),
            NumericInput::Text(raw) => raw.trim().is_empty(),
        }
    }
}

impl From<Decimal> for NumericInput {
    fn from(value: Decimal) -> Self {
        NumericInput::Number(value)
    }
}

impl From<u32> for NumericInput {
    fn from(value: u32) -> Self {
        NumericInput::Number(Decimal::from(value))
    }
}

impl From<i64> for NumericInput {
    fn from(value: i64) -> Self {
        NumericInput::Number(Decimal::from(value))
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

impl From<String> for NumericInput {
    fn from(value: String) -> Self {
        NumericInput::Text(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdHolder {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<IdHolder>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One entry of an `assignedTo` field as produced by the various pickers:
/// a raw id, a `{value}` option, a `{user: {_id}}` assignment or a `{_id}` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssigneeRef {
    Id(String),
    Object(AssigneeObject),
    Absent,
}

impl AssigneeRef {
    pub fn wrapped(value: impl Into<String>) -> Self {
        AssigneeRef::Object(AssigneeObject {
            value: Some(value.into()),
            ..AssigneeObject::default()
        })
    }

    pub fn user(id: impl Into<String>) -> Self {
        AssigneeRef::Object(AssigneeObject {
            user: Some(IdHolder {
                id: Some(id.into()),
            }),
            ..AssigneeObject::default()
        })
    }

    pub fn record(id: impl Into<String>) -> Self {
        AssigneeRef::Object(AssigneeObject {
            id: Some(id.into()),
            ..AssigneeObject::default()
        })
    }

    /// The referenced id, first non-empty of `value`, `user._id`, `_id`.
    pub fn resolve(&self) -> Option<&str> {
        fn non_empty(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.is_empty())
        }

        match self {
            AssigneeRef::Id(id) => non_empty(Some(id.as_str())),
            AssigneeRef::Object(object) => non_empty(object.value.as_deref())
                .or_else(|| non_empty(object.user.as_ref().and_then(|u| u.id.as_deref())))
                .or_else(|| non_empty(object.id.as_deref())),
            AssigneeRef::Absent => None,
        }
    }
}

impl From<UserId> for AssigneeRef {
    fn from(value: UserId) -> Self {
        AssigneeRef::Id(value.0)
    }
}

impl From<&UserId> for AssigneeRef {
    fn from(value: &UserId) -> Self {
        AssigneeRef::Id(value.0.clone())
    }
}

impl From<&str> for AssigneeRef {
    fn from(value: &str) -> Self {
        AssigneeRef::Id(value.to_string())
    }
}

/// Reduces any mixture of assignee shapes to unique plain ids, keeping first
/// occurrence order and dropping entries that resolve to nothing.
pub fn normalize_assigned_to<I>(entries: I) -> Vec<UserId>
where
    I: IntoIterator,
    I::Item: Into<AssigneeRef>,
{
    let mut ids: Vec<UserId> = Vec::new();
    for entry in entries {
        let entry = entry.into();
        let Some(id) = entry.resolve() else {
            continue;
        };
        if ids.iter().all(|existing| existing.as_str() != id) {
            ids.push(UserId::new(id));
        }
    }
    ids
}

#[cfg(test)]
#[path = "tests/input_tests.rs"]
mod tests;
