//! Conversion of raw tokens into typed values.
//!
//! [`coerce`] converts a single occurrence. For [`ValueKind::List`] it
//! converts one element; the parser accumulates elements across occurrences.

use crate::error::CoercionError;
use crate::types::{Value, ValueKind};

/// Converts `raw` into a [`Value`] of `kind` for the field `field`.
///
/// # Errors
///
/// Returns a [`CoercionError`] naming the token and field when the token
/// does not convert. Nothing panics on bad input.
///
/// # Examples
///
/// ```
/// use argot_core::{coerce, Value, ValueKind};
///
/// assert_eq!(coerce("-12", &ValueKind::Int, "offset").unwrap(), Value::Int(-12));
/// assert_eq!(
///     coerce("RELEASE", &ValueKind::Enum(vec!["debug".into(), "release".into()]), "profile").unwrap(),
///     Value::Str("release".into())
/// );
///
/// let err = coerce("ten", &ValueKind::UInt, "jobs").unwrap_err();
/// assert_eq!(err.token, "ten");
/// assert_eq!(err.field, "jobs");
/// ```
pub fn coerce(raw: &str, kind: &ValueKind, field: &str) -> Result<Value, CoercionError> {
    let fail = || CoercionError {
        token: raw.to_string(),
        field: field.to_string(),
        expected: kind.element().display_name(),
    };

    match kind {
        ValueKind::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(fail),
        ValueKind::Int => raw.parse::<i64>().map(Value::Int).map_err(|_| fail()),
        ValueKind::UInt => raw.parse::<u64>().map(Value::UInt).map_err(|_| fail()),
        ValueKind::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .ok_or_else(fail),
        ValueKind::String => Ok(Value::Str(raw.to_string())),
        ValueKind::Enum(members) => members
            .iter()
            .find(|m| m.eq_ignore_ascii_case(raw))
            .map(|m| Value::Str(m.clone()))
            .ok_or_else(fail),
        ValueKind::List(inner) => coerce(raw, inner, field),
    }
}

/// Parses the explicit boolean literals `true` and `false`, ignoring case.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_bool_literals() {
        assert_eq!(coerce("TRUE", &ValueKind::Bool, "f").unwrap(), Value::Bool(true));
        assert_eq!(coerce("false", &ValueKind::Bool, "f").unwrap(), Value::Bool(false));
        assert!(coerce("yes", &ValueKind::Bool, "f").is_err());
    }

    #[test]
    fn test_coerce_unsigned_rejects_negative() {
        let err = coerce("-1", &ValueKind::UInt, "jobs").unwrap_err();
        assert_eq!(err.expected, "unsigned integer");
        assert_eq!(coerce("42", &ValueKind::UInt, "jobs").unwrap(), Value::UInt(42));
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(coerce("0.5", &ValueKind::Float, "r").unwrap(), Value::Float(0.5));
        assert!(coerce("nan", &ValueKind::Float, "r").is_err());
        assert!(coerce("1e400", &ValueKind::Float, "r").is_err());
    }

    #[test]
    fn test_coerce_enum_keeps_declared_spelling() {
        let kind = ValueKind::Enum(vec!["Json".into(), "Yaml".into()]);
        assert_eq!(coerce("yaml", &kind, "format").unwrap(), Value::Str("Yaml".into()));

        let err = coerce("toml", &kind, "format").unwrap_err();
        assert_eq!(err.expected, "one of Json|Yaml");
    }

    #[test]
    fn test_coerce_list_converts_one_element() {
        let kind = ValueKind::List(Box::new(ValueKind::Int));
        assert_eq!(coerce("7", &kind, "n").unwrap(), Value::Int(7));

        let err = coerce("x", &kind, "n").unwrap_err();
        assert_eq!(err.expected, "integer");
    }

    #[test]
    fn test_coerce_string_is_verbatim() {
        assert_eq!(
            coerce(" spaced ", &ValueKind::String, "s").unwrap(),
            Value::Str(" spaced ".into())
        );
    }
}
