//! Predicate alias tables and condition evaluation.

use super::field::{Field, FieldValue};
use super::{Condition, ConditionValue};
use crate::error::EvalError;
use crate::models::MessageRecord;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPredicate {
    Contains,
    DoesNotContain,
    Equals,
    DoesNotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePredicate {
    /// Received within the last `n` days.
    LessThanDays,
    /// Received more than `n` days ago.
    GreaterThanDays,
    LessThan,
    GreaterThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Text(TextPredicate),
    Date(DatePredicate),
}

pub const TEXT_PREDICATE_ALIASES: &[(&str, TextPredicate)] = &[
    ("contains", TextPredicate::Contains),
    ("not contains", TextPredicate::DoesNotContain),
    ("does not contain", TextPredicate::DoesNotContain),
    ("equals", TextPredicate::Equals),
    ("equal", TextPredicate::Equals),
    ("does not equal", TextPredicate::DoesNotEqual),
    ("not equal", TextPredicate::DoesNotEqual),
];

pub const DATE_PREDICATE_ALIASES: &[(&str, DatePredicate)] = &[
    ("lt_days", DatePredicate::LessThanDays),
    ("less_than_days", DatePredicate::LessThanDays),
    ("gt_days", DatePredicate::GreaterThanDays),
    ("greater_than_days", DatePredicate::GreaterThanDays),
    ("lt", DatePredicate::LessThan),
    ("less_than", DatePredicate::LessThan),
    ("gt", DatePredicate::GreaterThan),
    ("greater_than", DatePredicate::GreaterThan),
];

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    let name = name.trim().to_lowercase();
    table
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, p)| *p)
}

impl Predicate {
    /// Normalizes `name` through the alias table matching the field's category.
    pub fn for_field(field: Field, name: &str) -> Option<Predicate> {
        if field.is_text() {
            lookup(TEXT_PREDICATE_ALIASES, name).map(Predicate::Text)
        } else {
            lookup(DATE_PREDICATE_ALIASES, name).map(Predicate::Date)
        }
    }

    pub fn apply(
        self,
        target: FieldValue<'_>,
        value: Option<&ConditionValue>,
        now: DateTime<Utc>,
    ) -> Result<bool, EvalError> {
        match (self, target) {
            (Predicate::Text(pred), FieldValue::Text(target)) => {
                let value = value.map(ToString::to_string).unwrap_or_default();
                Ok(pred.apply(&target.to_lowercase(), &value.to_lowercase()))
            }
            (Predicate::Date(_), FieldValue::Timestamp(None)) => Ok(false),
            (Predicate::Date(pred), FieldValue::Timestamp(Some(received))) => {
                pred.apply(received, value, now)
            }
            (Predicate::Text(_), FieldValue::Timestamp(_))
            | (Predicate::Date(_), FieldValue::Text(_)) => Ok(false),
        }
    }
}

impl TextPredicate {
    pub fn apply(self, target: &str, value: &str) -> bool {
        match self {
            TextPredicate::Contains => target.contains(value),
            TextPredicate::DoesNotContain => !target.contains(value),
            TextPredicate::Equals => target == value,
            TextPredicate::DoesNotEqual => target != value,
        }
    }
}

impl DatePredicate {
    pub fn apply(
        self,
        received: DateTime<Utc>,
        value: Option<&ConditionValue>,
        now: DateTime<Utc>,
    ) -> Result<bool, EvalError> {
        match self {
            DatePredicate::LessThanDays => Ok(received > days_before(now, value)?),
            DatePredicate::GreaterThanDays => Ok(received < days_before(now, value)?),
            DatePredicate::LessThan => Ok(received < date_literal(value)?),
            DatePredicate::GreaterThan => Ok(received > date_literal(value)?),
        }
    }
}

fn days_before(now: DateTime<Utc>, value: Option<&ConditionValue>) -> Result<DateTime<Utc>, EvalError> {
    let invalid = || EvalError::InvalidDays(value.map(ToString::to_string).unwrap_or_default());
    let days = match value {
        Some(ConditionValue::Integer(n)) => *n,
        Some(ConditionValue::Float(f)) if f.is_finite() && f.fract() == 0.0 => *f as i64,
        Some(ConditionValue::Text(s)) => s.trim().parse().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    chrono::Duration::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(invalid)
}

fn date_literal(value: Option<&ConditionValue>) -> Result<DateTime<Utc>, EvalError> {
    let raw = value.map(ToString::to_string).unwrap_or_default();
    match value {
        Some(ConditionValue::Text(s)) => parse_date(s).ok_or(EvalError::InvalidDate(raw)),
        _ => Err(EvalError::InvalidDate(raw)),
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y"];

/// Parses a date literal from a rule. Values without an offset are taken as local time.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn evaluate(record: &MessageRecord, condition: &Condition) -> Result<bool, EvalError> {
    evaluate_at(record, condition, Utc::now())
}

/// Evaluates one condition with `now` as the reference point for day-relative predicates.
/// Unknown fields and unknown predicates never match.
pub fn evaluate_at(
    record: &MessageRecord,
    condition: &Condition,
    now: DateTime<Utc>,
) -> Result<bool, EvalError> {
    let Some(field) = Field::from_name(&condition.field) else {
        debug!("Unknown field {:?}; condition does not match", condition.field);
        return Ok(false);
    };
    let Some(predicate) = Predicate::for_field(field, &condition.predicate) else {
        warn!(
            "Unknown predicate {:?} for field {:?}; condition does not match",
            condition.predicate, condition.field
        );
        return Ok(false);
    };
    predicate.apply(
        FieldValue::of(record, field),
        condition.value.as_ref(),
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::record;
    use chrono::Duration;

    fn text(s: &str) -> ConditionValue {
        ConditionValue::Text(s.to_string())
    }

    fn received_days_ago(days: i64, now: DateTime<Utc>) -> MessageRecord {
        let mut rec = record("abc123");
        rec.sender = "Poorvi@example.com".to_string();
        rec.received_at = Some(now - Duration::days(days));
        rec
    }

    #[test]
    fn every_alias_normalizes_to_a_predicate() {
        for (alias, pred) in TEXT_PREDICATE_ALIASES {
            assert_eq!(Predicate::for_field(Field::Subject, alias), Some(Predicate::Text(*pred)));
            assert_eq!(
                Predicate::for_field(Field::Subject, &alias.to_uppercase()),
                Some(Predicate::Text(*pred))
            );
        }
        for (alias, pred) in DATE_PREDICATE_ALIASES {
            assert_eq!(Predicate::for_field(Field::ReceivedAt, alias), Some(Predicate::Date(*pred)));
        }
    }

    #[test]
    fn aliases_do_not_cross_categories() {
        assert_eq!(Predicate::for_field(Field::Subject, "lt_days"), None);
        assert_eq!(Predicate::for_field(Field::ReceivedAt, "contains"), None);
    }

    #[test]
    fn unlisted_alias_never_matches() {
        let rec = record("abc123");
        for (field, pred) in [("subject", "starts with"), ("received", "before"), ("from", "like")] {
            let cond = Condition::new(field, pred, text("happyfox"));
            assert!(!evaluate(&rec, &cond).unwrap(), "{field} {pred}");
        }
    }

    #[test]
    fn text_predicates_ignore_case_on_both_sides() {
        let rec = received_days_ago(3, Utc::now());
        let cases = [
            ("subject", "contains", "HAPPYFOX", true),
            ("Subject", "contains", "happyfox", true),
            ("subject", "not contains", "happyfox", false),
            ("from", "does not contain", "other.com", true),
            ("from", "equals", "poorvi@EXAMPLE.com", true),
            ("from", "equal", "poorvi@example.co", false),
            ("from", "does not equal", "POORVI@example.com", false),
            ("from", "Not Equal", "someone@example.com", true),
            ("body", "contains", "ASSIGNMENT DETAILS", true),
        ];
        for (field, pred, value, expected) in cases {
            let cond = Condition::new(field, pred, text(value));
            assert_eq!(evaluate(&rec, &cond).unwrap(), expected, "{field} {pred} {value}");
        }
    }

    #[test]
    fn integer_value_compares_as_text() {
        let mut rec = record("abc123");
        rec.subject = "Invoice 2025".to_string();
        let cond = Condition::new("subject", "contains", ConditionValue::Integer(2025));
        assert!(evaluate(&rec, &cond).unwrap());
    }

    #[test]
    fn day_boundaries() {
        let now = Utc::now();
        let rec = received_days_ago(3, now);
        let days = |pred: &str, n: i64| {
            evaluate_at(&rec, &Condition::new("internal_date", pred, ConditionValue::Integer(n)), now)
                .unwrap()
        };

        assert!(days("less_than_days", 5));
        assert!(!days("greater_than_days", 4));
        assert!(days("greater_than_days", 2));
        assert!(!days("lt_days", 2));
        assert!(days("gt_days", 2));
    }

    #[test]
    fn day_count_may_be_a_string() {
        let now = Utc::now();
        let rec = received_days_ago(3, now);
        let cond = Condition::new("received", "lt_days", text(" 5 "));
        assert!(evaluate_at(&rec, &cond, now).unwrap());
    }

    #[test]
    fn non_numeric_day_count_is_an_error() {
        let rec = received_days_ago(3, Utc::now());
        let cond = Condition::new("received", "lt_days", text("five"));
        assert!(matches!(evaluate(&rec, &cond), Err(EvalError::InvalidDays(_))));
    }

    #[test]
    fn whole_float_is_a_day_count_and_others_are_errors() {
        let now = Utc::now();
        let rec = received_days_ago(3, now);
        let days = |value: ConditionValue| {
            evaluate_at(&rec, &Condition::new("received", "lt_days", value), now)
        };

        assert!(days(ConditionValue::Float(5.0)).unwrap());
        assert!(matches!(days(ConditionValue::Float(2.5)), Err(EvalError::InvalidDays(_))));
        assert!(matches!(days(ConditionValue::Bool(true)), Err(EvalError::InvalidDays(_))));
        assert!(matches!(
            days(ConditionValue::Other(serde_json::json!({"n": 5}))),
            Err(EvalError::InvalidDays(_))
        ));
    }

    #[test]
    fn non_text_date_literal_is_an_error() {
        let rec = record("abc123");
        let cond = Condition::new("received", "less_than", ConditionValue::Float(2025.0));
        assert!(matches!(evaluate(&rec, &cond), Err(EvalError::InvalidDate(_))));
    }

    #[test]
    fn absolute_date_predicates() {
        let rec = record("abc123"); // 2025-01-01T09:30:00Z
        let check = |pred: &str, value: &str| {
            evaluate(&rec, &Condition::new("received date", pred, text(value))).unwrap()
        };

        assert!(check("less_than", "2025-06-01"));
        assert!(!check("greater_than", "2025-06-01"));
        assert!(check("gt", "2024-12-01"));
        assert!(check("lt", "2025-01-01T10:00:00Z"));
        assert!(!check("lt", "2025-01-01T09:00:00+00:00"));
        assert!(check("greater_than", "Tue, 31 Dec 2024 23:00:00 +0000"));
    }

    #[test]
    fn unparseable_date_literal_is_an_error() {
        let rec = record("abc123");
        let cond = Condition::new("received", "less_than", text("someday"));
        assert!(matches!(evaluate(&rec, &cond), Err(EvalError::InvalidDate(_))));
    }

    #[test]
    fn absent_timestamp_never_matches() {
        let mut rec = record("abc123");
        rec.received_at = None;
        for pred in ["lt_days", "gt_days", "lt", "gt"] {
            let cond = Condition::new("received", pred, ConditionValue::Integer(1));
            assert!(!evaluate(&rec, &cond).unwrap());
        }
    }

    #[test]
    fn unknown_field_never_matches() {
        let rec = record("abc123");
        let cond = Condition::new("cc", "contains", text(""));
        assert!(!evaluate(&rec, &cond).unwrap());
    }

    #[test]
    fn parse_date_formats() {
        assert!(parse_date("2025-01-01").is_some());
        assert!(parse_date("2025/01/01").is_some());
        assert!(parse_date("01 Jan 2025").is_some());
        assert!(parse_date("2025-01-01 12:30").is_some());
        assert!(parse_date("2025-01-01T12:30:15").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
