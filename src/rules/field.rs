use crate::models::MessageRecord;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Sender,
    Subject,
    Snippet,
    ReceivedAt,
}

/// Synonym groups, checked in order; the first group containing the name wins.
const FIELD_SYNONYMS: &[(&[&str], Field)] = &[
    (&["from", "sender"], Field::Sender),
    (&["subject"], Field::Subject),
    (&["message", "snippet", "body"], Field::Snippet),
    (
        &["received", "received date", "received date/time", "internal_date"],
        Field::ReceivedAt,
    ),
];

impl Field {
    pub fn from_name(name: &str) -> Option<Field> {
        let name = name.trim().to_lowercase();
        FIELD_SYNONYMS
            .iter()
            .find(|(names, _)| names.contains(&name.as_str()))
            .map(|(_, field)| *field)
    }

    pub fn is_text(self) -> bool {
        !matches!(self, Field::ReceivedAt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Timestamp(Option<DateTime<Utc>>),
}

impl<'a> FieldValue<'a> {
    pub fn of(record: &'a MessageRecord, field: Field) -> Self {
        match field {
            Field::Sender => FieldValue::Text(&record.sender),
            Field::Subject => FieldValue::Text(&record.subject),
            Field::Snippet => FieldValue::Text(&record.snippet),
            Field::ReceivedAt => FieldValue::Timestamp(record.received_at),
        }
    }
}

/// Unknown field names resolve to an empty string so they simply never match.
pub fn resolve<'a>(record: &'a MessageRecord, field_name: &str) -> FieldValue<'a> {
    match Field::from_name(field_name) {
        Some(field) => FieldValue::of(record, field),
        None => FieldValue::Text(""),
    }
}
