use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Field holding the listener's receipt time.
pub const DATE_FIELD: &str = "date";

/// Format of the `date` field, local time of the relay listener.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A decoded form submission stamped with its receipt time.
///
/// Records are built once by the codec and never mutated afterwards; the
/// sink takes ownership when persisting one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(mut fields: BTreeMap<String, String>, received_at: NaiveDateTime) -> Self {
        fields.insert(
            DATE_FIELD.to_string(),
            received_at.format(DATE_FORMAT).to_string(),
        );
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn date(&self) -> &str {
        self.get(DATE_FIELD).unwrap_or_default()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}
