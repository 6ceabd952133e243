use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::AccessProfile;

pub const EDITED_BY: &str = "editedBy";
pub const EDITED_AT: &str = "editedAt";
pub const CREATED_BY: &str = "createdBy";
pub const CREATED_AT: &str = "createdAt";

const AUDIT_FIELDS: [&str; 4] = [EDITED_BY, EDITED_AT, CREATED_BY, CREATED_AT];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

/// Field-level changes between two versions of a document, sorted by field. Audit fields are ignored.
pub fn diff_fields(before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<FieldChange> {
    let fields: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    fields
        .into_iter()
        .filter(|field| !AUDIT_FIELDS.contains(&field.as_str()))
        .filter_map(|field| {
            let old = before.get(field).cloned().unwrap_or(Value::Null);
            let new = after.get(field).cloned().unwrap_or(Value::Null);
            (old != new).then(|| FieldChange {
                field: field.clone(),
                before: old,
                after: new,
            })
        })
        .collect()
}

/// Audit metadata attached to a write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStamp {
    pub edited_by: String,
    pub edited_at: DateTime<Utc>,
    pub created: bool,
    pub changes: Vec<FieldChange>,
}

impl AuditStamp {
    /// `before` is `None` for a new document.
    pub fn for_write(
        profile: &AccessProfile,
        before: Option<&Map<String, Value>>,
        after: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Self {
        let empty = Map::new();
        AuditStamp {
            edited_by: profile.uid().to_string(),
            edited_at: now,
            created: before.is_none(),
            changes: diff_fields(before.unwrap_or(&empty), after),
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.created && self.changes.is_empty()
    }

    /// Writes the stamp fields into `document`.
    pub fn apply(&self, document: &mut Map<String, Value>) {
        let at = Value::String(self.edited_at.to_rfc3339_opts(SecondsFormat::Millis, true));
        let by = Value::String(self.edited_by.clone());
        if self.created {
            document.insert(CREATED_BY.to_string(), by.clone());
            document.insert(CREATED_AT.to_string(), at.clone());
        }
        document.insert(EDITED_BY.to_string(), by);
        document.insert(EDITED_AT.to_string(), at);
    }
}
