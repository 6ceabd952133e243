//! Geographic scoping of queries, fetched records and writes.
//!
//! The document store only supports equality filters, so a profile spanning a single province or branch
//! gets that value injected into the query, while broader profiles fall back to
//! [filter_fetched_data] after the fetch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{AccessError, AccessProfile, AccessResult};

pub const PROVINCE_FIELD: &str = "provinceId";
pub const BRANCH_FIELD: &str = "branchCode";

/// Set membership only. Admin profiles resolved by the service already hold the whole directory, so ids
/// outside it are refused for them too.
pub fn can_access_province(profile: &AccessProfile, province_id: &str) -> bool {
    profile.accessible_provinces().contains(province_id)
}

pub fn can_access_branch(profile: &AccessProfile, branch_code: &str) -> bool {
    profile.accessible_branches().contains(branch_code)
}

/// Equality filters to inject into an outgoing query. Empty means unrestricted (or post-filter needed).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_code: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.province_id.is_none() && self.branch_code.is_none()
    }

    /// `(field, value)` pairs in the order they should be applied.
    pub fn equality_clauses(&self) -> Vec<(&'static str, &str)> {
        let mut clauses = Vec::with_capacity(2);
        if let Some(province) = &self.province_id {
            clauses.push((PROVINCE_FIELD, province.as_str()));
        }
        if let Some(branch) = &self.branch_code {
            clauses.push((BRANCH_FIELD, branch.as_str()));
        }
        clauses
    }
}

pub fn query_filters(profile: &AccessProfile) -> QueryFilters {
    if profile.is_admin() {
        return QueryFilters::default();
    }

    QueryFilters {
        province_id: single(profile.accessible_provinces().iter()),
        branch_code: single(profile.accessible_branches().iter()),
    }
}

fn single<'a>(mut values: impl Iterator<Item = &'a String>) -> Option<String> {
    match (values.next(), values.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    }
}

/// Geography of one record as seen by [filter_fetched_data].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoKey<'a> {
    pub province_id: Option<&'a str>,
    pub branch_code: Option<&'a str>,
}

impl<'a> GeoKey<'a> {
    pub fn new(province_id: Option<&'a str>, branch_code: Option<&'a str>) -> Self {
        GeoKey {
            province_id,
            branch_code,
        }
    }
}

/// Extractor for loosely-typed documents carrying `provinceId` / `branchCode` fields.
pub fn document_geo_key(document: &Map<String, Value>) -> GeoKey<'_> {
    let text = |field: &str| {
        document
            .get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    };
    GeoKey::new(text(PROVINCE_FIELD), text(BRANCH_FIELD))
}

/// Keeps the records whose geography the profile can access.
///
/// The branch check applies only when the record carries a branch code. Records without a province are
/// dropped for non-admin profiles. Admin profiles keep everything.
pub fn filter_fetched_data<T, F>(
    profile: &AccessProfile,
    records: impl IntoIterator<Item = T>,
    extractor: F,
) -> Vec<T>
where
    F: Fn(&T) -> GeoKey<'_>,
{
    if profile.is_admin() {
        return records.into_iter().collect();
    }

    let mut dropped = 0usize;
    let kept: Vec<T> = records
        .into_iter()
        .filter(|record| {
            let key = extractor(record);
            let visible = key
                .province_id
                .is_some_and(|province| can_access_province(profile, province))
                && key
                    .branch_code
                    .is_none_or(|branch| can_access_branch(profile, branch));
            if !visible {
                dropped += 1;
            }
            visible
        })
        .collect();

    if dropped > 0 {
        debug!(uid = profile.uid(), dropped, "Filtered out-of-scope records");
    }
    kept
}

/// Prepares a document for writing: fills geography from single-value scope and rejects geography the
/// profile cannot write to.
pub fn enhance_for_write(profile: &AccessProfile, document: &mut Map<String, Value>) -> AccessResult<()> {
    let filters = query_filters(profile);

    scope_field(
        document,
        PROVINCE_FIELD,
        filters.province_id,
        |province| can_access_province(profile, province),
    )?;
    scope_field(
        document,
        BRANCH_FIELD,
        filters.branch_code,
        |branch| can_access_branch(profile, branch),
    )?;

    Ok(())
}

fn scope_field(
    document: &mut Map<String, Value>,
    field: &'static str,
    default: Option<String>,
    allowed: impl Fn(&str) -> bool,
) -> AccessResult<()> {
    let current = document
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    match current {
        Some(value) if !allowed(&value) => Err(AccessError::OutOfScope { field, value }),
        Some(_) => Ok(()),
        None => {
            if let Some(value) = default {
                document.insert(field.to_string(), Value::String(value));
            }
            Ok(())
        }
    }
}
