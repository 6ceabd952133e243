//! Dealership 🚗 access policy library: department permissions, province/branch scoping, route guards
//! and report rollups.
//!
//! Library intended to be lightweight and free of I/O. Everything here evaluates an [AccessProfile]
//! against already-fetched data; the caller owns the database.
//!
//! Role catalogue and geography are serializable, so they may be stored anywhere (config files, DB,
//! external service). When a role is created or deserialized its grants compile into a [PermissionSet]
//! of layered sets: global wildcard (`"*"`), department wildcards (`"sales.*"`) and exact grants
//! (`"sales.edit"`).
//!
//! Example usage:
//!```
//! use dealer_rbac::*;
//!
//! fn dealership() {
//!     let config = PolicyConfig::from_json(r#"{
//!         "provinces": [{"id": "nma", "name": "Nakhon Ratchasima", "code": "30"}],
//!         "branches": [
//!             {"code": "NMA01", "name": "Korat", "provinceId": "nma"},
//!             {"code": "NMA02", "name": "Pak Chong", "provinceId": "nma"}
//!         ],
//!         "roles": [
//!             {"name": "sales", "authority": "branch", "department": "sales",
//!              "permissions": ["sales.view", "sales.edit"]},
//!             {"name": "manager", "authority": "province", "department": "sales",
//!              "permissions": ["sales.*", "accounting.view"]}
//!         ]
//!     }"#).unwrap();
//!
//!     let service = AccessService::from_config(config).unwrap();
//!
//!     // Resolve once per session and pass the profile around explicitly.
//!     let profile = service
//!         .resolve(&UserRecord {
//!             uid: "u-42".to_string(),
//!             role: "sales".to_string(),
//!             home_branch: Some("NMA01".to_string()),
//!             ..Default::default()
//!         })
//!         .unwrap();
//!
//!     assert!(has_permission(&profile, "sales.edit"));
//!     assert!(!has_permission(&profile, "sales.approve"));
//!     assert!(!has_permission(&profile, "not-a-token"));
//!
//!     // Single branch: both equality filters go into the query.
//!     let filters = query_filters(&profile);
//!     assert_eq!(filters.branch_code.as_deref(), Some("NMA01"));
//!
//!     assert_eq!(
//!         guard_route(Some(&profile), RouteScope::Branch, Some("NMA02")),
//!         GuardState::Denied
//!     );
//!
//!     // Runtime update of the role catalogue, swapped atomically.
//!     let mut updater = service.updater_copy();
//!     updater.add_role(Role::new(
//!         "sales",
//!         AuthorityLevel::Branch,
//!         Department::Sales,
//!         vec!["sales.*".to_string()],
//!     ));
//!     updater.update(&service);
//!
//!     let refreshed = service
//!         .resolve(&UserRecord {
//!             uid: "u-42".to_string(),
//!             role: "sales".to_string(),
//!             home_branch: Some("NMA01".to_string()),
//!             ..Default::default()
//!         })
//!         .unwrap();
//!     assert!(has_permission(&refreshed, "sales.approve"));
//! }
//!
//! dealership();
//!```
mod r#macro;

mod audit;
mod error;
mod geo;
mod guard;
mod permission;
mod profile;
pub mod report;
mod scope;
mod service;
mod store;

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod tests;

pub use audit::{AuditStamp, FieldChange, diff_fields};
pub use error::{AccessError, AccessResult};
pub use geo::{Branch, GeoDirectory, Province};
pub use guard::{GuardOutcome, GuardState, RouteScope, guard_branch_route, guard_route};
pub use permission::{Action, Department, Permission, PermissionSet, check_permission, has_permission};
pub use profile::{AccessProfile, AccessProfileBuilder, AuthorityLevel};
pub use scope::{
    BRANCH_FIELD, GeoKey, PROVINCE_FIELD, QueryFilters, can_access_branch, can_access_province,
    document_geo_key, enhance_for_write, filter_fetched_data, query_filters,
};
pub use service::{
    AccessService, AccessServiceBuilder, AccessServiceUpdater, Catalogue, PolicyConfig, Role, RoleS,
    UserRecord,
};
pub use store::{ChangeEvent, ChangeKind, DocumentStore, Subscription, VersionedDocument};
