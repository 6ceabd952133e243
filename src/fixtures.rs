// Shared test fixtures: two provinces, three branches and a handful of dealership roles.

use serde_json::{Map, Value};

use crate::{AccessProfile, AccessService, GeoDirectory, PolicyConfig, UserRecord};

pub const POLICY_JSON: &str = r#"{
    "provinces": [
        {"id": "nma", "name": "Nakhon Ratchasima", "code": "30"},
        {"id": "kkn", "name": "Khon Kaen", "code": "40"}
    ],
    "branches": [
        {"code": "NMA01", "name": "Korat Head Office", "provinceId": "nma"},
        {"code": "NMA02", "name": "Pak Chong", "provinceId": "nma"},
        {"code": "KKN01", "name": "Khon Kaen", "provinceId": "kkn"}
    ],
    "roles": [
        {"name": "admin", "authority": "admin", "department": "admin", "permissions": ["*"]},
        {
            "name": "province-manager",
            "authority": "province",
            "department": "sales",
            "permissions": ["sales.*", "accounting.view", "inventory.view"]
        },
        {
            "name": "branch-sales",
            "authority": "branch",
            "department": "sales",
            "permissions": ["sales.view", "sales.edit"]
        },
        {
            "name": "accountant",
            "authority": "department",
            "department": "accounting",
            "permissions": ["accounting.*"]
        },
        {"name": "default", "authority": "branch", "department": "sales", "permissions": ["sales.view"]}
    ]
}"#;

pub fn config() -> PolicyConfig {
    PolicyConfig::from_json(POLICY_JSON).unwrap()
}

pub fn directory() -> GeoDirectory {
    let config = config();
    GeoDirectory::new(config.provinces, config.branches).unwrap()
}

pub fn setup_service() -> AccessService {
    AccessService::from_config(config()).unwrap()
}

pub fn user(uid: &str, role: &str) -> UserRecord {
    UserRecord {
        uid: uid.to_string(),
        role: role.to_string(),
        ..Default::default()
    }
}

pub fn admin_profile() -> AccessProfile {
    setup_service().resolve(&user("root", "admin")).unwrap()
}

/// Branch-level salesperson at NMA01.
pub fn branch_sales_profile() -> AccessProfile {
    let mut record = user("sales-nma01", "branch-sales");
    record.home_branch = Some("NMA01".to_string());
    setup_service().resolve(&record).unwrap()
}

/// Province manager for `nma`, reaching both of its branches.
pub fn province_manager_profile() -> AccessProfile {
    let mut record = user("manager-nma", "province-manager");
    record.allowed_provinces = vec!["nma".to_string()];
    setup_service().resolve(&record).unwrap()
}

pub fn doc(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn rows(value: Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Array(items) => items.into_iter().map(doc).collect(),
        other => panic!("expected a JSON array, got {other}"),
    }
}
