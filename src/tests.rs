use crate::fixtures::*;
use crate::report::{Period, Rollup, aggregate};
use crate::*;

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Value, json};

#[test]
fn test_department_permissions() {
    let manager = province_manager_profile();

    // sales.* covers every sales action
    assert!(has_permission(&manager, "sales.view"));
    assert!(has_permission(&manager, "sales.approve"));
    assert!(has_permission(&manager, "sales.*"));

    // Exact grant only
    assert!(has_permission(&manager, "accounting.view"));
    assert!(!has_permission(&manager, "accounting.edit"));

    // Nothing outside the grants
    assert!(!has_permission(&manager, "hr.manage"));
    assert!(!has_permission(&manager, "*"));
    assert!(check_permission(&manager, "service.view").is_err());
}

#[test]
fn test_admin_has_all() {
    let admin = admin_profile();

    for dept in Department::ALL {
        for action in dept.actions() {
            let token = Permission::Exact(*dept, *action).to_string();
            assert!(has_permission(&admin, &token), "{token}");
        }
    }
    assert!(has_permission(&admin, "*"));
}

#[test]
fn test_malformed_tokens_fail_closed() {
    let admin = admin_profile();
    for token in ["", "sales", "garage.view", "hr.approve", "sales.view.x"] {
        assert!(!has_permission(&admin, token), "{token}");
        assert!(matches!(
            check_permission(&admin, token),
            Err(AccessError::PermissionDenied(t)) if t == token
        ));
    }
}

#[test]
fn test_resolve_widens_geography() {
    let service = setup_service();

    // Branch user with an extra allowed branch in another province
    let mut record = user("sales-2", "branch-sales");
    record.home_branch = Some("NMA02".to_string());
    record.allowed_branches = vec!["KKN01".to_string()];
    let profile = service.resolve(&record).unwrap();

    assert_eq!(
        profile.accessible_branches().iter().collect::<Vec<_>>(),
        vec!["KKN01", "NMA02"]
    );
    assert_eq!(
        profile.accessible_provinces().iter().collect::<Vec<_>>(),
        vec!["kkn", "nma"]
    );
    assert!(profile.validate(&directory()).is_ok());
    assert!(query_filters(&profile).is_empty());

    // Province authority reaches every branch of its province
    let manager = province_manager_profile();
    assert_eq!(
        manager.accessible_branches().iter().collect::<Vec<_>>(),
        vec!["NMA01", "NMA02"]
    );
    assert!(!can_access_branch(&manager, "KKN01"));

    // Admin reaches the whole directory
    let admin = admin_profile();
    assert_eq!(admin.accessible_branches().len(), 3);
    assert_eq!(admin.authority(), AuthorityLevel::Admin);
}

#[test]
fn test_resolve_rejects_unknown_geography() {
    let service = setup_service();

    let mut record = user("sales-3", "branch-sales");
    record.branch = Some("XXX".to_string());
    assert!(matches!(
        service.resolve(&record),
        Err(AccessError::UnknownBranch(b)) if b == "XXX"
    ));

    let mut record = user("manager-x", "province-manager");
    record.allowed_provinces = vec!["bkk".to_string()];
    assert!(matches!(
        service.resolve(&record),
        Err(AccessError::UnknownProvince(p)) if p == "bkk"
    ));
}

#[test]
fn test_department_override() {
    let service = setup_service();
    let mut record = user("acc-1", "accountant");
    record.department = Some(Department::Inventory);
    let profile = service.resolve(&record).unwrap();
    assert_eq!(profile.primary_department(), Department::Inventory);
    assert_eq!(profile.authority(), AuthorityLevel::Department);
    assert!(has_permission(&profile, "accounting.approve"));
}

#[test]
fn test_update_roles() {
    let service = setup_service();

    let mut record = user("sales-nma01", "branch-sales");
    record.home_branch = Some("NMA01".to_string());
    assert!(!has_permission(&service.resolve(&record).unwrap(), "sales.approve"));

    let mut updater = service.updater_copy();
    updater.add_role(Role::new(
        "branch-sales",
        AuthorityLevel::Branch,
        Department::Sales,
        vec!["sales.*".to_string()],
    ));
    updater.update(&service);

    assert!(has_permission(&service.resolve(&record).unwrap(), "sales.approve"));
    // Other roles survive a copy update
    assert!(service.catalogue().role("accountant").is_some());

    let mut updater = service.updater_clean();
    updater.add_role(Role::new(
        "admin",
        AuthorityLevel::Admin,
        Department::Admin,
        vec!["*".to_string()],
    ));
    updater.update(&service);

    assert!(matches!(
        service.resolve(&record),
        Err(AccessError::UnknownRole(_))
    ));
    // Geography stays when the updater does not replace it
    assert_eq!(service.catalogue().directory().province_of("NMA01"), Some("nma"));
}

#[test]
fn test_scoped_write_flow() {
    let profile = branch_sales_profile();
    let store = DocumentStore::new();

    let mut vehicle = doc(json!({"docNo": "SO-100", "model": "Tractor L5018"}));
    enhance_for_write(&profile, &mut vehicle).unwrap();
    let stamp = AuditStamp::for_write(&profile, None, &vehicle, chrono::Utc::now());
    stamp.apply(&mut vehicle);

    store
        .create_unique("sections/sales/vehicles", "v1", "docNo", vehicle.clone())
        .unwrap();

    // Second screen tries to save the same document number
    let mut duplicate = doc(json!({"docNo": "SO-100"}));
    enhance_for_write(&profile, &mut duplicate).unwrap();
    assert!(matches!(
        store.create_unique("sections/sales/vehicles", "v2", "docNo", duplicate),
        Err(AccessError::DuplicateRecord { .. })
    ));

    let fetched: Vec<_> = store
        .list("sections/sales/vehicles")
        .into_iter()
        .map(|(_, stored)| stored.data)
        .collect();
    let visible = filter_fetched_data(&province_manager_profile(), fetched, document_geo_key);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0]["editedBy"], json!("sales-nma01"));
}

fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("*".to_string()),
        "[a-z]{0,10}",
        "[a-z]{0,10}\\.[a-z*]{0,8}",
        (
            prop::sample::select(Department::ALL.to_vec()),
            prop::sample::select(vec!["view", "edit", "approve", "manage", "*"]),
        )
            .prop_map(|(dept, action)| format!("{dept}.{action}")),
    ]
}

fn arb_profile() -> impl Strategy<Value = (AccessProfile, Vec<String>)> {
    (
        prop::sample::select(vec![
            AuthorityLevel::Admin,
            AuthorityLevel::Province,
            AuthorityLevel::Branch,
            AuthorityLevel::Department,
        ]),
        prop::collection::vec(arb_token(), 0..6),
        prop::collection::btree_set(prop::sample::select(vec!["nma", "kkn", "bkk"]), 0..3),
        prop::collection::btree_set(
            prop::sample::select(vec!["NMA01", "NMA02", "KKN01", "BKK01"]),
            0..4,
        ),
    )
        .prop_map(|(authority, grants, provinces, branches)| {
            let mut builder = AccessProfile::builder("prop", authority);
            builder.grant_all(&PermissionSet::compile(&grants));
            for province in provinces {
                builder.add_province(province);
            }
            for branch in branches {
                builder.add_branch(branch);
            }
            (builder.build(), grants)
        })
}

fn reference_grant(grants: &[String], token: &str) -> bool {
    let Ok(requested) = token.parse::<Permission>() else {
        return false;
    };
    grants.iter().any(|grant| match grant.parse::<Permission>() {
        Ok(Permission::Global) => true,
        Ok(Permission::DeptWildcard(dept)) => requested.department() == Some(dept),
        Ok(exact) => exact == requested,
        Err(_) => false,
    })
}

fn arb_record() -> impl Strategy<Value = serde_json::Map<String, Value>> {
    (
        prop::option::of(prop::sample::select(vec!["nma", "kkn", "bkk", ""])),
        prop::option::of(prop::sample::select(vec!["NMA01", "NMA02", "KKN01", "BKK01"])),
        0u32..1000,
    )
        .prop_map(|(province, branch, n)| {
            let mut record = serde_json::Map::new();
            record.insert("n".to_string(), json!(n));
            if let Some(province) = province {
                record.insert(PROVINCE_FIELD.to_string(), json!(province));
            }
            if let Some(branch) = branch {
                record.insert(BRANCH_FIELD.to_string(), json!(branch));
            }
            record
        })
}

fn arb_amount() -> impl Strategy<Value = Value> {
    // Satang amounts as plain numbers, plain strings and thousands-separated strings.
    (0i64..500_000, 0u8..3).prop_map(|(satang, style)| {
        let (baht, cents) = (satang / 100, satang % 100);
        match style {
            0 => json!(satang as f64 / 100.0),
            1 => json!(format!("{baht}.{cents:02}")),
            _ => {
                let grouped = if baht >= 1000 {
                    format!("{},{:03}", baht / 1000, baht % 1000)
                } else {
                    baht.to_string()
                };
                json!(format!("{grouped}.{cents:02}"))
            }
        }
    })
}

fn arb_sale() -> impl Strategy<Value = serde_json::Map<String, Value>> {
    (
        2022i32..2025,
        1u32..13,
        1u32..29,
        prop::sample::select(vec!["A", "B", "C"]),
        prop::option::of(0i64..50),
        prop::option::of(arb_amount()),
        any::<bool>(),
    )
        .prop_map(|(year, month, day, branch, qty, amount, bad_date)| {
            let mut record = serde_json::Map::new();
            let date = if bad_date && day == 1 {
                "n/a".to_string()
            } else {
                format!("{year:04}-{month:02}-{day:02}")
            };
            record.insert("date".to_string(), json!(date));
            record.insert("branch".to_string(), json!(branch));
            if let Some(qty) = qty {
                record.insert("qty".to_string(), json!(qty));
            }
            if let Some(amount) = amount {
                record.insert("amount".to_string(), amount);
            }
            record
        })
}

proptest! {
    #[test]
    fn prop_has_permission_matches_grants((profile, grants) in arb_profile(), token in arb_token()) {
        prop_assert_eq!(has_permission(&profile, &token), reference_grant(&grants, &token));
    }

    #[test]
    fn prop_admin_filters_are_empty((profile, _) in arb_profile()) {
        let mut builder = AccessProfile::builder("admin", AuthorityLevel::Admin);
        for province in profile.accessible_provinces() {
            builder.add_province(province);
        }
        for branch in profile.accessible_branches() {
            builder.add_branch(branch);
        }
        prop_assert!(query_filters(&builder.build()).is_empty());
    }

    #[test]
    fn prop_single_province_is_filtered(
        province in prop::sample::select(vec!["nma", "kkn"]),
        authority in prop::sample::select(vec![
            AuthorityLevel::Province,
            AuthorityLevel::Branch,
            AuthorityLevel::Department,
        ]),
    ) {
        let profile = AccessProfile::builder("p", authority).add_province(province).build();
        let filters = query_filters(&profile);
        prop_assert_eq!(filters.province_id.as_deref(), Some(province));
    }

    #[test]
    fn prop_filter_is_idempotent(
        (profile, _) in arb_profile(),
        records in prop::collection::vec(arb_record(), 0..30),
    ) {
        let once = filter_fetched_data(&profile, records, document_geo_key);
        let twice = filter_fetched_data(&profile, once.clone(), document_geo_key);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_chained_rollup_equals_direct(sales in prop::collection::vec(arb_sale(), 0..40)) {
        let rollup = Rollup::new(&["branch"], &["qty", "amount"]).count_as("count");
        prop_assert_eq!(
            rollup.rollup(&sales, Period::Year),
            rollup.direct(&sales, Period::Year)
        );
        prop_assert_eq!(
            rollup.rollup(&sales, Period::Month),
            rollup.direct(&sales, Period::Month)
        );
    }

    #[test]
    fn prop_aggregate_preserves_totals(sales in prop::collection::vec(arb_sale(), 0..40)) {
        let grouped = aggregate(&sales, &["branch"], &["qty", "amount"]);
        for field in ["qty", "amount"] {
            let total: Decimal = sales.iter().map(|s| report::numeric_value(s.get(field))).sum();
            let grouped_total: Decimal =
                grouped.iter().map(|s| report::numeric_value(s.get(field))).sum();
            prop_assert_eq!(total, grouped_total);
        }
    }
}
