use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{AccessError, AccessProfile, AccessResult};

crate::define_departments! {
    /// Business departments of the dealership. Closed set.
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Department {
        Accounting => "accounting" { View, Edit, Approve },
        Sales => "sales" { View, Edit, Approve },
        Service => "service" { View, Edit, Approve },
        Inventory => "inventory" { View, Edit, Approve },
        Hr => "hr" { View, Edit, Manage },
        Admin => "admin" { View, Edit, Manage },
    }
}

/// Action part of a permission token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Edit,
    Approve,
    Manage,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Approve => "approve",
            Self::Manage => "manage",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "view" => Some(Self::View),
            "edit" => Some(Self::Edit),
            "approve" => Some(Self::Approve),
            "manage" => Some(Self::Manage),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed permission token.
///
/// `"sales.edit"` is [Permission::Exact], `"sales.*"` is [Permission::DeptWildcard] and `"*"` is
/// [Permission::Global]. Serializes as its token string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    Exact(Department, Action),
    DeptWildcard(Department),
    Global,
}

impl Permission {
    pub fn department(&self) -> Option<Department> {
        match self {
            Self::Exact(dept, _) | Self::DeptWildcard(dept) => Some(*dept),
            Self::Global => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exact(dept, action) => write!(f, "{}.{}", dept, action),
            Self::DeptWildcard(dept) => write!(f, "{}.*", dept),
            Self::Global => f.write_str("*"),
        }
    }
}

impl FromStr for Permission {
    type Err = AccessError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let malformed = || AccessError::MalformedPermission(token.to_string());

        if token == "*" {
            return Ok(Self::Global);
        }

        let (dept, action) = token.split_once('.').ok_or_else(malformed)?;
        let dept = Department::parse(dept).ok_or_else(malformed)?;

        if action == "*" {
            return Ok(Self::DeptWildcard(dept));
        }

        match Action::parse(action) {
            Some(action) if dept.accepts(action) => Ok(Self::Exact(dept, action)),
            _ => Err(malformed()),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = AccessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

/// Granted permissions compiled into layered sets: global wildcard, department wildcards, exact grants.
///
/// Narrower entries already covered by a wider one are dropped at compile time, so a lookup is at most
/// three hash lookups.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Permission>", into = "Vec<Permission>")]
pub struct PermissionSet {
    global: bool,
    department_wildcards: HashSet<Department>,
    exact: HashSet<(Department, Action)>,
}

impl PermissionSet {
    /// Compile raw grant strings. Malformed entries are skipped (and logged), never granted.
    pub fn compile<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let permissions = tokens.into_iter().filter_map(|token| {
            let token = token.as_ref();
            match token.parse::<Permission>() {
                Ok(permission) => Some(permission),
                Err(_) => {
                    warn!(token, "Skipping malformed permission grant");
                    None
                }
            }
        });
        Self::from_permissions(permissions)
    }

    pub fn from_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut compiled = PermissionSet::default();

        for permission in permissions {
            match permission {
                Permission::Global => {
                    return PermissionSet {
                        global: true,
                        ..Default::default()
                    };
                }
                Permission::DeptWildcard(dept) => {
                    compiled.department_wildcards.insert(dept);
                    compiled.exact.retain(|(d, _)| *d != dept);
                }
                Permission::Exact(dept, action) => {
                    if !compiled.department_wildcards.contains(&dept) {
                        compiled.exact.insert((dept, action));
                    }
                }
            }
        }

        compiled
    }

    pub fn is_empty(&self) -> bool {
        !self.global && self.department_wildcards.is_empty() && self.exact.is_empty()
    }

    #[inline]
    pub fn allows(&self, permission: &Permission) -> bool {
        if self.global {
            return true;
        }

        match permission {
            Permission::Global => false,
            Permission::DeptWildcard(dept) => self.department_wildcards.contains(dept),
            Permission::Exact(dept, action) => {
                self.department_wildcards.contains(dept) || self.exact.contains(&(*dept, *action))
            }
        }
    }

    /// String form of [PermissionSet::allows]. Malformed tokens are not granted.
    pub fn allows_token(&self, token: &str) -> bool {
        match token.parse::<Permission>() {
            Ok(permission) => self.allows(&permission),
            Err(_) => false,
        }
    }

    /// Every concrete `department.action` pair this set grants, sorted.
    pub fn effective(&self) -> Vec<Permission> {
        let mut granted: Vec<Permission> = Department::ALL
            .iter()
            .flat_map(|dept| {
                dept.actions()
                    .iter()
                    .map(move |action| Permission::Exact(*dept, *action))
            })
            .filter(|permission| self.allows(permission))
            .collect();
        granted.sort();
        granted
    }

    /// Compact list of grants, wildcards included.
    pub fn permissions(&self) -> Vec<Permission> {
        if self.global {
            return vec![Permission::Global];
        }

        let mut permissions: Vec<Permission> = self
            .department_wildcards
            .iter()
            .map(|dept| Permission::DeptWildcard(*dept))
            .chain(
                self.exact
                    .iter()
                    .map(|(dept, action)| Permission::Exact(*dept, *action)),
            )
            .collect();
        permissions.sort();
        permissions
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(value: Vec<Permission>) -> Self {
        PermissionSet::from_permissions(value)
    }
}

impl From<PermissionSet> for Vec<Permission> {
    fn from(value: PermissionSet) -> Self {
        value.permissions()
    }
}

/// Whether `profile` is granted `token`. Fails closed on malformed tokens.
pub fn has_permission(profile: &AccessProfile, token: &str) -> bool {
    let granted = profile.granted_permissions().allows_token(token);
    if !granted {
        debug!(uid = profile.uid(), token, "Permission not granted");
    }
    granted
}

/// Same as [has_permission], for call sites that propagate with `?`.
pub fn check_permission(profile: &AccessProfile, token: &str) -> AccessResult<()> {
    if has_permission(profile, token) {
        Ok(())
    } else {
        Err(AccessError::PermissionDenied(token.to_string()))
    }
}
