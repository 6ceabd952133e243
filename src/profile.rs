use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AccessError, AccessResult, Department, GeoDirectory, Permission, PermissionSet};

/// Breadth of a user's default scope, broadest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityLevel {
    Admin,
    Province,
    Branch,
    Department,
}

/// Immutable access context of one authenticated session.
///
/// Resolved once at session load (see [AccessService::resolve][crate::AccessService#method.resolve])
/// and passed explicitly to every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessProfile {
    uid: String,
    authority: AuthorityLevel,
    primary_department: Department,
    accessible_provinces: BTreeSet<String>,
    accessible_branches: BTreeSet<String>,
    granted_permissions: PermissionSet,
}

impl AccessProfile {
    pub fn builder(uid: &str, authority: AuthorityLevel) -> AccessProfileBuilder {
        AccessProfileBuilder {
            uid: uid.to_string(),
            authority,
            primary_department: None,
            accessible_provinces: BTreeSet::new(),
            accessible_branches: BTreeSet::new(),
            granted: Vec::new(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn authority(&self) -> AuthorityLevel {
        self.authority
    }

    pub fn is_admin(&self) -> bool {
        self.authority == AuthorityLevel::Admin
    }

    pub fn primary_department(&self) -> Department {
        self.primary_department
    }

    pub fn accessible_provinces(&self) -> &BTreeSet<String> {
        &self.accessible_provinces
    }

    pub fn accessible_branches(&self) -> &BTreeSet<String> {
        &self.accessible_branches
    }

    pub fn granted_permissions(&self) -> &PermissionSet {
        &self.granted_permissions
    }

    pub fn has_permission(&self, token: &str) -> bool {
        crate::has_permission(self, token)
    }

    /// Checks that every accessible branch lies in an accessible province of `geo`.
    pub fn validate(&self, geo: &GeoDirectory) -> AccessResult<()> {
        for province in &self.accessible_provinces {
            if geo.province(province).is_none() {
                return Err(AccessError::UnknownProvince(province.clone()));
            }
        }

        for branch in &self.accessible_branches {
            let province = geo
                .province_of(branch)
                .ok_or_else(|| AccessError::UnknownBranch(branch.clone()))?;
            if !self.accessible_provinces.contains(province) {
                return Err(AccessError::BranchOutsideScope {
                    branch: branch.clone(),
                });
            }
        }

        Ok(())
    }
}

pub struct AccessProfileBuilder {
    uid: String,
    authority: AuthorityLevel,
    primary_department: Option<Department>,
    accessible_provinces: BTreeSet<String>,
    accessible_branches: BTreeSet<String>,
    granted: Vec<Permission>,
}

impl AccessProfileBuilder {
    pub fn build(&self) -> AccessProfile {
        AccessProfile {
            uid: self.uid.clone(),
            authority: self.authority,
            primary_department: self.primary_department.unwrap_or(Department::Sales),
            accessible_provinces: self.accessible_provinces.clone(),
            accessible_branches: self.accessible_branches.clone(),
            granted_permissions: PermissionSet::from_permissions(self.granted.iter().copied()),
        }
    }

    pub fn department(&mut self, department: Department) -> &mut Self {
        self.primary_department = Some(department);
        self
    }

    pub fn add_province(&mut self, province_id: &str) -> &mut Self {
        self.accessible_provinces.insert(province_id.to_string());
        self
    }

    pub fn add_branch(&mut self, branch_code: &str) -> &mut Self {
        self.accessible_branches.insert(branch_code.to_string());
        self
    }

    pub fn grant(&mut self, permission: Permission) -> &mut Self {
        self.granted.push(permission);
        self
    }

    pub fn grant_all(&mut self, permissions: &PermissionSet) -> &mut Self {
        self.granted.extend(permissions.permissions());
        self
    }

    /// Grants a permission given as a token string.
    pub fn grant_token(&mut self, token: &str) -> AccessResult<&mut Self> {
        let permission = token.parse()?;
        self.granted.push(permission);
        Ok(self)
    }
}
