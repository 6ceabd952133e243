use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    AccessError, AccessProfile, AccessResult, AuthorityLevel, Branch, Department, GeoDirectory,
    PermissionSet, Province,
};

/// Stored role document, as written by role-assignment tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleS {
    pub name: String,
    pub authority: AuthorityLevel,
    pub department: Department,
    pub permissions: Vec<String>,
}

impl From<Role> for RoleS {
    fn from(value: Role) -> Self {
        RoleS {
            name: value.name,
            authority: value.authority,
            department: value.department,
            permissions: value.permissions,
        }
    }
}

impl From<RoleS> for Role {
    fn from(value: RoleS) -> Self {
        Role::new(&value.name, value.authority, value.department, value.permissions)
    }
}

/// Role definition with its grants compiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RoleS")]
#[serde(into = "RoleS")]
pub struct Role {
    pub name: String,
    pub authority: AuthorityLevel,
    pub department: Department,
    pub permissions: Vec<String>,
    pub compiled_permissions: PermissionSet,
}

impl Role {
    pub fn new(
        name: &str,
        authority: AuthorityLevel,
        department: Department,
        permissions: Vec<String>,
    ) -> Self {
        Role {
            name: name.to_string(),
            authority,
            department,
            compiled_permissions: PermissionSet::compile(&permissions),
            permissions,
        }
    }
}

/// Stored user document fields used to derive an [AccessProfile].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub home_branch: Option<String>,
    #[serde(default)]
    pub allowed_branches: Vec<String>,
    #[serde(default)]
    pub allowed_provinces: Vec<String>,
    /// Overrides the role's department.
    #[serde(default)]
    pub department: Option<Department>,
}

/// Role catalogue and geography loaded from a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub provinces: Vec<Province>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub fallback_roles: Option<Vec<String>>,
}

impl PolicyConfig {
    pub fn from_json(json: &str) -> AccessResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Snapshot of roles and geography swapped atomically by [AccessServiceUpdater].
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    roles: HashMap<String, Role>,
    directory: GeoDirectory,
}

impl Catalogue {
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn directory(&self) -> &GeoDirectory {
        &self.directory
    }
}

/// AccessService - derives session [AccessProfile]s from stored user documents by calling
/// [.resolve()][AccessService#method.resolve].
pub struct AccessService {
    catalogue: ArcSwap<Catalogue>,
    fallback_roles: Vec<String>,
}

/// AccessServiceBuilder - used when you create the access service.
pub struct AccessServiceBuilder {
    roles: HashMap<String, Role>,
    directory: GeoDirectory,
    fallback_roles: Option<Vec<String>>,
}

impl AccessServiceBuilder {
    pub fn build(&self) -> AccessService {
        AccessService {
            catalogue: ArcSwap::new(Arc::new(Catalogue {
                roles: self.roles.clone(),
                directory: self.directory.clone(),
            })),
            fallback_roles: match &self.fallback_roles {
                Some(roles) => roles.clone(),
                None => vec!["default".to_string()],
            },
        }
    }

    pub fn add_role(&mut self, role: Role) -> &mut Self {
        self.roles.insert(role.name.clone(), role);
        self
    }

    pub fn load_roles(&mut self, roles: Vec<Role>) -> &mut Self {
        for role in roles {
            self.add_role(role);
        }
        self
    }

    pub fn set_directory(&mut self, directory: GeoDirectory) -> &mut Self {
        self.directory = directory;
        self
    }

    /// Roles used when a user document carries no role.
    pub fn set_fallback_roles(&mut self, fallback_roles: Vec<String>) -> &mut Self {
        self.fallback_roles = Some(fallback_roles);
        self
    }
}

pub struct AccessServiceUpdater {
    roles: HashMap<String, Role>,
    directory: Option<GeoDirectory>,
}

impl AccessServiceUpdater {
    /// Adds one Role to map
    pub fn add_role(&mut self, role: Role) -> &mut Self {
        self.roles.insert(role.name.clone(), role);
        self
    }

    pub fn remove_role(&mut self, role_name: &str) -> &mut Self {
        self.roles.remove(role_name);
        self
    }

    /// Loads multiple roles from `Vec<Role>`
    pub fn load_roles(&mut self, roles: Vec<Role>) -> &mut Self {
        for role in roles {
            self.add_role(role);
        }
        self
    }

    /// Replaces the geography. Left untouched in the service when never called.
    pub fn set_directory(&mut self, directory: GeoDirectory) -> &mut Self {
        self.directory = Some(directory);
        self
    }

    pub fn update(&self, service: &AccessService) {
        let directory = match &self.directory {
            Some(directory) => directory.clone(),
            None => service.catalogue.load().directory.clone(),
        };
        service.catalogue.swap(Arc::new(Catalogue {
            roles: self.roles.clone(),
            directory,
        }));
        info!(roles = self.roles.len(), "Access catalogue swapped");
    }
}

impl AccessService {
    /// Creates builder ([AccessServiceBuilder]) for [AccessService]
    pub fn builder() -> AccessServiceBuilder {
        AccessServiceBuilder {
            roles: HashMap::new(),
            directory: GeoDirectory::default(),
            fallback_roles: None,
        }
    }

    pub fn from_config(config: PolicyConfig) -> AccessResult<Self> {
        let directory = GeoDirectory::new(config.provinces, config.branches)?;
        let mut builder = Self::builder();
        builder.load_roles(config.roles).set_directory(directory);
        if let Some(fallback) = config.fallback_roles {
            builder.set_fallback_roles(fallback);
        }
        Ok(builder.build())
    }

    /// Creates clean updater for replacing roles at runtime. Swapped atomically on
    /// [updater.update(&service)][AccessServiceUpdater#method.update].
    pub fn updater_clean(&self) -> AccessServiceUpdater {
        AccessServiceUpdater {
            roles: HashMap::new(),
            directory: None,
        }
    }

    /// Creates updater holding a copy of the current roles, handy for small edits.
    pub fn updater_copy(&self) -> AccessServiceUpdater {
        AccessServiceUpdater {
            roles: self.catalogue.load().roles.clone(),
            directory: None,
        }
    }

    pub fn catalogue(&self) -> Arc<Catalogue> {
        self.catalogue.load_full()
    }

    /// Derives the session profile of `user` against the current catalogue.
    ///
    /// The user's own branches are added to its allowed branches, and provinces are widened to cover
    /// every accessible branch. Province authority additionally reaches every branch of its provinces;
    /// admin authority reaches the whole directory.
    pub fn resolve(&self, user: &UserRecord) -> AccessResult<AccessProfile> {
        let catalogue = self.catalogue.load();
        let directory = &catalogue.directory;

        let role = if user.role.is_empty() {
            self.fallback_roles
                .iter()
                .find_map(|name| catalogue.roles.get(name))
                .ok_or_else(|| AccessError::UnknownRole(self.fallback_roles.join(",")))?
        } else {
            catalogue
                .roles
                .get(&user.role)
                .ok_or_else(|| AccessError::UnknownRole(user.role.clone()))?
        };

        let mut builder = AccessProfile::builder(&user.uid, role.authority);
        builder
            .department(user.department.unwrap_or(role.department))
            .grant_all(&role.compiled_permissions);

        if role.authority == AuthorityLevel::Admin {
            for province in directory.provinces() {
                builder.add_province(&province.id);
            }
            for branch in directory.branches() {
                builder.add_branch(&branch.code);
            }
            return Ok(builder.build());
        }

        let mut provinces = BTreeSet::new();
        for province in &user.allowed_provinces {
            if directory.province(province).is_none() {
                return Err(AccessError::UnknownProvince(province.clone()));
            }
            provinces.insert(province.as_str());
        }

        let own = [user.branch.as_deref(), user.home_branch.as_deref()];
        let mut branches = BTreeSet::new();
        for branch in user
            .allowed_branches
            .iter()
            .map(String::as_str)
            .chain(own.into_iter().flatten())
            .filter(|code| !code.is_empty())
        {
            let province = directory
                .province_of(branch)
                .ok_or_else(|| AccessError::UnknownBranch(branch.to_string()))?;
            provinces.insert(province);
            branches.insert(branch);
        }

        if role.authority == AuthorityLevel::Province {
            for province in &provinces {
                branches.extend(directory.branches_in(province).map(|b| b.code.as_str()));
            }
        }

        for province in &provinces {
            builder.add_province(province);
        }
        for branch in &branches {
            builder.add_branch(branch);
        }

        let profile = builder.build();
        debug!(
            uid = profile.uid(),
            provinces = provinces.len(),
            branches = branches.len(),
            "Resolved access profile"
        );
        Ok(profile)
    }
}
