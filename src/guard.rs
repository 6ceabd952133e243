use tracing::debug;

use crate::{AccessProfile, GeoDirectory, can_access_branch, can_access_province};

/// Render-time decision for a province/branch scoped page. Recomputed on every navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Profile not loaded yet.
    Pending,
    Allowed,
    Denied,
}

/// What the page should show. A denied route looks exactly like a missing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    Loading,
    Render(T),
    NotFound,
}

impl GuardState {
    pub fn render<T>(self, page: impl FnOnce() -> T) -> GuardOutcome<T> {
        match self {
            Self::Pending => GuardOutcome::Loading,
            Self::Allowed => GuardOutcome::Render(page()),
            Self::Denied => GuardOutcome::NotFound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    Province,
    Branch,
}

fn present(param: Option<&str>) -> Option<&str> {
    param.map(str::trim).filter(|value| !value.is_empty())
}

/// Guard for a route with a single `:provinceId` or `:branchCode` parameter.
pub fn guard_route(profile: Option<&AccessProfile>, scope: RouteScope, param: Option<&str>) -> GuardState {
    let Some(profile) = profile else {
        return GuardState::Pending;
    };
    let Some(value) = present(param) else {
        return GuardState::Denied;
    };

    let allowed = match scope {
        RouteScope::Province => can_access_province(profile, value),
        RouteScope::Branch => can_access_branch(profile, value),
    };

    if allowed {
        GuardState::Allowed
    } else {
        debug!(uid = profile.uid(), ?scope, "Route denied");
        GuardState::Denied
    }
}

/// Guard for nested `/province/:provinceId/branch/:branchCode` routes.
pub fn guard_branch_route(
    profile: Option<&AccessProfile>,
    geo: &GeoDirectory,
    province_id: Option<&str>,
    branch_code: Option<&str>,
) -> GuardState {
    let province = guard_route(profile, RouteScope::Province, province_id);
    if province != GuardState::Allowed {
        return province;
    }

    let branch = guard_route(profile, RouteScope::Branch, branch_code);
    if branch != GuardState::Allowed {
        return branch;
    }

    match (present(province_id), present(branch_code)) {
        (Some(province), Some(branch)) if geo.branch_belongs_to(branch, province) => {
            GuardState::Allowed
        }
        _ => GuardState::Denied,
    }
}
