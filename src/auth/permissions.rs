/*!
 * # Permissions Module
 *
 * Permission names, per-permission base scopes and the `authorize` gate that
 * handlers call before invoking the transfer lifecycle.
 */

use super::AuthUser;
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Common permission string constants for compile-time safety
pub mod consts {
    pub const TRANSFER_AGREEMENT_READ: &str = "transfer_agreement:read";
    pub const TRANSFER_AGREEMENT_WRITE: &str = "transfer_agreement:write";
    pub const SHIPMENT_READ: &str = "shipment:read";
    pub const SHIPMENT_WRITE: &str = "shipment:write";
}

/// Bases a permission is granted for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseScope {
    All,
    Bases(Vec<i32>),
}

impl BaseScope {
    pub fn covers(&self, base_id: i32) -> bool {
        match self {
            BaseScope::All => true,
            BaseScope::Bases(ids) => ids.contains(&base_id),
        }
    }
}

/// One authorization requirement. Every field that is set must hold.
#[derive(Debug, Clone, Default)]
pub struct Authorization {
    pub permission: Option<&'static str>,
    pub base_id: Option<i32>,
    pub organisation_id: Option<i32>,
    pub organisation_ids: Option<Vec<i32>>,
}

impl Authorization {
    pub fn permission(permission: &'static str) -> Self {
        Self {
            permission: Some(permission),
            ..Default::default()
        }
    }

    /// Require the permission to be granted for this base
    pub fn for_base(mut self, base_id: i32) -> Self {
        self.base_id = Some(base_id);
        self
    }

    /// Require the caller to belong to this organisation
    pub fn in_organisation(mut self, organisation_id: i32) -> Self {
        self.organisation_id = Some(organisation_id);
        self
    }

    /// Require the caller to belong to one of these organisations
    pub fn in_any_organisation(mut self, organisation_ids: impl IntoIterator<Item = i32>) -> Self {
        self.organisation_ids = Some(organisation_ids.into_iter().collect());
        self
    }
}

/// Checks the requirement against the caller. God users pass every check.
pub fn authorize(user: &AuthUser, authz: &Authorization) -> Result<(), ServiceError> {
    if user.is_god {
        return Ok(());
    }

    if let Some(permission) = authz.permission {
        let scope = user.permissions.get(permission).ok_or_else(|| {
            debug!(user_id = user.user_id, permission, "Missing permission");
            ServiceError::Forbidden(format!("missing permission {}", permission))
        })?;

        if let Some(base_id) = authz.base_id {
            if !scope.covers(base_id) {
                return Err(ServiceError::Forbidden(format!(
                    "permission {} not granted for base {}",
                    permission, base_id
                )));
            }
        }
    }

    if let Some(organisation_id) = authz.organisation_id {
        if user.organisation_id != organisation_id {
            return Err(ServiceError::Forbidden(format!(
                "organisation {} required",
                organisation_id
            )));
        }
    }

    if let Some(organisation_ids) = &authz.organisation_ids {
        if !organisation_ids.contains(&user.organisation_id) {
            return Err(ServiceError::Forbidden(format!(
                "one of organisations {:?} required",
                organisation_ids
            )));
        }
    }

    Ok(())
}
