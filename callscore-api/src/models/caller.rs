//! Authenticated caller, resolved upstream

use serde::Serialize;

/// Tenant and user on whose behalf a request runs.
///
/// Session validation and organization lookup happen in front of this
/// service; it only trusts the resolved ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub organization_id: String,
    pub user_id: String,
}
