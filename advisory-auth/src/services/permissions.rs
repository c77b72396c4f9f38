//! Role-to-grant resolution.
//!
//! The whole role table lives in [`RolePermissions::standard`]; nothing else in
//! the crate decides which role implies which grant.

use std::collections::{BTreeSet, HashMap};

use crate::models::{Grant, Identity, Role};

/// Grants every role holds.
const UNIVERSAL_BASE: [Grant; 3] = [
    Grant::ViewOwnAccount,
    Grant::EditOwnDetails,
    Grant::ViewNotifications,
];

const CLIENT_GRANTS: [Grant; 2] = [Grant::ViewOwnInvestments, Grant::ViewOwnReports];

const EMPLOYEE_GRANTS: [Grant; 6] = [
    Grant::ViewClient,
    Grant::EditClient,
    Grant::ViewInvestment,
    Grant::CreateInvestment,
    Grant::EditInvestment,
    Grant::GenerateReport,
];

/// Immutable role → grant table, built once at start-up.
#[derive(Debug, Clone)]
pub struct RolePermissions {
    table: HashMap<Role, BTreeSet<Grant>>,
    universe: BTreeSet<Grant>,
}

impl RolePermissions {
    pub fn standard() -> Self {
        let universe: BTreeSet<Grant> = Grant::ALL.into_iter().collect();

        let with_base = |extra: &[Grant]| -> BTreeSet<Grant> {
            UNIVERSAL_BASE.iter().chain(extra).copied().collect()
        };

        let mut table = HashMap::new();
        table.insert(Role::Client, with_base(&CLIENT_GRANTS));
        table.insert(Role::Employee, with_base(&EMPLOYEE_GRANTS));
        table.insert(Role::Admin, universe.clone());

        Self { table, universe }
    }

    /// Base grants implied by `role`. Admin resolves to the universe; no role
    /// resolves to nothing.
    pub fn resolve(&self, role: Option<Role>) -> BTreeSet<Grant> {
        match role {
            Some(Role::Admin) => self.universe.clone(),
            Some(role) => self.table.get(&role).cloned().unwrap_or_default(),
            None => BTreeSet::new(),
        }
    }

    /// Role grants ∪ custom grants.
    pub fn effective_grants(&self, identity: &Identity) -> BTreeSet<Grant> {
        let mut grants = self.resolve(Some(identity.role));
        grants.extend(identity.custom_grants.iter().copied());
        grants
    }

    pub fn has_grant(&self, identity: &Identity, grant: Grant) -> bool {
        identity.role == Role::Admin
            || identity.custom_grants.contains(&grant)
            || self
                .table
                .get(&identity.role)
                .is_some_and(|grants| grants.contains(&grant))
    }

    pub fn universal_base(&self) -> BTreeSet<Grant> {
        UNIVERSAL_BASE.into_iter().collect()
    }

    pub fn universe(&self) -> &BTreeSet<Grant> {
        &self.universe
    }
}

impl Default for RolePermissions {
    fn default() -> Self {
        Self::standard()
    }
}
