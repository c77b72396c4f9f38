//! Ownership-scoped resources the evaluator reasons about.
//!
//! Only the ownership facts are modelled here; the entities themselves live in
//! the business services.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed set of resource kinds subject to ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A client record, optionally assigned to one employee.
    Client {
        client_id: i64,
        assigned_employee_id: Option<i64>,
    },
    /// An investment owned by one client; carries the owning client's assigned employee.
    Investment {
        investment_id: i64,
        owner_client_id: i64,
        assigned_employee_id: Option<i64>,
    },
    /// Another identity's account, for self-service grants.
    Identity { identity_id: i64 },
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Client { .. } => "client",
            Resource::Investment { .. } => "investment",
            Resource::Identity { .. } => "identity",
        }
    }
}

/// Resource reference as it arrives over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceRef {
    #[schema(example = "client")]
    pub kind: String,
    #[schema(example = 17)]
    pub id: i64,
    /// Owning client, for investments.
    #[serde(default)]
    pub owner_client_id: Option<i64>,
    /// Assigned employee, for clients and investments.
    #[serde(default)]
    pub assigned_employee_id: Option<i64>,
}

impl ResourceRef {
    /// Resolve into a [`Resource`]. Unknown kinds, or investments without an
    /// owner, resolve to `None`.
    pub fn resolve(&self) -> Option<Resource> {
        match self.kind.trim().to_lowercase().as_str() {
            "client" => Some(Resource::Client {
                client_id: self.id,
                assigned_employee_id: self.assigned_employee_id,
            }),
            "investment" => Some(Resource::Investment {
                investment_id: self.id,
                owner_client_id: self.owner_client_id?,
                assigned_employee_id: self.assigned_employee_id,
            }),
            "identity" | "user" => Some(Resource::Identity {
                identity_id: self.id,
            }),
            _ => None,
        }
    }
}
