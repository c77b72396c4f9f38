//! Grant model - atomic named capabilities.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single capability an identity may hold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grant {
    // Self-service, held by every role.
    ViewOwnAccount,
    EditOwnDetails,
    ViewNotifications,

    // Client portfolio access.
    ViewOwnInvestments,
    ViewOwnReports,

    // Advisor work on assigned clients.
    ViewClient,
    EditClient,
    ViewInvestment,
    CreateInvestment,
    EditInvestment,
    GenerateReport,

    // Administration.
    DeleteInvestment,
    ViewAllClients,
    ManageEmployees,
    ManageUsers,
    ManageRoles,
    ViewAuditLog,
}

impl Grant {
    /// Every grant, in declaration order.
    pub const ALL: [Grant; 17] = [
        Grant::ViewOwnAccount,
        Grant::EditOwnDetails,
        Grant::ViewNotifications,
        Grant::ViewOwnInvestments,
        Grant::ViewOwnReports,
        Grant::ViewClient,
        Grant::EditClient,
        Grant::ViewInvestment,
        Grant::CreateInvestment,
        Grant::EditInvestment,
        Grant::GenerateReport,
        Grant::DeleteInvestment,
        Grant::ViewAllClients,
        Grant::ManageEmployees,
        Grant::ManageUsers,
        Grant::ManageRoles,
        Grant::ViewAuditLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grant::ViewOwnAccount => "VIEW_OWN_ACCOUNT",
            Grant::EditOwnDetails => "EDIT_OWN_DETAILS",
            Grant::ViewNotifications => "VIEW_NOTIFICATIONS",
            Grant::ViewOwnInvestments => "VIEW_OWN_INVESTMENTS",
            Grant::ViewOwnReports => "VIEW_OWN_REPORTS",
            Grant::ViewClient => "VIEW_CLIENT",
            Grant::EditClient => "EDIT_CLIENT",
            Grant::ViewInvestment => "VIEW_INVESTMENT",
            Grant::CreateInvestment => "CREATE_INVESTMENT",
            Grant::EditInvestment => "EDIT_INVESTMENT",
            Grant::GenerateReport => "GENERATE_REPORT",
            Grant::DeleteInvestment => "DELETE_INVESTMENT",
            Grant::ViewAllClients => "VIEW_ALL_CLIENTS",
            Grant::ManageEmployees => "MANAGE_EMPLOYEES",
            Grant::ManageUsers => "MANAGE_USERS",
            Grant::ManageRoles => "MANAGE_ROLES",
            Grant::ViewAuditLog => "VIEW_AUDIT_LOG",
        }
    }
}

impl std::fmt::Display for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Grant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Grant::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| format!("Invalid grant: {}", s))
    }
}
