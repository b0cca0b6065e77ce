use serde::{Deserialize, Serialize};

/// Action a warehouse user may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create and edit products and suppliers.
    ManageCatalog,
    /// Record entries and withdrawals.
    RecordMovements,
    /// Read stock, kardex history and income reports.
    ViewReports,
    /// Verify and rewrite a product ledger from its movement log.
    RepairLedger,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::ManageCatalog,
        Permission::RecordMovements,
        Permission::ViewReports,
        Permission::RepairLedger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageCatalog => "catalog.manage",
            Permission::RecordMovements => "kardex.record",
            Permission::ViewReports => "reports.view",
            Permission::RepairLedger => "kardex.repair",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
