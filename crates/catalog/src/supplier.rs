use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{AuditMetadata, DomainError, DomainResult, Entity, SupplierId, UserId};

use crate::text::{check_length, collapse_optional, collapse_whitespace};

const MAX_FIELD_LEN: usize = 250;
const RUC_LEN: usize = 11;

/// Where a supplier operates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
    pub department: Option<String>,
}

impl Location {
    fn normalized(&self) -> DomainResult<Self> {
        let location = Self {
            address: collapse_optional(self.address.as_deref()),
            district: collapse_optional(self.district.as_deref()),
            province: collapse_optional(self.province.as_deref()),
            department: collapse_optional(self.department.as_deref()),
        };
        for (field, value) in [
            ("address", &location.address),
            ("district", &location.district),
            ("province", &location.province),
            ("department", &location.department),
        ] {
            if let Some(v) = value {
                check_length(field, v, 1, MAX_FIELD_LEN)?;
            }
        }
        Ok(location)
    }
}

/// Catalog supplier: the counterparty of stock entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    /// Tax registration number (RUC).
    ruc: Option<String>,
    location: Location,
    audit: AuditMetadata,
}

/// Input for registering a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub ruc: Option<String>,
    pub location: Location,
}

impl Supplier {
    pub fn register(
        id: SupplierId,
        input: NewSupplier,
        at: DateTime<Utc>,
        created_by: Option<UserId>,
    ) -> DomainResult<Self> {
        let name = collapse_whitespace(&input.name);
        check_length("name", &name, 1, MAX_FIELD_LEN)?;

        Ok(Self {
            id,
            name,
            ruc: validate_ruc(input.ruc.as_deref())?,
            location: input.location.normalized()?,
            audit: AuditMetadata::new(at, created_by),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ruc(&self) -> Option<&str> {
        self.ruc.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn relocate(&mut self, location: Location, at: DateTime<Utc>) -> DomainResult<()> {
        self.location = location.normalized()?;
        self.audit = self.audit.touched(at);
        Ok(())
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn audit(&self) -> &AuditMetadata {
        &self.audit
    }
}

fn validate_ruc(ruc: Option<&str>) -> DomainResult<Option<String>> {
    let Some(ruc) = ruc.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if ruc.len() != RUC_LEN || !ruc.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::field(
            "ruc",
            format!("must be exactly {RUC_LEN} digits"),
        ));
    }
    Ok(Some(ruc.to_string()))
}
