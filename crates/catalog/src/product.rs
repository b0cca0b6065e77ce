use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{AuditMetadata, DomainError, DomainResult, Entity, ProductId, TenantId, UserId};

use crate::text::{check_length, collapse_optional, collapse_whitespace};

/// Catalog product: what a kardex ledger counts and values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    tenant_id: TenantId,
    title: String,
    description: Option<String>,
    unit_of_measurement: String,
    material_type: String,
    audit: AuditMetadata,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub tenant_id: TenantId,
    pub title: String,
    pub description: Option<String>,
    pub unit_of_measurement: String,
    pub material_type: String,
}

impl Product {
    /// Validate and normalize a new product.
    ///
    /// Title: 4..=255 chars, description (if present): 4..=255 chars, unit of
    /// measurement and material type: 2..=15 chars. Whitespace is collapsed
    /// before any length check.
    pub fn create(
        id: ProductId,
        input: NewProduct,
        at: DateTime<Utc>,
        created_by: Option<UserId>,
    ) -> DomainResult<Self> {
        let title = validate_title(&input.title)?;
        let description = validate_description(input.description.as_deref())?;

        let unit_of_measurement = collapse_whitespace(&input.unit_of_measurement);
        check_length("unit_of_measurement", &unit_of_measurement, 2, 15)?;

        let material_type = collapse_whitespace(&input.material_type);
        check_length("material_type", &material_type, 2, 15)?;

        Ok(Self {
            id,
            tenant_id: input.tenant_id,
            title,
            description,
            unit_of_measurement,
            material_type,
            audit: AuditMetadata::new(at, created_by),
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn unit_of_measurement(&self) -> &str {
        &self.unit_of_measurement
    }

    pub fn material_type(&self) -> &str {
        &self.material_type
    }

    pub fn rename(&mut self, title: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.title = validate_title(title)?;
        self.audit = self.audit.touched(at);
        Ok(())
    }

    pub fn describe(&mut self, description: Option<&str>, at: DateTime<Utc>) -> DomainResult<()> {
        self.description = validate_description(description)?;
        self.audit = self.audit.touched(at);
        Ok(())
    }

    /// Change the unit of measurement.
    ///
    /// Rejected once any movement exists: quantities already in the ledger
    /// were counted in the old unit.
    pub fn change_unit_of_measurement(
        &mut self,
        unit: &str,
        has_movements: bool,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if has_movements {
            return Err(DomainError::invariant(
                "unit of measurement is frozen once movements exist",
            ));
        }
        let unit = collapse_whitespace(unit);
        check_length("unit_of_measurement", &unit, 2, 15)?;
        self.unit_of_measurement = unit;
        self.audit = self.audit.touched(at);
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn audit(&self) -> &AuditMetadata {
        &self.audit
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = collapse_whitespace(title);
    check_length("title", &title, 4, 255)?;
    Ok(title)
}

fn validate_description(description: Option<&str>) -> DomainResult<Option<String>> {
    let description = collapse_optional(description);
    if let Some(d) = &description {
        check_length("description", d, 4, 255)?;
    }
    Ok(description)
}
