//! Stock, income and withdrawal reports.
//!
//! Read views computed from the catalog, the ledgers' latest rows and the
//! movement logs. Nothing here is ledger state; a report can always be
//! recomputed.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use kardex_catalog::{Catalog, Product, Supplier};
use kardex_core::{Currency, Entity, Money, ProductId, SupplierId, TenantId, UnitCost};
use kardex_inventory::{Entry, Movement, Withdrawal};

use crate::engine::KardexEngine;
use crate::error::KardexError;
use crate::ledger_store::LedgerStore;

/// Filters shared by the stock, income and withdrawal reports.
///
/// Text filters match case-insensitive substrings; unit and material match
/// exactly. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Substring of the product description.
    pub description: Option<String>,
    pub unit_of_measurement: Option<String>,
    pub material_type: Option<String>,
    /// Inclusive bounds on movement dates: entries for the stock and income
    /// reports, withdrawals for the withdrawal report.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Entry suppliers; ignored by the withdrawal report.
    pub supplier: SupplierFilter,
    /// Substring of the withdrawal purpose; withdrawal report only.
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierFilter {
    pub name: Option<String>,
    pub ruc: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
    pub department: Option<String>,
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

impl SupplierFilter {
    fn criteria<'s>(&'s self, supplier: &'s Supplier) -> Vec<(Option<&'s str>, &'s str)> {
        let location = supplier.location();
        [
            (Some(supplier.name()), self.name.as_deref()),
            (supplier.ruc(), self.ruc.as_deref()),
            (location.district.as_deref(), self.district.as_deref()),
            (location.province.as_deref(), self.province.as_deref()),
            (location.department.as_deref(), self.department.as_deref()),
        ]
        .into_iter()
        .filter_map(|(value, needle)| needle.map(|n| (value, n)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self == &SupplierFilter::default()
    }

    /// Every set criterion matches.
    pub fn matches_all(&self, supplier: &Supplier) -> bool {
        self.criteria(supplier)
            .into_iter()
            .all(|(value, needle)| contains_ci(value, needle))
    }

    /// At least one set criterion matches (or none is set).
    pub fn matches_any(&self, supplier: &Supplier) -> bool {
        let criteria = self.criteria(supplier);
        criteria.is_empty()
            || criteria
                .into_iter()
                .any(|(value, needle)| contains_ci(value, needle))
    }
}

impl ReportFilter {
    fn matches_product(&self, product: &Product) -> bool {
        if let Some(needle) = &self.description {
            if !contains_ci(product.description(), needle) {
                return false;
            }
        }
        if let Some(unit) = &self.unit_of_measurement {
            if product.unit_of_measurement() != unit {
                return false;
            }
        }
        if let Some(material) = &self.material_type {
            if product.material_type() != material {
                return false;
            }
        }
        true
    }

    fn has_entry_constraints(&self) -> bool {
        self.from.is_some() || self.to.is_some() || !self.supplier.is_empty()
    }

    fn in_range(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub title: String,
    pub description: Option<String>,
    pub unit_of_measurement: String,
    pub material_type: String,
    pub stock: i64,
    pub unit_cost: Option<UnitCost>,
    pub total_value: Option<Money>,
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockReport {
    /// Newest products first.
    pub lines: Vec<StockLine>,
    /// Sum of line values per ledger currency.
    pub totals: BTreeMap<Currency, Money>,
}

/// One purchase, joined with its product and supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomeLine {
    pub entry: Entry,
    pub recorded_at: DateTime<Utc>,
    pub product: Product,
    pub supplier: Supplier,
}

/// One withdrawal, joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalLine {
    pub withdrawal: Withdrawal,
    pub recorded_at: DateTime<Utc>,
    pub product: Product,
}

/// Memoizing supplier lookup for one report run.
struct SupplierCache<'c, C> {
    catalog: &'c C,
    seen: HashMap<SupplierId, Supplier>,
}

impl<'c, C: Catalog> SupplierCache<'c, C> {
    fn new(catalog: &'c C) -> Self {
        Self {
            catalog,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, id: SupplierId) -> Result<&Supplier, KardexError> {
        if !self.seen.contains_key(&id) {
            let supplier = self.catalog.resolve_supplier(id)?;
            self.seen.insert(id, supplier);
        }
        self.seen.get(&id).ok_or(KardexError::UnknownSupplier(id))
    }
}

impl<S, C> KardexEngine<S, C>
where
    S: LedgerStore,
    C: Catalog,
{
    fn entries_of(&self, product_id: ProductId) -> Result<Vec<(Entry, DateTime<Utc>)>, KardexError> {
        Ok(self
            .store
            .load_movement_history(product_id)?
            .into_iter()
            .filter_map(|logged| match logged.movement {
                Movement::Entry(entry) => Some((entry, logged.recorded_at)),
                Movement::Withdrawal(_) => None,
            })
            .collect())
    }

    fn withdrawals_of(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<(Withdrawal, DateTime<Utc>)>, KardexError> {
        Ok(self
            .store
            .load_movement_history(product_id)?
            .into_iter()
            .filter_map(|logged| match logged.movement {
                Movement::Withdrawal(withdrawal) => Some((withdrawal, logged.recorded_at)),
                Movement::Entry(_) => None,
            })
            .collect())
    }

    /// Current stock and valuation of a tenant's products.
    ///
    /// Entry filters (date range, supplier) keep a product when at least one
    /// of its entries falls in the range and was supplied by a supplier
    /// matching any of the supplier criteria.
    pub fn stock_report(
        &self,
        tenant_id: TenantId,
        filter: &ReportFilter,
    ) -> Result<StockReport, KardexError> {
        let mut products = self.catalog.list_products(tenant_id)?;
        products.sort_by(|a, b| b.audit().created_at.cmp(&a.audit().created_at));

        let mut suppliers = SupplierCache::new(&self.catalog);
        let mut report = StockReport::default();

        for product in products.iter().filter(|p| filter.matches_product(p)) {
            let product_id = *product.id();
            if filter.has_entry_constraints() {
                let mut qualifies = false;
                for (entry, _) in self.entries_of(product_id)? {
                    if filter.in_range(entry.occurred_at)
                        && filter.supplier.matches_any(suppliers.get(entry.supplier_id)?)
                    {
                        qualifies = true;
                        break;
                    }
                }
                if !qualifies {
                    continue;
                }
            }

            let snapshot = self.current_stock(product_id)?;
            if let Some(value) = snapshot.total_cost {
                let total = report
                    .totals
                    .entry(value.currency())
                    .or_insert_with(|| Money::zero(value.currency()));
                *total = total
                    .checked_add(&value)
                    .map_err(KardexError::Arithmetic)?;
            }
            report.lines.push(StockLine {
                product_id,
                title: product.title().to_string(),
                description: product.description().map(str::to_string),
                unit_of_measurement: product.unit_of_measurement().to_string(),
                material_type: product.material_type().to_string(),
                stock: snapshot.stock,
                unit_cost: snapshot.unit_cost,
                total_value: snapshot.total_cost,
                currency: snapshot.currency,
            });
        }
        Ok(report)
    }

    /// Purchases of a tenant's products, most recently recorded first.
    pub fn income_report(
        &self,
        tenant_id: TenantId,
        filter: &ReportFilter,
    ) -> Result<Vec<IncomeLine>, KardexError> {
        let mut suppliers = SupplierCache::new(&self.catalog);
        let mut lines = Vec::new();

        for product in self.catalog.list_products(tenant_id)? {
            if !filter.matches_product(&product) {
                continue;
            }
            for (entry, recorded_at) in self.entries_of(*product.id())? {
                if !filter.in_range(entry.occurred_at) {
                    continue;
                }
                let supplier = suppliers.get(entry.supplier_id)?;
                if !filter.supplier.matches_all(supplier) {
                    continue;
                }
                lines.push(IncomeLine {
                    supplier: supplier.clone(),
                    entry,
                    recorded_at,
                    product: product.clone(),
                });
            }
        }
        lines.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(lines)
    }

    /// Withdrawals of a tenant's products, most recently recorded first.
    pub fn withdrawal_report(
        &self,
        tenant_id: TenantId,
        filter: &ReportFilter,
    ) -> Result<Vec<WithdrawalLine>, KardexError> {
        let mut lines = Vec::new();
        for product in self.catalog.list_products(tenant_id)? {
            if !filter.matches_product(&product) {
                continue;
            }
            for (withdrawal, recorded_at) in self.withdrawals_of(*product.id())? {
                if !filter.in_range(withdrawal.occurred_at) {
                    continue;
                }
                if let Some(needle) = &filter.purpose {
                    if !contains_ci(withdrawal.purpose.as_deref(), needle) {
                        continue;
                    }
                }
                lines.push(WithdrawalLine {
                    withdrawal,
                    recorded_at,
                    product: product.clone(),
                });
            }
        }
        lines.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(lines)
    }

    /// Distinct suppliers that delivered a product, in first-delivery order.
    pub fn product_suppliers(&self, product_id: ProductId) -> Result<Vec<Supplier>, KardexError> {
        let mut seen = BTreeSet::new();
        let mut suppliers = Vec::new();
        for (entry, _) in self.entries_of(product_id)? {
            if seen.insert(entry.supplier_id) {
                suppliers.push(self.catalog.resolve_supplier(entry.supplier_id)?);
            }
        }
        Ok(suppliers)
    }

    /// Number of a tenant's products the supplier has delivered.
    pub fn supplier_product_count(
        &self,
        tenant_id: TenantId,
        supplier_id: SupplierId,
    ) -> Result<usize, KardexError> {
        let mut count = 0;
        for product in self.catalog.list_products(tenant_id)? {
            let supplied = self
                .entries_of(*product.id())?
                .iter()
                .any(|(entry, _)| entry.supplier_id == supplier_id);
            if supplied {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KardexConfig;
    use crate::engine::RecordOptions;
    use crate::ledger_store::InMemoryLedgerStore;
    use chrono::Duration;
    use kardex_catalog::{InMemoryCatalog, Location, NewProduct, NewSupplier};

    struct World {
        engine: KardexEngine<InMemoryLedgerStore, InMemoryCatalog>,
        tenant_id: TenantId,
        cement: ProductId,
        rebar: ProductId,
        sol: SupplierId,
        andes: SupplierId,
        t0: DateTime<Utc>,
    }

    fn product(tenant_id: TenantId, title: &str, description: &str, unit: &str, material: &str, at: DateTime<Utc>) -> Product {
        Product::create(
            ProductId::new(),
            NewProduct {
                tenant_id,
                title: title.to_string(),
                description: Some(description.to_string()),
                unit_of_measurement: unit.to_string(),
                material_type: material.to_string(),
            },
            at,
            None,
        )
        .unwrap()
    }

    fn supplier(name: &str, district: &str) -> Supplier {
        Supplier::register(
            SupplierId::new(),
            NewSupplier {
                name: name.to_string(),
                ruc: None,
                location: Location {
                    district: Some(district.to_string()),
                    ..Location::default()
                },
            },
            Utc::now(),
            None,
        )
        .unwrap()
    }

    fn world() -> World {
        let t0 = Utc::now();
        let tenant_id = TenantId::new();
        let catalog = InMemoryCatalog::new();
        let cement = product(tenant_id, "Cemento Sol", "Portland cement type I", "bag", "cement", t0);
        let rebar = product(tenant_id, "Rebar 12mm", "Corrugated steel bar", "unit", "steel", t0 + Duration::seconds(1));
        let sol = supplier("Distribuidora Sol", "Miraflores");
        let andes = supplier("Aceros Andes", "Ate");
        let ids = (*cement.id(), *rebar.id(), *sol.id(), *andes.id());
        for p in [cement, rebar] {
            catalog.upsert_product(p);
        }
        for s in [sol, andes] {
            catalog.upsert_supplier(s);
        }
        // A product from another tenant never shows up.
        catalog.upsert_product(product(TenantId::new(), "Foreign item", "Not ours at all", "unit", "steel", t0));

        let engine = KardexEngine::new(InMemoryLedgerStore::new(), catalog, KardexConfig::default());
        let w = World {
            engine,
            tenant_id,
            cement: ids.0,
            rebar: ids.1,
            sol: ids.2,
            andes: ids.3,
            t0,
        };
        let opts = RecordOptions::default();
        let usd = |m| Money::new(m, Currency::USD);
        w.engine.record_entry(w.cement, w.sol, 10, usd(2_500), t0, &opts).unwrap();
        w.engine.record_entry(w.cement, w.andes, 10, usd(2_700), t0 + Duration::days(5), &opts).unwrap();
        w.engine.record_entry(w.rebar, w.andes, 100, usd(1_000), t0 + Duration::days(1), &opts).unwrap();
        w.engine
            .record_withdrawal(w.rebar, 40, t0 + Duration::days(2), &opts.clone().with_purpose("Tower B foundations"))
            .unwrap();
        w
    }

    #[test]
    fn stock_report_lists_valued_products_newest_first() {
        let w = world();
        let report = w.engine.stock_report(w.tenant_id, &ReportFilter::default()).unwrap();
        let ids: Vec<ProductId> = report.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![w.rebar, w.cement]);

        assert_eq!(report.lines[0].stock, 60);
        assert_eq!(report.lines[0].total_value, Some(Money::new(60_000, Currency::USD)));
        assert_eq!(report.lines[1].stock, 20);
        assert_eq!(report.lines[1].total_value, Some(Money::new(52_000, Currency::USD)));
        assert_eq!(report.totals[&Currency::USD], Money::new(112_000, Currency::USD));
    }

    #[test]
    fn stock_report_filters_on_product_fields() {
        let w = world();
        let filter = ReportFilter {
            description: Some("PORTLAND".to_string()),
            ..ReportFilter::default()
        };
        let report = w.engine.stock_report(w.tenant_id, &filter).unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].product_id, w.cement);

        let filter = ReportFilter {
            material_type: Some("steel".to_string()),
            unit_of_measurement: Some("bag".to_string()),
            ..ReportFilter::default()
        };
        assert!(w.engine.stock_report(w.tenant_id, &filter).unwrap().lines.is_empty());
    }

    #[test]
    fn stock_report_filters_on_entries() {
        let w = world();
        let filter = ReportFilter {
            from: Some(w.t0 + Duration::days(3)),
            ..ReportFilter::default()
        };
        let report = w.engine.stock_report(w.tenant_id, &filter).unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].product_id, w.cement);

        let filter = ReportFilter {
            supplier: SupplierFilter {
                name: Some("zzz".to_string()),
                district: Some("miraflores".to_string()),
                ..SupplierFilter::default()
            },
            ..ReportFilter::default()
        };
        let report = w.engine.stock_report(w.tenant_id, &filter).unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].product_id, w.cement);
    }

    #[test]
    fn income_report_joins_entries() {
        let w = world();
        let all = w.engine.income_report(w.tenant_id, &ReportFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|p| p[0].recorded_at >= p[1].recorded_at));

        let filter = ReportFilter {
            supplier: SupplierFilter {
                name: Some("andes".to_string()),
                ..SupplierFilter::default()
            },
            material_type: Some("cement".to_string()),
            ..ReportFilter::default()
        };
        let lines = w.engine.income_report(w.tenant_id, &filter).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].entry.quantity, 10);
        assert_eq!(lines[0].product.title(), "Cemento Sol");
        assert_eq!(lines[0].supplier.name(), "Aceros Andes");

        // All supplier criteria must hold for an income line.
        let filter = ReportFilter {
            supplier: SupplierFilter {
                name: Some("andes".to_string()),
                district: Some("miraflores".to_string()),
                ..SupplierFilter::default()
            },
            ..ReportFilter::default()
        };
        assert!(w.engine.income_report(w.tenant_id, &filter).unwrap().is_empty());
    }

    #[test]
    fn supplier_views_are_computed_from_entries() {
        let w = world();
        let suppliers = w.engine.product_suppliers(w.cement).unwrap();
        let names: Vec<&str> = suppliers.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Distribuidora Sol", "Aceros Andes"]);

        assert_eq!(w.engine.supplier_product_count(w.tenant_id, w.andes).unwrap(), 2);
        assert_eq!(w.engine.supplier_product_count(w.tenant_id, w.sol).unwrap(), 1);
        assert_eq!(w.engine.supplier_product_count(w.tenant_id, SupplierId::new()).unwrap(), 0);
    }

    #[test]
    fn withdrawal_report_joins_products_and_filters() {
        let w = world();
        w.engine
            .record_withdrawal(
                w.cement,
                5,
                w.t0 + Duration::days(6),
                &RecordOptions::default().with_purpose("Site office"),
            )
            .unwrap();

        let all = w.engine.withdrawal_report(w.tenant_id, &ReportFilter::default()).unwrap();
        let products: Vec<ProductId> = all.iter().map(|l| *l.product.id()).collect();
        assert_eq!(products, vec![w.cement, w.rebar]);

        let filter = ReportFilter {
            purpose: Some("TOWER".to_string()),
            ..ReportFilter::default()
        };
        let lines = w.engine.withdrawal_report(w.tenant_id, &filter).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].withdrawal.quantity, 40);
        assert_eq!(lines[0].product.title(), "Rebar 12mm");

        let filter = ReportFilter {
            from: Some(w.t0 + Duration::days(3)),
            description: Some("portland".to_string()),
            ..ReportFilter::default()
        };
        let lines = w.engine.withdrawal_report(w.tenant_id, &filter).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].withdrawal.purpose.as_deref(), Some("Site office"));

        let filter = ReportFilter {
            material_type: Some("steel".to_string()),
            to: Some(w.t0 + Duration::days(1)),
            ..ReportFilter::default()
        };
        assert!(w.engine.withdrawal_report(w.tenant_id, &filter).unwrap().is_empty());
    }
}
