use kardex_core::{MoneyError, UnitCost};

use super::{ledger_currency, validate, CostingError, CostingMethod, CostingStrategy, Valuation};
use crate::kardex::LedgerState;
use crate::movement::Movement;

/// Moving weighted average: entries re-average the unit cost, withdrawals
/// leave it unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAverage;

impl CostingStrategy for WeightedAverage {
    fn method(&self) -> CostingMethod {
        CostingMethod::WeightedAverage
    }

    fn apply(&self, state: &LedgerState, movement: &Movement) -> Result<Valuation, CostingError> {
        validate(state, movement)?;

        match movement {
            Movement::Entry(entry) => {
                let currency = entry.unit_price.currency();
                let price = UnitCost::from_price(entry.unit_price)?;
                let old_total = state.latest().map_or(0, |row| row.total_cost.weighted());

                let stock = state
                    .stock()
                    .checked_add(entry.quantity)
                    .ok_or(MoneyError::Overflow)?;
                let weighted = old_total + price.weighted(entry.quantity);
                let unit_cost = UnitCost::from_weighted_sum(weighted, stock, currency)?;

                Ok(Valuation {
                    stock,
                    unit_cost,
                    total_cost: unit_cost.extend(stock)?,
                    movement_unit_cost: price,
                    movement_value: entry.unit_price.multiply_by_quantity(entry.quantity)?,
                    layers: Vec::new(),
                })
            }
            Movement::Withdrawal(withdrawal) => {
                let currency = ledger_currency(state)?;
                let unit_cost = state
                    .latest()
                    .map_or(UnitCost::zero(currency), |row| row.unit_cost);
                let stock = state.stock() - withdrawal.quantity;

                Ok(Valuation {
                    stock,
                    unit_cost,
                    total_cost: unit_cost.extend(stock)?,
                    movement_unit_cost: unit_cost,
                    movement_value: unit_cost.extend(withdrawal.quantity)?,
                    layers: Vec::new(),
                })
            }
        }
    }
}
