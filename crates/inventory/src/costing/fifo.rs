use kardex_core::{Currency, Money, MoneyError, UnitCost};

use super::{ledger_currency, validate, CostingError, CostingMethod, CostingStrategy, Valuation};
use crate::kardex::{CostLayer, LedgerState};
use crate::movement::Movement;

/// First-in first-out lots. Withdrawals drain the oldest lots first, splitting
/// the last one drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl CostingStrategy for Fifo {
    fn method(&self) -> CostingMethod {
        CostingMethod::Fifo
    }

    fn apply(&self, state: &LedgerState, movement: &Movement) -> Result<Valuation, CostingError> {
        validate(state, movement)?;

        let mut layers = state.layers().to_vec();
        let in_lots = lot_quantity(&layers)?;
        if in_lots != state.stock() {
            return Err(CostingError::InconsistentState(format!(
                "lots hold {in_lots} units but stock is {}",
                state.stock()
            )));
        }

        match movement {
            Movement::Entry(entry) => {
                let currency = entry.unit_price.currency();
                let price = UnitCost::from_price(entry.unit_price)?;
                layers.push(CostLayer {
                    quantity: entry.quantity,
                    unit_cost: price,
                    received_at: entry.occurred_at,
                    source_sequence: state.sequence() + 1,
                });
                let (stock, unit_cost, total_cost) = remaining(&layers, currency)?;

                Ok(Valuation {
                    stock,
                    unit_cost,
                    total_cost,
                    movement_unit_cost: price,
                    movement_value: entry.unit_price.multiply_by_quantity(entry.quantity)?,
                    layers,
                })
            }
            Movement::Withdrawal(withdrawal) => {
                let currency = ledger_currency(state)?;
                let mut outstanding = withdrawal.quantity;
                let mut consumed: i128 = 0;
                let mut drained = 0;

                for layer in layers.iter_mut() {
                    if outstanding == 0 {
                        break;
                    }
                    let take = outstanding.min(layer.quantity);
                    consumed += layer.unit_cost.weighted(take);
                    layer.quantity -= take;
                    outstanding -= take;
                    if layer.quantity == 0 {
                        drained += 1;
                    }
                }
                if outstanding > 0 {
                    return Err(CostingError::InsufficientStock {
                        requested: withdrawal.quantity,
                        available: state.stock(),
                    });
                }
                layers.drain(..drained);

                let (stock, unit_cost, total_cost) = remaining(&layers, currency)?;
                let issue_cost =
                    UnitCost::from_weighted_sum(consumed, withdrawal.quantity, currency)?;

                Ok(Valuation {
                    stock,
                    unit_cost,
                    total_cost,
                    movement_unit_cost: issue_cost,
                    movement_value: Money::from_weighted_sum(consumed, currency)?,
                    layers,
                })
            }
        }
    }
}

fn lot_quantity(layers: &[CostLayer]) -> Result<i64, MoneyError> {
    layers
        .iter()
        .try_fold(0i64, |acc, l| acc.checked_add(l.quantity))
        .ok_or(MoneyError::Overflow)
}

/// Stock, average unit cost and extended value of the open lots.
fn remaining(layers: &[CostLayer], currency: Currency) -> Result<(i64, UnitCost, Money), CostingError> {
    let stock = lot_quantity(layers)?;
    let weighted = layers
        .iter()
        .try_fold(0i128, |acc, l| acc.checked_add(l.unit_cost.weighted(l.quantity)))
        .ok_or(MoneyError::Overflow)?;
    let unit_cost = UnitCost::from_weighted_sum(weighted, stock, currency)?;
    Ok((stock, unit_cost, unit_cost.extend(stock)?))
}
