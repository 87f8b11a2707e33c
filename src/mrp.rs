//! Material requirements arithmetic.
//!
//! Pure `Decimal` math shared by the calculation service and its tests;
//! floats are never used for quantities or money.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Wastage percentage applied when neither the usage line nor the caller
/// supplies one.
pub const DEFAULT_WASTAGE_PCT: Decimal = dec!(5);

/// Computed quantities for one requirement line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCalc {
    pub gross_requirement: Decimal,
    pub wastage_quantity: Decimal,
    pub total_requirement: Decimal,
    pub order_quantity_needed: Decimal,
}

/// gross = consumption x order quantity; wastage = gross x pct / 100;
/// total = gross + wastage; needed = total - stock, floored at zero.
pub fn calc_line(
    consumption_per_piece: Decimal,
    order_quantity: i32,
    wastage_pct: Decimal,
    current_stock: Decimal,
) -> RequirementCalc {
    let gross_requirement = consumption_per_piece * Decimal::from(order_quantity);
    let wastage_quantity = gross_requirement * wastage_pct / Decimal::ONE_HUNDRED;
    let total_requirement = gross_requirement + wastage_quantity;
    let order_quantity_needed = (total_requirement - current_stock).max(Decimal::ZERO);
    RequirementCalc {
        gross_requirement,
        wastage_quantity,
        total_requirement,
        order_quantity_needed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_figures() {
        // 2.5 m/pc over 1000 pcs at 5% wastage
        let calc = calc_line(dec!(2.5), 1000, dec!(5), Decimal::ZERO);
        assert_eq!(calc.gross_requirement, dec!(2500));
        assert_eq!(calc.wastage_quantity, dec!(125));
        assert_eq!(calc.total_requirement, dec!(2625));
        assert_eq!(calc.order_quantity_needed, dec!(2625));
    }

    #[test]
    fn stock_reduces_order_quantity_needed() {
        let calc = calc_line(dec!(2.5), 1000, dec!(5), dec!(600));
        assert_eq!(calc.order_quantity_needed, dec!(2025));
    }

    #[test]
    fn needed_is_floored_at_zero_when_stock_covers_demand() {
        let calc = calc_line(dec!(0.1), 10, dec!(0), dec!(500));
        assert_eq!(calc.total_requirement, dec!(1.0));
        assert_eq!(calc.order_quantity_needed, Decimal::ZERO);
    }

    #[test]
    fn zero_wastage_means_total_equals_gross() {
        let calc = calc_line(dec!(3), 40, dec!(0), Decimal::ZERO);
        assert_eq!(calc.gross_requirement, calc.total_requirement);
        assert_eq!(calc.wastage_quantity, Decimal::ZERO);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arithmetic_invariants_hold(
                consumption_hundredths in 1u32..1_000_000,
                order_quantity in 1i32..1_000_000,
                wastage_pct in 0u32..=100,
                stock in 0u32..100_000_000,
            ) {
                let calc = calc_line(
                    Decimal::from(consumption_hundredths) / Decimal::ONE_HUNDRED,
                    order_quantity,
                    Decimal::from(wastage_pct),
                    Decimal::from(stock),
                );
                prop_assert_eq!(
                    calc.total_requirement,
                    calc.gross_requirement + calc.wastage_quantity
                );
                prop_assert!(calc.wastage_quantity >= Decimal::ZERO);
                prop_assert!(calc.order_quantity_needed >= Decimal::ZERO);
                prop_assert!(
                    calc.order_quantity_needed
                        >= calc.total_requirement - Decimal::from(stock)
                );
            }
        }
    }
}
