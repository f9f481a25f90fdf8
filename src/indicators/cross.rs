//! Two-sample crossover comparators.

use rust_decimal::Decimal;

/// `value` moved from at-or-below `reference` to strictly above it.
pub fn crossover(prev_value: Decimal, prev_reference: Decimal, value: Decimal, reference: Decimal) -> bool {
    prev_value <= prev_reference && value > reference
}

/// `value` moved from at-or-above `reference` to strictly below it.
pub fn crossunder(prev_value: Decimal, prev_reference: Decimal, value: Decimal, reference: Decimal) -> bool {
    prev_value >= prev_reference && value < reference
}
