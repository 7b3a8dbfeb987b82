//! Per-token pricing for known models (USD).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// (input, output) price per million tokens, matched by model-name prefix.
const PRICING_PER_MILLION: &[(&str, Decimal, Decimal)] = &[
    ("claude-opus-4", dec!(15), dec!(75)),
    ("claude-sonnet-4", dec!(3), dec!(15)),
    ("claude-3-5-haiku", dec!(0.80), dec!(4)),
    ("claude-3-5-sonnet", dec!(3), dec!(15)),
    ("gpt-4o-mini", dec!(0.15), dec!(0.60)),
    ("gpt-4o", dec!(2.50), dec!(10)),
    ("gpt-4.1", dec!(2), dec!(8)),
];

/// Look up the per-token cost for a model. Unknown models cost zero.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    PRICING_PER_MILLION
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map(|&(_, input, output)| (input / dec!(1000000), output / dec!(1000000)))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO))
}
