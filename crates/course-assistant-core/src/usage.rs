//! Token usage and cost accounting.
//!
//! Costs are computed from per-million-token rates and accumulated without
//! rounding. Rounding happens only in [`format_cost`], at display time, so
//! per-turn and cumulative figures never drift apart.

use serde::{Deserialize, Serialize};

/// Default input price, USD per million tokens.
pub const DEFAULT_INPUT_PER_MILLION: f64 = 0.10;
/// Default output price, USD per million tokens.
pub const DEFAULT_OUTPUT_PER_MILLION: f64 = 0.40;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Token counts reported by the generation service for one exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Published per-token prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenRates {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for TokenRates {
    fn default() -> Self {
        Self {
            input_per_million: DEFAULT_INPUT_PER_MILLION,
            output_per_million: DEFAULT_OUTPUT_PER_MILLION,
        }
    }
}

impl TokenRates {
    /// `input * input_rate / 1e6 + output * output_rate / 1e6`.
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        usage.input_tokens as f64 * (self.input_per_million / TOKENS_PER_MILLION)
            + usage.output_tokens as f64 * (self.output_per_million / TOKENS_PER_MILLION)
    }
}

/// Running session totals. Reset only by an explicit [`reset`](Self::reset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageAccumulator {
    total_cost: f64,
    input_tokens: u64,
    output_tokens: u64,
    turns: u64,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Price one turn, add it to the totals, and return its cost.
    pub fn record_turn(&mut self, input_tokens: u64, output_tokens: u64, rates: &TokenRates) -> f64 {
        self.record(TokenUsage::new(input_tokens, output_tokens), rates)
    }

    pub fn record(&mut self, usage: TokenUsage, rates: &TokenRates) -> f64 {
        let cost = rates.cost(usage);
        self.total_cost += cost;
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.turns += 1;
        cost
    }

    /// Record several turns in order; returns their combined cost.
    pub fn record_all(&mut self, usages: &[TokenUsage], rates: &TokenRates) -> f64 {
        usages.iter().map(|u| self.record(*u, rates)).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    /// Number of turns that contributed usage.
    pub fn turns(&self) -> u64 {
        self.turns
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Format a cost for display, rounded to five decimal places (`$0.00012`).
pub fn format_cost(cost: f64) -> String {
    format!("${cost:.5}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> TokenRates {
        TokenRates {
            input_per_million: 0.10,
            output_per_million: 0.40,
        }
    }

    #[test]
    fn test_cost_formula() {
        let cost = rates().cost(TokenUsage::new(1_000_000, 1_000_000));
        assert!((cost - 0.50).abs() < 1e-12);
        let cost = rates().cost(TokenUsage::new(100, 50));
        assert!((cost - 0.00003).abs() < 1e-15);
    }

    #[test]
    fn test_accumulation_is_associative() {
        let a = TokenUsage::new(100, 50);
        let b = TokenUsage::new(200, 10);
        let c = TokenUsage::new(0, 0);

        let mut split = UsageAccumulator::new();
        split.record_all(&[a, b], &rates());
        split.record_all(&[c], &rates());

        let mut single = UsageAccumulator::new();
        single.record_all(&[a, b, c], &rates());

        assert_eq!(split.total_cost(), single.total_cost());
        assert_eq!(split.total_tokens(), single.total_tokens());
        assert_eq!(split.total_tokens(), 360);
        assert!((single.total_cost() - 0.000054).abs() < 1e-15);
    }

    #[test]
    fn test_no_rounding_during_accumulation() {
        let mut acc = UsageAccumulator::new();
        for _ in 0..1000 {
            acc.record_turn(1, 0, &rates());
        }
        // Each turn costs 1e-7, which rounds to $0.00000 on its own.
        assert_eq!(format_cost(rates().cost(TokenUsage::new(1, 0))), "$0.00000");
        assert!((acc.total_cost() - 0.0001).abs() < 1e-12);
        assert_eq!(format_cost(acc.total_cost()), "$0.00010");
    }

    #[test]
    fn test_record_turn_returns_turn_cost() {
        let mut acc = UsageAccumulator::new();
        let first = acc.record_turn(200, 10, &rates());
        assert!((first - 0.000024).abs() < 1e-15);
        assert_eq!(acc.turns(), 1);
        assert_eq!(acc.input_tokens(), 200);
        assert_eq!(acc.output_tokens(), 10);
    }

    #[test]
    fn test_reset_zeroes_totals() {
        let mut acc = UsageAccumulator::new();
        acc.record_turn(500, 500, &rates());
        acc.reset();
        assert_eq!(acc, UsageAccumulator::default());
        assert_eq!(acc.total_cost(), 0.0);
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.0), "$0.00000");
        assert_eq!(format_cost(0.000054), "$0.00005");
        assert_eq!(format_cost(1.234567), "$1.23457");
    }
}
