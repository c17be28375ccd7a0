//! Outcome Evaluator
//!
//! Pure win/loss evaluation for binary-options wagers. No I/O, no clock,
//! no shared state: given the frozen trade parameters and the entry/exit
//! prices, the outcome is fully determined.

use crate::types::{TradeDirection, TradeResult};
use thiserror::Error;

/// Evaluator errors.
#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result of evaluating a wager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub result: TradeResult,
    /// Signed profit: +amount * payout_rate on win, -amount on loss.
    pub profit: f64,
}

/// Evaluate a binary-options wager.
///
/// CALL wins iff the exit price is strictly above the entry price; PUT wins
/// iff it is strictly below. Equality is a loss for both directions.
pub fn evaluate(
    direction: TradeDirection,
    entry_price: f64,
    exit_price: f64,
    amount: f64,
    payout_rate: f64,
) -> Result<Outcome, OutcomeError> {
    if amount <= 0.0 {
        return Err(OutcomeError::InvalidInput(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if payout_rate <= 0.0 {
        return Err(OutcomeError::InvalidInput(format!(
            "payout rate must be positive, got {}",
            payout_rate
        )));
    }
    if entry_price <= 0.0 || exit_price <= 0.0 {
        return Err(OutcomeError::InvalidInput(
            "prices must be positive".to_string(),
        ));
    }

    let won = match direction {
        TradeDirection::Call => exit_price > entry_price,
        TradeDirection::Put => exit_price < entry_price,
    };

    let outcome = if won {
        Outcome {
            result: TradeResult::Win,
            profit: amount * payout_rate,
        }
    } else {
        Outcome {
            result: TradeResult::Loss,
            profit: -amount,
        }
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_wins_above_entry() {
        let outcome = evaluate(TradeDirection::Call, 1.1000, 1.1050, 100.0, 0.8).unwrap();
        assert_eq!(outcome.result, TradeResult::Win);
        assert!((outcome.profit - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_call_loses_below_entry() {
        let outcome = evaluate(TradeDirection::Call, 1.1000, 1.0950, 100.0, 0.8).unwrap();
        assert_eq!(outcome.result, TradeResult::Loss);
        assert!((outcome.profit + 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_put_wins_below_entry() {
        let outcome = evaluate(TradeDirection::Put, 2000.0, 1990.0, 50.0, 0.75).unwrap();
        assert_eq!(outcome.result, TradeResult::Win);
        assert!((outcome.profit - 37.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_put_loses_above_entry() {
        let outcome = evaluate(TradeDirection::Put, 2000.0, 2010.0, 50.0, 0.75).unwrap();
        assert_eq!(outcome.result, TradeResult::Loss);
        assert!((outcome.profit + 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_equality_loses_both_directions() {
        let call = evaluate(TradeDirection::Call, 2000.0, 2000.0, 100.0, 0.8).unwrap();
        assert_eq!(call.result, TradeResult::Loss);
        assert!((call.profit + 100.0).abs() < f64::EPSILON);

        let put = evaluate(TradeDirection::Put, 2000.0, 2000.0, 100.0, 0.8).unwrap();
        assert_eq!(put.result, TradeResult::Loss);
        assert!((put.profit + 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(evaluate(TradeDirection::Call, 1.0, 1.1, 0.0, 0.8).is_err());
        assert!(evaluate(TradeDirection::Call, 1.0, 1.1, -5.0, 0.8).is_err());
        assert!(evaluate(TradeDirection::Call, 1.0, 1.1, 100.0, 0.0).is_err());
        assert!(evaluate(TradeDirection::Call, 0.0, 1.1, 100.0, 0.8).is_err());
        assert!(evaluate(TradeDirection::Call, 1.0, 0.0, 100.0, 0.8).is_err());
    }
}
