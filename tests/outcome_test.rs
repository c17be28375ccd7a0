//! Tests for the pure outcome evaluator.

use strike::services::{evaluate, Outcome};
use strike::types::{TradeDirection, TradeResult};

fn eval(direction: TradeDirection, entry: f64, exit: f64) -> Outcome {
    evaluate(direction, entry, exit, 100.0, 0.8).unwrap()
}

// =============================================================================
// Direction Grid
// =============================================================================

#[test]
fn test_call_above_entry_wins() {
    let outcome = eval(TradeDirection::Call, 1.1000, 1.1050);
    assert_eq!(outcome.result, TradeResult::Win);
    assert!((outcome.profit - 80.0).abs() < 1e-9);
}

#[test]
fn test_call_below_entry_loses() {
    let outcome = eval(TradeDirection::Call, 1.1000, 1.0999);
    assert_eq!(outcome.result, TradeResult::Loss);
    assert!((outcome.profit + 100.0).abs() < 1e-9);
}

#[test]
fn test_call_at_entry_loses() {
    let outcome = eval(TradeDirection::Call, 1.1000, 1.1000);
    assert_eq!(outcome.result, TradeResult::Loss);
}

#[test]
fn test_put_below_entry_wins() {
    let outcome = eval(TradeDirection::Put, 1.1000, 1.0950);
    assert_eq!(outcome.result, TradeResult::Win);
    assert!((outcome.profit - 80.0).abs() < 1e-9);
}

#[test]
fn test_put_above_entry_loses() {
    let outcome = eval(TradeDirection::Put, 1.1000, 1.1001);
    assert_eq!(outcome.result, TradeResult::Loss);
}

#[test]
fn test_put_at_entry_loses() {
    // Unchanged price is a loss for PUT as well; there is no draw state.
    let outcome = eval(TradeDirection::Put, 2000.0, 2000.0);
    assert_eq!(outcome.result, TradeResult::Loss);
    assert!((outcome.profit + 100.0).abs() < 1e-9);
}

// =============================================================================
// Profit Arithmetic
// =============================================================================

#[test]
fn test_win_profit_scales_with_payout() {
    let outcome = evaluate(TradeDirection::Call, 100.0, 101.0, 250.0, 0.75).unwrap();
    assert_eq!(outcome.result, TradeResult::Win);
    assert!((outcome.profit - 187.5).abs() < 1e-9);
}

#[test]
fn test_loss_profit_is_negative_stake() {
    let outcome = evaluate(TradeDirection::Put, 100.0, 101.0, 250.0, 0.75).unwrap();
    assert_eq!(outcome.result, TradeResult::Loss);
    assert!((outcome.profit + 250.0).abs() < 1e-9);
}

#[test]
fn test_tiny_price_moves_still_decide() {
    let win = eval(TradeDirection::Call, 1.0, 1.0 + 1e-9);
    assert_eq!(win.result, TradeResult::Win);

    let loss = eval(TradeDirection::Put, 1.0, 1.0 + 1e-9);
    assert_eq!(loss.result, TradeResult::Loss);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_evaluation_is_deterministic() {
    for _ in 0..10 {
        let outcome = eval(TradeDirection::Call, 1.2345, 1.2346);
        assert_eq!(outcome.result, TradeResult::Win);
        assert!((outcome.profit - 80.0).abs() < 1e-9);
    }
}

#[test]
fn test_invalid_inputs_rejected() {
    assert!(evaluate(TradeDirection::Call, 1.0, 1.1, 0.0, 0.8).is_err());
    assert!(evaluate(TradeDirection::Put, 1.0, 1.1, 100.0, -0.8).is_err());
    assert!(evaluate(TradeDirection::Call, -1.0, 1.1, 100.0, 0.8).is_err());
}
