//! 0/1 knapsack solver over integer capacity.
//!
//! Classical dynamic programming: `dp[i][w]` is the best value using the
//! first `i` candidates with capacity `w`. Reconstruction includes item `i`
//! iff `dp[i][w] > dp[i-1][w]`; on ties the item is excluded, which makes the
//! selection deterministic for identical input (including input order).
//!
//! The solver checks its cancellation token once per outer item, so a
//! cancelled request unblocks within `O(capacity)` inner steps.

use tokio_util::sync::CancellationToken;

use dray_core::{Error, Result, ShippableOrder};

/// The solver's output: a feasible, value-maximal subset of the candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected orders, in candidate order.
    pub orders: Vec<ShippableOrder>,
    /// Sum of the selected orders' values.
    pub total_value: u64,
    /// Sum of the selected orders' weights.
    pub total_weight: u64,
}

impl Selection {
    fn empty() -> Self {
        Self {
            orders: Vec::new(),
            total_value: 0,
            total_weight: 0,
        }
    }
}

/// Selects the subset of `candidates` maximizing total value without
/// exceeding `capacity`.
///
/// Candidates heavier than the capacity are admissible and ignored;
/// zero-weight candidates with positive value are always selected. Empty
/// input and zero capacity yield an empty selection (zero capacity still
/// admits zero-weight candidates).
///
/// Time and space are `O(n · capacity)`.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] when `cancel` trips; the check runs before
/// each candidate's DP row.
pub fn solve(
    candidates: &[ShippableOrder],
    capacity: u32,
    cancel: &CancellationToken,
) -> Result<Selection> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if candidates.is_empty() {
        return Ok(Selection::empty());
    }

    let width = capacity as usize + 1;
    let n = candidates.len();

    // Row i holds the best achievable value using the first i candidates.
    let mut rows: Vec<Vec<u64>> = Vec::with_capacity(n + 1);
    rows.push(vec![0; width]);

    for (i, order) in candidates.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let prev = &rows[i];
        let mut row = prev.clone();
        let weight = order.weight as usize;
        let value = u64::from(order.value);
        if weight < width {
            for cap in weight..width {
                let taking = prev[cap - weight] + value;
                if taking > row[cap] {
                    row[cap] = taking;
                }
            }
        }
        rows.push(row);
    }

    // Walk i = n..1; strict improvement means item i is part of the optimum.
    let mut remaining = capacity as usize;
    let mut picked: Vec<ShippableOrder> = Vec::new();
    for i in (1..=n).rev() {
        if rows[i][remaining] > rows[i - 1][remaining] {
            let order = candidates[i - 1];
            remaining -= order.weight as usize;
            picked.push(order);
        }
    }
    picked.reverse();

    let total_weight = picked.iter().map(|o| u64::from(o.weight)).sum();
    Ok(Selection {
        total_value: rows[n][capacity as usize],
        total_weight,
        orders: picked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(order_id: i64, weight: u32, value: u32) -> ShippableOrder {
        ShippableOrder {
            order_id,
            weight,
            value,
        }
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn empty_input_yields_empty_selection() {
        let selection = solve(&[], 50, &token()).unwrap();
        assert!(selection.orders.is_empty());
        assert_eq!(selection.total_value, 0);
        assert_eq!(selection.total_weight, 0);
    }

    #[test]
    fn zero_capacity_yields_empty_selection() {
        let candidates = [order(1, 10, 100)];
        let selection = solve(&candidates, 0, &token()).unwrap();
        assert!(selection.orders.is_empty());
        assert_eq!(selection.total_value, 0);
    }

    #[test]
    fn single_exact_fit_is_taken() {
        let candidates = [order(1, 10, 100)];
        let selection = solve(&candidates, 10, &token()).unwrap();
        assert_eq!(selection.orders, vec![order(1, 10, 100)]);
        assert_eq!(selection.total_value, 100);
        assert_eq!(selection.total_weight, 10);
    }

    #[test]
    fn classic_choice_prefers_feasible_pair() {
        // {2,3} would be worth 110 but weighs 9; the optimum at capacity 8
        // is {1,3} worth 100 at weight 8.
        let candidates = [order(1, 3, 40), order(2, 4, 50), order(3, 5, 60)];
        let selection = solve(&candidates, 8, &token()).unwrap();
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(selection.total_value, 100);
        assert_eq!(selection.total_weight, 8);
    }

    #[test]
    fn overweight_candidates_are_ignored() {
        let candidates = [order(1, 100, 1000), order(2, 5, 10)];
        let selection = solve(&candidates, 20, &token()).unwrap();
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(selection.total_value, 10);
    }

    #[test]
    fn zero_weight_positive_value_is_always_selected() {
        let candidates = [order(1, 0, 7), order(2, 10, 100)];
        let selection = solve(&candidates, 0, &token()).unwrap();
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(selection.total_value, 7);
        assert_eq!(selection.total_weight, 0);
    }

    #[test]
    fn zero_weight_zero_value_is_excluded() {
        let candidates = [order(1, 0, 0)];
        let selection = solve(&candidates, 10, &token()).unwrap();
        assert!(selection.orders.is_empty());
    }

    #[test]
    fn equal_value_tie_prefers_earlier_candidate() {
        // Two interchangeable candidates: the tie rule (strict improvement
        // only) keeps exactly one, and always the same one.
        let candidates = [order(1, 5, 50), order(2, 5, 50)];
        let selection = solve(&candidates, 5, &token()).unwrap();
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn solve_is_deterministic() {
        let candidates = [
            order(3, 5, 60),
            order(1, 3, 40),
            order(2, 4, 50),
            order(9, 1, 5),
        ];
        let first = solve(&candidates, 9, &token()).unwrap();
        let second = solve(&candidates, 9, &token()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cancelled_token_aborts_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let candidates = [order(1, 3, 40)];
        let result = solve(&candidates, 8, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
