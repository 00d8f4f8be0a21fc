//! Property-based tests for the core token-bucket invariants, in the style
//! of this corpus's own token-bucket proptest suites: random replenish and
//! account sequences must never push tokens out of bounds, and time must
//! never be allowed to run backwards.

use proptest::prelude::*;

use htb_sim::{Error, Profile};

fn arb_rate() -> impl Strategy<Value = f64> {
    (1u32..1_000_000).prop_map(f64::from)
}

fn arb_time_sequence(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0u32..10_000, len).prop_map(|deltas| {
        let mut t = 0.0;
        deltas
            .into_iter()
            .map(|d| {
                t += d as f64 / 1000.0;
                t
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Invariant 1: tokens and ctokens stay within [0, burst]/[0, cburst]
    /// across any monotonic sequence of replenishes.
    #[test]
    fn tokens_stay_within_bounds(
        rate in arb_rate(),
        ceil_extra in 0u32..2_000_000,
        times in arb_time_sequence(30),
    ) {
        let ceil = rate + ceil_extra as f64;
        let profile = Profile::inner("root", rate, ceil, vec![]);
        let (mut tree, _leaves) = profile.build().unwrap();
        let root = tree.iter().next().unwrap().0;
        for t in times {
            tree.replenish(root, t).unwrap();
            let node = tree.node(root);
            prop_assert!(node.tokens() >= 0.0 && node.tokens() <= node.burst() + 1e-6);
            prop_assert!(node.ctokens() >= 0.0 && node.ctokens() <= node.cburst() + 1e-6);
        }
    }

    /// Invariant 7: replenishing twice at the same timestamp is a no-op.
    #[test]
    fn replenish_twice_at_same_time_is_idempotent(
        rate in arb_rate(),
        ceil_extra in 0u32..2_000_000,
        t in 0u32..100_000,
    ) {
        let ceil = rate + ceil_extra as f64;
        let profile = Profile::inner("root", rate, ceil, vec![]);
        let (mut tree, _leaves) = profile.build().unwrap();
        let root = tree.iter().next().unwrap().0;
        let t = t as f64 / 1000.0;
        tree.replenish(root, t).unwrap();
        let before = (tree.node(root).tokens(), tree.node(root).ctokens());
        tree.replenish(root, t).unwrap();
        let after = (tree.node(root).tokens(), tree.node(root).ctokens());
        prop_assert_eq!(before, after);
    }

    /// Invariant 8: a non-monotonic replenish call fails and mutates
    /// nothing.
    #[test]
    fn non_monotonic_replenish_fails_without_mutating_state(
        rate in arb_rate(),
        ceil_extra in 0u32..2_000_000,
        t in 1u32..100_000,
        back in 1u32..1_000,
    ) {
        let ceil = rate + ceil_extra as f64;
        let profile = Profile::inner("root", rate, ceil, vec![]);
        let (mut tree, _leaves) = profile.build().unwrap();
        let root = tree.iter().next().unwrap().0;
        let t = t as f64 / 1000.0;
        tree.replenish(root, t).unwrap();
        let before = (tree.node(root).tokens(), tree.node(root).ctokens(), tree.node(root).state());
        let earlier = t - (back as f64 / 1000.0) - 0.001;
        let result = tree.replenish(root, earlier);
        prop_assert!(matches!(result, Err(Error::InvalidTime { .. })));
        let after = (tree.node(root).tokens(), tree.node(root).ctokens(), tree.node(root).state());
        prop_assert_eq!(before, after);
    }

    /// Invariant: account_cir never debits a chain it refuses, and every
    /// successful debit keeps tokens within bounds.
    #[test]
    fn account_cir_keeps_tokens_in_bounds(
        rate in arb_rate(),
        ceil_extra in 0u32..2_000_000,
        amounts in prop::collection::vec(1u32..2000, 20),
    ) {
        let ceil = rate + ceil_extra as f64;
        let profile = Profile::inner("root", rate, ceil, vec![]);
        let (mut tree, _leaves) = profile.build().unwrap();
        let root = tree.iter().next().unwrap().0;
        for amount in amounts {
            tree.account_cir(root, amount as f64);
            let node = tree.node(root);
            prop_assert!(node.tokens() >= 0.0);
            prop_assert!(node.tokens() <= node.burst() + 1e-6);
            prop_assert!(node.ctokens() <= node.cburst() + 1e-6);
        }
    }
}
