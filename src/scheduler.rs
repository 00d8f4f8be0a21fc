//! The per-tick orchestrator: replenishes the whole tree, then runs the
//! CIR and PIR passes in strict priority order with intra-priority
//! randomization.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use crate::error::Error;
use crate::node::Tree;
use crate::shaper::ShaperLeaf;
use crate::{HIGHEST_PRIO, LOWEST_PRIO};

/// Drives one tick across every registered shaper. Stateless beyond what a
/// tick needs locally — the tree and the leaves it schedules are owned by
/// the caller ([`crate::sim::Simulation`]).
#[derive(Clone, Copy, Debug, Default)]
pub struct RateLimiter;

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter
    }

    /// One full tick: replenish, then send-at-CIR, then borrow-at-PIR.
    pub fn tick(
        &self,
        tree: &mut Tree,
        leaves: &mut [ShaperLeaf],
        now: f64,
        rng: &mut impl Rng,
    ) -> Result<(), Error> {
        self.replenish(tree, leaves, now)?;
        self.process_nodes_that_can_send(tree, leaves, now, rng);
        self.process_nodes_that_can_borrow(tree, leaves, now, rng);
        Ok(())
    }

    /// Replenish every registered shaper. Each call recursively refreshes
    /// the shaper's ancestors first, so siblings sharing a parent replenish
    /// it redundantly but harmlessly within the same tick.
    fn replenish(&self, tree: &mut Tree, leaves: &[ShaperLeaf], now: f64) -> Result<(), Error> {
        for leaf in leaves {
            tree.replenish(leaf.id(), now)?;
        }
        Ok(())
    }

    /// CIR pass: each priority level in turn, siblings shuffled, each
    /// shaper drained until it runs dry or blocks.
    fn process_nodes_that_can_send(
        &self,
        tree: &mut Tree,
        leaves: &mut [ShaperLeaf],
        now: f64,
        rng: &mut impl Rng,
    ) {
        for prio in HIGHEST_PRIO..=LOWEST_PRIO {
            let mut order = priority_group(leaves, prio);
            order.shuffle(rng);
            for idx in order {
                while leaves[idx].has_packets() && tree.can_send(leaves[idx].id()) {
                    trace!(leaf = leaves[idx].name(), "send_cir");
                    leaves[idx].send_cir(tree, now);
                }
            }
        }
    }

    /// PIR pass: same priority/shuffle discipline, gated on borrowed
    /// capacity instead of committed capacity.
    fn process_nodes_that_can_borrow(
        &self,
        tree: &mut Tree,
        leaves: &mut [ShaperLeaf],
        now: f64,
        rng: &mut impl Rng,
    ) {
        for prio in HIGHEST_PRIO..=LOWEST_PRIO {
            let mut order = priority_group(leaves, prio);
            order.shuffle(rng);
            for idx in order {
                while leaves[idx].has_packets() && tree.can_borrow(leaves[idx].id()) {
                    trace!(leaf = leaves[idx].name(), "borrow_and_send");
                    leaves[idx].borrow_and_send(tree, now);
                }
            }
        }
    }
}

fn priority_group(leaves: &[ShaperLeaf], prio: u8) -> Vec<usize> {
    leaves
        .iter()
        .enumerate()
        .filter(|(_, leaf)| leaf.prio() == prio)
        .map(|(idx, _)| idx)
        .collect()
}
