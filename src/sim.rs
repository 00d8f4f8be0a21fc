//! The discrete-event engine that multiplexes the rate limiter's tick
//! process and the per-shaper enqueue process against the virtual clock.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clock::EventQueue;
use crate::error::Error;
use crate::node::{NodeId, Tree};
use crate::profile::Profile;
use crate::scheduler::RateLimiter;
use crate::shaper::ShaperLeaf;
use crate::REPLENISH_INTERVAL;

/// One DFS-order entry of [`Simulation::topology`]: a node's identity and
/// rate/ceil, plus its parent (`None` at the root).
#[derive(Clone, Debug, PartialEq)]
pub struct TopologyNode {
    pub id: NodeId,
    pub name: String,
    pub rate: f64,
    pub ceil: f64,
    pub parent: Option<NodeId>,
}

#[derive(Clone, Copy, Debug)]
enum Event {
    /// The recurring per-`REPLENISH_INTERVAL` tick: enqueue, then
    /// replenish, then drain at CIR, then drain at PIR.
    Tick,
}

/// A built tree plus the event queue that drives it: the core's top-level
/// handle, built from a [`Profile`] and advanced with [`Simulation::run`].
pub struct Simulation {
    tree: Tree,
    leaves: Vec<ShaperLeaf>,
    limiter: RateLimiter,
    events: EventQueue<Event>,
    rng: StdRng,
}

impl Simulation {
    /// Build a simulation from `profile`, seeding intra-priority
    /// randomization from OS entropy.
    pub fn new(profile: &Profile) -> Result<Self, Error> {
        Self::with_rng(profile, StdRng::from_entropy())
    }

    /// Build a simulation with a fixed RNG seed, for reproducible tests.
    pub fn with_seed(profile: &Profile, seed: u64) -> Result<Self, Error> {
        Self::with_rng(profile, StdRng::seed_from_u64(seed))
    }

    fn with_rng(profile: &Profile, rng: StdRng) -> Result<Self, Error> {
        let (tree, leaves) = profile.build()?;
        let mut events = EventQueue::new();
        events.schedule(0.0, Event::Tick);
        Ok(Simulation {
            tree,
            leaves,
            limiter: RateLimiter::new(),
            events,
            rng,
        })
    }

    /// Current virtual time.
    pub fn now(&self) -> f64 {
        self.events.now()
    }

    /// Every registered leaf, in build order.
    pub fn leaves(&self) -> &[ShaperLeaf] {
        &self.leaves
    }

    /// The underlying accounting tree, for inspecting token levels.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Run the simulation until virtual time `until`, ticking every
    /// `REPLENISH_INTERVAL`. A `Config`/`InvalidTime` error aborts the run
    /// immediately; in-flight packets remain queued and are visible via
    /// [`Simulation::leaves`].
    pub fn run(&mut self, until: f64) -> Result<(), Error> {
        let Simulation {
            ref mut events,
            ref mut tree,
            ref mut leaves,
            ref limiter,
            ref mut rng,
        } = *self;
        events.run(until, move |now, _event| {
            for leaf in leaves.iter_mut() {
                leaf.enqueue_tick(now, rng);
            }
            limiter.tick(tree, leaves, now, rng)?;
            Ok(Some(REPLENISH_INTERVAL))
        })
    }

    /// Depth-first snapshot of the tree topology, for an external renderer:
    /// every node's `(name, rate, ceil)` and its parent.
    pub fn topology(&self) -> Vec<TopologyNode> {
        self.tree
            .iter()
            .map(|(id, node)| TopologyNode {
                id,
                name: node.name().to_string(),
                rate: node.rate(),
                ceil: node.ceil(),
                parent: node.parent(),
            })
            .collect()
    }
}
