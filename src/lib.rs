//! Hierarchical Token Bucket (HTB) traffic-shaping simulator.
//!
//! Models a tree of rate-limited traffic classes: leaves shape packet
//! traffic from a [`PacketGenerator`][packet::PacketGenerator] to a
//! [`PacketSink`][packet::PacketSink], while inner classes aggregate and
//! redistribute unused capacity to their descendants ("borrowing"). Build a
//! [`Profile`] describing the tree, turn it into a [`Simulation`], and
//! `run` it forward in virtual time:
//!
//! ```
//! use htb_sim::{Profile, Simulation};
//!
//! let profile = Profile::inner(
//!     "Root",
//!     25_000_000.0,
//!     25_000_000.0,
//!     vec![Profile::leaf("L1", 12_000_000.0, 25_000_000.0, 1, 30_000_000.0)],
//! );
//! let mut sim = Simulation::with_seed(&profile, 42).unwrap();
//! sim.run(1.0).unwrap();
//! for leaf in sim.leaves() {
//!     println!("{leaf}");
//! }
//! ```
//!
//! The engine itself (token accounting, borrowing, scheduling, simulated
//! time) is in scope; a visualization renderer, a profile file loader, and
//! a progress indicator are external collaborators this crate does not
//! provide.

pub mod clock;
pub mod error;
pub mod node;
pub mod packet;
pub mod profile;
pub mod scheduler;
pub mod shaper;
pub mod sim;

pub use error::{ConfigError, Error};
pub use node::{ClassNode, NodeId, State, Tree};
pub use packet::{Packet, PacketGenerator, PacketSink};
pub use profile::Profile;
pub use scheduler::RateLimiter;
pub use shaper::{ShaperLeaf, ShaperStats};
pub use sim::{Simulation, TopologyNode};

/// Smallest packet size, in bytes.
pub const PKT_MIN_LEN: u32 = 64;
/// Largest packet size, in bytes.
pub const PKT_MAX_LEN: u32 = 1518;
/// Length of one scheduler tick, in virtual seconds.
pub const REPLENISH_INTERVAL: f64 = 0.001;
/// Highest (first-served) scheduling priority.
pub const HIGHEST_PRIO: u8 = 0;
/// Lowest (last-served) scheduling priority.
pub const LOWEST_PRIO: u8 = 7;
