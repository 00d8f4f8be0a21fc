//! Leaf classes: queueing, draining, and the Source/Sink pair each leaf
//! owns.

use std::collections::VecDeque;
use std::fmt;

use rand::Rng;

use crate::node::{NodeId, Tree};
use crate::packet::{rate_since, Packet, PacketGenerator, PacketSink};

/// Snapshot of a leaf's traffic counters, returned by
/// [`ShaperLeaf::stats`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShaperStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    /// `bytes_sent / last_sent_time`, or 0 if nothing has been sent yet
    /// (the divisor is floored at one tick, so a send at `t = 0.0` doesn't
    /// produce an infinite rate).
    pub bytes_per_sec: f64,
}

impl fmt::Display for ShaperStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent: {} packets({} B) rate: {} Bps",
            self.packets_sent, self.bytes_sent, self.bytes_per_sec as u64
        )
    }
}

/// A leaf class: owns the accounting node's [`NodeId`] plus everything the
/// base `ClassNode` doesn't have — priority, a bounded FIFO queue, and the
/// Source/Sink pair that produce and consume its traffic.
#[derive(Clone, Debug)]
pub struct ShaperLeaf {
    id: NodeId,
    name: String,
    prio: u8,
    input_rate: f64,
    queue: VecDeque<Packet>,
    source: PacketGenerator,
    sink: PacketSink,
    packets_sent: u64,
    bytes_sent: u64,
    /// Virtual time of the last successful send; `None` before anything
    /// has been sent, kept distinct from a real send at `t = 0.0` (a leaf
    /// whose bucket starts full can legitimately drain on the very first
    /// tick, before virtual time has advanced past zero).
    last_sent_time: Option<f64>,
}

impl ShaperLeaf {
    pub(crate) fn new(id: NodeId, name: String, prio: u8, input_rate: f64) -> Self {
        ShaperLeaf {
            id,
            source: PacketGenerator::new(format!("Source_{name}"), input_rate),
            sink: PacketSink::new(format!("Sink_{name}")),
            name,
            prio,
            input_rate,
            queue: VecDeque::new(),
            packets_sent: 0,
            bytes_sent: 0,
            last_sent_time: None,
        }
    }

    /// The node this leaf's accounting lives at in the [`Tree`].
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prio(&self) -> u8 {
        self.prio
    }

    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    pub fn source(&self) -> &PacketGenerator {
        &self.source
    }

    pub fn sink(&self) -> &PacketSink {
        &self.sink
    }

    /// Top up this leaf's queue for one tick via its Source.
    pub(crate) fn enqueue_tick(&mut self, now: f64, rng: &mut impl Rng) {
        let queue = &mut self.queue;
        self.source.enqueue_tick(now, rng, |pkt| queue.push_back(pkt));
    }

    /// Whether the queue currently holds any packet.
    pub fn has_packets(&self) -> bool {
        !self.queue.is_empty()
    }

    fn drain_with(
        &mut self,
        tree: &mut Tree,
        now: f64,
        account: impl Fn(&mut Tree, NodeId, f64) -> bool,
    ) {
        while let Some(&pkt) = self.queue.front() {
            if account(tree, self.id, pkt.size as f64) {
                self.queue.pop_front();
                self.sink.put(pkt, now);
                self.packets_sent += 1;
                self.bytes_sent += pkt.size as u64;
                self.last_sent_time = Some(now);
            } else {
                // Head-of-line packet stays put; this drain loop ends and
                // the scheduler moves on to the next shaper.
                break;
            }
        }
    }

    /// Drain under the committed (CIR) regime: stop at the first packet
    /// the committed bucket can't cover, leaving it at the head.
    pub fn send_cir(&mut self, tree: &mut Tree, now: f64) {
        self.drain_with(tree, now, Tree::account_cir);
    }

    /// Drain under the peak (PIR) regime, used once a leaf has borrowed
    /// capacity from an ancestor.
    pub fn send_pir(&mut self, tree: &mut Tree, now: f64) {
        self.drain_with(tree, now, Tree::account_pir);
    }

    /// Attempt to borrow from the parent chain and, if granted, drain at
    /// PIR. Returns whether any borrowing capacity was available.
    pub fn borrow_and_send(&mut self, tree: &mut Tree, now: f64) -> bool {
        if tree.borrow_from_parent(self.id) {
            self.send_pir(tree, now);
            true
        } else {
            false
        }
    }

    /// Traffic counters for this leaf: packets, bytes, and bytes/sec since
    /// the last successful send (0 if nothing has ever been sent).
    pub fn stats(&self) -> ShaperStats {
        let bytes_per_sec = rate_since(self.bytes_sent, self.last_sent_time);
        ShaperStats {
            packets_sent: self.packets_sent,
            bytes_sent: self.bytes_sent,
            bytes_per_sec,
        }
    }
}

impl fmt::Display for ShaperLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ClassNode;

    #[test]
    fn failed_account_leaves_head_of_line_packet_in_place() {
        let mut tree = Tree::new();
        // Committed and peak buckets both too small to cover one packet.
        let root = tree.push(ClassNode::new("root".into(), 0.0, 0.0, None));
        let id = tree.push(ClassNode::new("leaf".into(), 0.0, 0.0, Some(root)));
        let mut leaf = ShaperLeaf::new(id, "leaf".into(), 0, 0.0);
        leaf.queue.push_back(Packet { size: 1000 });
        leaf.queue.push_back(Packet { size: 64 });

        leaf.send_cir(&mut tree, 0.0);

        assert_eq!(leaf.queue.len(), 2, "nothing should have been dequeued");
        assert_eq!(leaf.queue.front().unwrap().size, 1000);
        assert_eq!(leaf.stats().packets_sent, 0);
    }

    #[test]
    fn send_cir_stops_at_first_unaffordable_packet_but_keeps_order() {
        let mut tree = Tree::new();
        let root = tree.push(ClassNode::new("root".into(), 1_000_000.0, 1_000_000.0, None));
        let id = tree.push(ClassNode::new("leaf".into(), 1_000_000.0, 1_000_000.0, Some(root)));
        let mut leaf = ShaperLeaf::new(id, "leaf".into(), 0, 0.0);
        leaf.queue.push_back(Packet { size: 64 });
        leaf.queue.push_back(Packet { size: 64 });

        leaf.send_cir(&mut tree, 0.0);

        assert!(leaf.queue.is_empty());
        assert_eq!(leaf.stats().packets_sent, 2);
    }
}
