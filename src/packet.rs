//! Packets and the source/sink pair each leaf owns.

use rand::Rng;

use crate::{PKT_MAX_LEN, PKT_MIN_LEN, REPLENISH_INTERVAL};

/// Computes `bytes / elapsed` for a "rate so far" stat, given the virtual
/// time of the last send/arrival (`None` if nothing has happened yet).
///
/// A leaf whose bucket starts full can legitimately send its first packet
/// at virtual time `0.0` (see the enqueue-then-drain ordering in
/// `Simulation::run`), so `0.0` is a real elapsed time, not just the
/// "nothing happened" sentinel — `last_time` is tracked as an `Option`
/// precisely to keep those two cases distinct. Once something has
/// happened at `t = 0.0`, dividing by the literal elapsed time of zero
/// would yield an infinite rate, so the divisor is floored at one tick.
pub(crate) fn rate_since(bytes: u64, last_time: Option<f64>) -> f64 {
    match last_time {
        None => 0.0,
        Some(t) => bytes as f64 / t.max(REPLENISH_INTERVAL),
    }
}

/// An immutable packet: nothing but a size in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "borsh", derive(borsh::BorshSerialize, borsh::BorshDeserialize))]
pub struct Packet {
    /// Size in bytes, always within `[PKT_MIN_LEN, PKT_MAX_LEN]`.
    pub size: u32,
}

/// Produces packets toward a bounded-rate target, topping up a leaf's queue
/// once per tick without exceeding `throughput` on average.
#[derive(Clone, Debug)]
pub struct PacketGenerator {
    name: String,
    throughput: f64,
    packets_sent: u64,
    bytes_sent: u64,
    /// Virtual time of the last generated packet; `None` before anything
    /// has been generated, kept distinct from a real send at `t = 0.0`.
    last_sent: Option<f64>,
}

impl PacketGenerator {
    pub(crate) fn new(name: String, throughput: f64) -> Self {
        PacketGenerator {
            name,
            throughput,
            packets_sent: 0,
            bytes_sent: 0,
            last_sent: None,
        }
    }

    /// Draw one packet with a uniformly random size in
    /// `[PKT_MIN_LEN, PKT_MAX_LEN]`.
    fn draw_packet(rng: &mut impl Rng) -> Packet {
        Packet {
            size: rng.gen_range(PKT_MIN_LEN..=PKT_MAX_LEN),
        }
    }

    /// Top up the caller's queue for one tick, honoring the rolling-average
    /// rate cap: at `t = 0` the cap is `throughput * REPLENISH_INTERVAL`
    /// worth of bytes; afterwards generation stops just before
    /// `(bytes_sent + next_size) / t` would exceed `throughput`.
    pub(crate) fn enqueue_tick(&mut self, now: f64, rng: &mut impl Rng, push: impl FnMut(Packet)) {
        let mut push = push;
        let mut bytes_gen = 0u64;
        loop {
            let pkt = Self::draw_packet(rng);
            if now == 0.0 {
                if (bytes_gen + pkt.size as u64) as f64 > self.throughput * REPLENISH_INTERVAL {
                    break;
                }
            } else if ((self.bytes_sent + pkt.size as u64) as f64 / now) > self.throughput {
                break;
            }
            push(pkt);
            self.packets_sent += 1;
            self.bytes_sent += pkt.size as u64;
            bytes_gen += pkt.size as u64;
        }
        if bytes_gen > 0 {
            self.last_sent = Some(now);
        }
    }

    /// Average bytes/sec generated so far, 0 before anything has been sent.
    pub fn rate(&self) -> f64 {
        rate_since(self.bytes_sent, self.last_sent)
    }

    /// Total packets generated so far.
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Total bytes generated so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Name, for the stats line printed by `Display`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for PacketGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sent: {} packets({} B) rate: {} Bps",
            self.name,
            self.packets_sent,
            self.bytes_sent,
            self.rate() as u64
        )
    }
}

/// Terminal consumer of a leaf's drained packets: counts and timestamps
/// arrivals, nothing more.
#[derive(Clone, Debug)]
pub struct PacketSink {
    name: String,
    packets_recv: u64,
    bytes_recv: u64,
    /// Virtual time of the last arrival; `None` before anything has
    /// arrived, kept distinct from a real arrival at `t = 0.0`.
    last_arrival: Option<f64>,
}

impl PacketSink {
    pub(crate) fn new(name: String) -> Self {
        PacketSink {
            name,
            packets_recv: 0,
            bytes_recv: 0,
            last_arrival: None,
        }
    }

    /// Record one packet's arrival at `now`.
    pub(crate) fn put(&mut self, pkt: Packet, now: f64) {
        self.packets_recv += 1;
        self.bytes_recv += pkt.size as u64;
        self.last_arrival = Some(now);
    }

    /// Average bytes/sec received so far, 0 if nothing has arrived.
    pub fn rate(&self) -> f64 {
        rate_since(self.bytes_recv, self.last_arrival)
    }

    /// Total packets received so far.
    pub fn packets_recv(&self) -> u64 {
        self.packets_recv
    }

    /// Total bytes received so far.
    pub fn bytes_recv(&self) -> u64 {
        self.bytes_recv
    }
}

impl std::fmt::Display for PacketSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sent: {} packets({} B) rate: {} Bps",
            self.name,
            self.packets_recv,
            self.bytes_recv,
            self.rate() as u64
        )
    }
}
