//! # Timer Wheel
//!
//! Hierarchical timing wheel that turns `timeout` requests into messages
//! delivered to the requesting actor after a number of ticks.
//!
//! ## Layout
//!
//! - a near tier of 256 one-tick buckets, indexed by the low 8 bits of the
//!   expiry tick
//! - four coarser tiers of 64 buckets each; tier `i` holds nodes whose expiry
//!   shares every bit above bit `8 + 6 * (i + 1)` with the current tick, and
//!   each bucket covers `2^(8 + 6 * i)` ticks
//!
//! When the low bits of the tick counter wrap to zero, the matching coarse
//! bucket is emptied and its nodes are re-inserted one tier closer to the
//! near tier. Insertion and cascading are O(1) per node.
//!
//! Expiries use wrapping arithmetic. A timer whose expiry lies past the wrap
//! of the 32-bit tick counter sits in bucket 0 of the top tier, which is
//! cascaded when the counter itself wraps to zero. Delays are clamped to
//! [`MAX_DELAY`] so that a wrapped expiry never shares a top-tier bucket with
//! the current tick.
//!
//! ## Delivery
//!
//! Expired nodes are collected while the wheel is locked and handed to the
//! caller's `deliver` function after the lock has been released. Nodes that
//! expire on the same tick are delivered in the order they were added.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use starling_api::{Handle, Message};
use tracing::trace;

use crate::sync::lock;

const NEAR_SHIFT: u32 = 8;
const NEAR: usize = 1 << NEAR_SHIFT;
const NEAR_MASK: u32 = (NEAR as u32) - 1;
const LEVEL_SHIFT: u32 = 6;
const LEVEL: usize = 1 << LEVEL_SHIFT;
const LEVEL_MASK: u32 = (LEVEL as u32) - 1;
const LEVELS: usize = 4;
const TOP_SHIFT: u32 = NEAR_SHIFT + (LEVELS as u32 - 1) * LEVEL_SHIFT;

/// Longest delay accepted by [`TimerWheel::timeout`], in ticks. Longer delays
/// are clamped.
pub const MAX_DELAY: u32 = u32::MAX - (1 << TOP_SHIFT) + 1;

/// A pending timer: the message to deliver and where to deliver it.
#[derive(Debug)]
pub struct TimerNode {
    pub expire: u32,
    pub target: Handle,
    pub message: Message,
}

struct Wheel {
    near: Vec<Vec<TimerNode>>,
    levels: Vec<Vec<Vec<TimerNode>>>,
    time: u32,
    pending: usize,
}

impl Wheel {
    fn starting_at(time: u32) -> Self {
        Self {
            near: (0..NEAR).map(|_| Vec::new()).collect(),
            levels: (0..LEVELS)
                .map(|_| (0..LEVEL).map(|_| Vec::new()).collect())
                .collect(),
            time,
            pending: 0,
        }
    }

    fn add_node(&mut self, node: TimerNode) {
        let expire = node.expire;
        let current = self.time;

        if (expire | NEAR_MASK) == (current | NEAR_MASK) {
            self.near[(expire & NEAR_MASK) as usize].push(node);
            return;
        }

        let mut level = 0;
        let mut mask: u64 = (NEAR as u64) << LEVEL_SHIFT;
        while level < LEVELS - 1 {
            let span = (mask - 1) as u32;
            if (expire | span) == (current | span) {
                break;
            }
            mask <<= LEVEL_SHIFT;
            level += 1;
        }

        // Below the top tier the index is never 0. At the top tier, 0 holds
        // expiries past the counter wrap
        let index = (expire >> (NEAR_SHIFT + level as u32 * LEVEL_SHIFT)) & LEVEL_MASK;
        self.levels[level][index as usize].push(node);
    }

    fn cascade(&mut self) {
        let ticks = self.time;
        if ticks == 0 {
            self.move_bucket(LEVELS - 1, 0);
            return;
        }
        let mut low_mask = NEAR_MASK;
        let mut shifted = ticks >> NEAR_SHIFT;

        for level in 0..LEVELS {
            if ticks & low_mask != 0 {
                return;
            }
            let index = shifted & LEVEL_MASK;
            if index != 0 {
                self.move_bucket(level, index as usize);
                return;
            }
            low_mask = (low_mask << LEVEL_SHIFT) | LEVEL_MASK;
            shifted >>= LEVEL_SHIFT;
        }
    }

    fn move_bucket(&mut self, level: usize, index: usize) {
        let bucket = std::mem::take(&mut self.levels[level][index]);
        for node in bucket {
            self.add_node(node);
        }
    }

    fn tick(&mut self) -> Vec<TimerNode> {
        self.time = self.time.wrapping_add(1);
        self.cascade();
        let expired = std::mem::take(&mut self.near[(self.time & NEAR_MASK) as usize]);
        self.pending -= expired.len();
        expired
    }
}

/// Hierarchical timer wheel with a fixed tick length.
pub struct TimerWheel {
    wheel: Mutex<Wheel>,
    started: Instant,
    tick: Duration,
    /// Elapsed ticks already applied by `update_time`
    applied: AtomicU64,
}

impl TimerWheel {
    /// Creates a wheel at tick zero whose clock starts now.
    pub fn new(tick: Duration) -> Self {
        Self::starting_at(0, tick)
    }

    fn starting_at(time: u32, tick: Duration) -> Self {
        Self {
            wheel: Mutex::new(Wheel::starting_at(time)),
            started: Instant::now(),
            tick,
            applied: AtomicU64::new(0),
        }
    }

    /// Schedules `Message::timer_expiry(session)` for `target` after `delay`
    /// ticks.
    ///
    /// A zero delay is delivered through `deliver` immediately, without
    /// touching the wheel. Delays above [`MAX_DELAY`] are clamped to it.
    pub fn timeout<F>(&self, target: Handle, delay: u32, session: i32, mut deliver: F)
    where
        F: FnMut(Handle, Message),
    {
        let message = Message::timer_expiry(session);
        if delay == 0 {
            deliver(target, message);
            return;
        }

        let mut wheel = lock(&self.wheel);
        let expire = wheel.time.wrapping_add(delay.min(MAX_DELAY));
        wheel.add_node(TimerNode {
            expire,
            target,
            message,
        });
        wheel.pending += 1;
        trace!(handle = %target, session, expire, "timer added");
    }

    /// Advances the wheel by one tick and delivers whatever expired.
    pub fn advance<F>(&self, mut deliver: F)
    where
        F: FnMut(Handle, Message),
    {
        let expired = lock(&self.wheel).tick();
        for node in expired {
            trace!(handle = %node.target, session = node.message.session, "timer expired");
            deliver(node.target, node.message);
        }
    }

    /// Catches the wheel up with the monotonic clock, advancing once per
    /// elapsed tick. Returns the number of ticks applied.
    pub fn update_time<F>(&self, mut deliver: F) -> u64
    where
        F: FnMut(Handle, Message),
    {
        let elapsed = (self.started.elapsed().as_nanos() / self.tick.as_nanos().max(1)) as u64;
        let previous = self.applied.fetch_max(elapsed, Ordering::AcqRel);
        if elapsed <= previous {
            return 0;
        }
        for _ in previous..elapsed {
            self.advance(&mut deliver);
        }
        elapsed - previous
    }

    /// Current tick count.
    pub fn now(&self) -> u32 {
        lock(&self.wheel).time
    }

    /// Number of timers still waiting to expire.
    pub fn pending(&self) -> usize {
        lock(&self.wheel).pending
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }
}

impl fmt::Debug for TimerWheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wheel = lock(&self.wheel);
        f.debug_struct("TimerWheel")
            .field("time", &wheel.time)
            .field("pending", &wheel.pending)
            .field("tick", &self.tick)
            .finish()
    }
}
