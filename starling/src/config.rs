use std::time::Duration;

use crate::error::ConfigError;
use crate::mailbox::DEFAULT_MAILBOX_CAPACITY;
use crate::scheduler::DEFAULT_GLOBAL_QUEUE_CAPACITY;

/// Initial number of handle slots. Grows by doubling.
pub const DEFAULT_HANDLE_SLOTS: usize = 4;

/// Length of one timer tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 1024;

// --- Runtime Configuration ---

/// Configuration for an `ActorSystem`.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Number of dispatcher threads started by `ActorSystem::start`.
    pub worker_threads: usize,

    /// Capacity hint of the global queue. Rounded up to a power of two.
    pub global_queue_capacity: usize,

    /// Initial capacity of every actor queue.
    pub mailbox_capacity: usize,

    /// Initial number of handle table slots.
    pub handle_slots: usize,

    /// Length of one timer tick. Timeouts are expressed in ticks.
    pub tick: Duration,

    /// How long an idle worker parks before re-checking the global queue and
    /// the shutdown flag.
    pub idle_sleep: Duration,

    /// Messages delivered per actor each time its queue is taken from the
    /// global queue. `1` gives strict round-robin between actors.
    pub max_messages_per_run: usize,

    /// Bound of the dead-letter channel. Dead letters beyond it are only
    /// logged.
    pub dead_letter_capacity: usize,

    /// Worker threads are named `{thread_name_prefix}{index}`.
    pub thread_name_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            global_queue_capacity: DEFAULT_GLOBAL_QUEUE_CAPACITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            handle_slots: DEFAULT_HANDLE_SLOTS,
            tick: DEFAULT_TICK,
            idle_sleep: Duration::from_millis(10),
            max_messages_per_run: 1,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
            thread_name_prefix: "starling-worker-".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Checks that every count and duration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("worker_threads", self.worker_threads),
            ("global_queue_capacity", self.global_queue_capacity),
            ("mailbox_capacity", self.mailbox_capacity),
            ("handle_slots", self.handle_slots),
            ("max_messages_per_run", self.max_messages_per_run),
            ("dead_letter_capacity", self.dead_letter_capacity),
        ];
        if let Some(&(field, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(field));
        }
        if self.tick.is_zero() {
            return Err(ConfigError::Zero("tick"));
        }
        if self.idle_sleep.is_zero() {
            return Err(ConfigError::Zero("idle_sleep"));
        }
        Ok(())
    }
}
