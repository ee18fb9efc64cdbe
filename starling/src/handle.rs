//! # Handle Table
//!
//! Maps handles to live actor contexts and names to handles.
//!
//! ## Key Implementation Details
//!
//! - Slots form a power-of-two array indexed by `handle & (slots - 1)`.
//!   Registration probes linearly from a monotonically increasing cursor, so
//!   a freshly retired handle value is not reissued until the cursor comes
//!   back around.
//! - A full array doubles; existing contexts are rehashed by the new mask.
//!   Since their old indices were distinct, so are the new ones.
//! - Handle `0` is never issued. The cursor starts at 1 and skips 0 when the
//!   32-bit space wraps.
//! - Names live in an array sorted by name and are found by binary search.
//!   Retiring a handle removes every name bound to it, keeping the order.
//! - One `RwLock` guards slots and names together. Nothing that may run
//!   actor code is ever done while it is held: retired contexts are dropped
//!   after the guard.

use std::fmt;
use std::sync::{Arc, RwLock};

use starling_api::{Handle, NameError};

use crate::context::ActorContext;
use crate::sync::{read, write};

struct Storage {
    cursor: u32,
    slots: Vec<Option<Arc<ActorContext>>>,
    names: Vec<(String, Handle)>,
}

impl Storage {
    fn mask(&self) -> u32 {
        (self.slots.len() - 1) as u32
    }

    fn index_of(&self, handle: Handle) -> usize {
        (handle.raw() & self.mask()) as usize
    }

    fn live(&self, handle: Handle) -> Option<&Arc<ActorContext>> {
        self.slots[self.index_of(handle)]
            .as_ref()
            .filter(|ctx| ctx.handle() == handle)
    }

    fn find_name(&self, name: &str) -> Result<usize, usize> {
        self.names
            .binary_search_by(|(bound, _)| bound.as_str().cmp(name))
    }

    /// First free slot probing from the cursor, with the handle it yields.
    fn vacant(&self) -> Option<(Handle, usize)> {
        (0..self.slots.len() as u32)
            .map(|offset| self.cursor.wrapping_add(offset))
            .filter(|&candidate| candidate != 0)
            .map(Handle::new)
            .map(|handle| (handle, self.index_of(handle)))
            .find(|&(_, index)| self.slots[index].is_none())
    }

    fn grow(&mut self) {
        let doubled = self.slots.len() * 2;
        let mut slots: Vec<Option<Arc<ActorContext>>> = (0..doubled).map(|_| None).collect();
        let mask = (doubled - 1) as u32;
        for ctx in self.slots.drain(..).flatten() {
            let index = (ctx.handle().raw() & mask) as usize;
            debug_assert!(slots[index].is_none(), "rehash collision");
            slots[index] = Some(ctx);
        }
        self.slots = slots;
    }
}

/// Registry of live actors.
pub struct HandleTable {
    storage: RwLock<Storage>,
}

impl HandleTable {
    /// Creates a table with `slots` initial slots, rounded up to a power of
    /// two.
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1).next_power_of_two();
        Self {
            storage: RwLock::new(Storage {
                cursor: 1,
                slots: (0..slots).map(|_| None).collect(),
                names: Vec::new(),
            }),
        }
    }

    /// Picks a fresh handle, builds its context with `create` and stores it.
    /// Returns a strong reference to the stored context.
    ///
    /// `create` runs under the write lock and must not call back into the
    /// table.
    pub fn register_with<F>(&self, create: F) -> Arc<ActorContext>
    where
        F: FnOnce(Handle) -> Arc<ActorContext>,
    {
        let mut storage = write(&self.storage);
        let (handle, index) = loop {
            if let Some(vacant) = storage.vacant() {
                break vacant;
            }
            storage.grow();
        };
        let ctx = create(handle);
        storage.slots[index] = Some(Arc::clone(&ctx));
        storage.cursor = match handle.raw().wrapping_add(1) {
            0 => 1,
            next => next,
        };
        ctx
    }

    /// Removes `handle` and every name bound to it.
    ///
    /// Returns whether a live actor was retired. The table's reference to the
    /// context is dropped after the lock is released.
    pub fn retire(&self, handle: Handle) -> bool {
        let retired = {
            let mut storage = write(&self.storage);
            let index = storage.index_of(handle);
            let matches = storage.slots[index]
                .as_ref()
                .is_some_and(|ctx| ctx.handle() == handle);
            if !matches {
                return false;
            }
            storage.names.retain(|(_, bound)| *bound != handle);
            storage.slots[index].take()
        };
        drop(retired);
        true
    }

    /// Returns a strong reference to the live context of `handle`.
    pub fn grab(&self, handle: Handle) -> Option<Arc<ActorContext>> {
        read(&self.storage).live(handle).cloned()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        read(&self.storage).live(handle).is_some()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Handle> {
        let storage = read(&self.storage);
        storage
            .find_name(name)
            .ok()
            .map(|index| storage.names[index].1)
    }

    /// Binds `name` to a live `handle`.
    ///
    /// A name is bound at most once; binding an existing name fails no matter
    /// which handle owns it. A handle may carry several names.
    pub fn bind_name(&self, handle: Handle, name: &str) -> Result<(), NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        let mut storage = write(&self.storage);
        if storage.live(handle).is_none() {
            return Err(NameError::UnknownHandle(handle));
        }
        match storage.find_name(name) {
            Ok(_) => Err(NameError::AlreadyExists(name.to_string())),
            Err(index) => {
                storage.names.insert(index, (name.to_string(), handle));
                Ok(())
            }
        }
    }

    /// Names bound to `handle`, in name order.
    pub fn names_of(&self, handle: Handle) -> Vec<String> {
        read(&self.storage)
            .names
            .iter()
            .filter(|(_, bound)| *bound == handle)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Snapshot of every live handle.
    pub fn handles(&self) -> Vec<Handle> {
        read(&self.storage)
            .slots
            .iter()
            .flatten()
            .map(|ctx| ctx.handle())
            .collect()
    }

    /// Number of live actors.
    pub fn len(&self) -> usize {
        read(&self.storage).slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current number of slots.
    pub fn capacity(&self) -> usize {
        read(&self.storage).slots.len()
    }
}

impl fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = read(&self.storage);
        f.debug_struct("HandleTable")
            .field("slots", &storage.slots.len())
            .field("names", &storage.names.len())
            .field("cursor", &storage.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dead_letter::DeadLetterSink;
    use crate::mailbox::ActorQueue;
    use starling_api::{InitError, ServiceContext, ServiceInstance};

    struct Idle;

    impl ServiceInstance for Idle {
        fn init(&mut self, _ctx: &dyn ServiceContext, _args: &str) -> Result<(), InitError> {
            Ok(())
        }
    }

    fn register(table: &HandleTable) -> Handle {
        let sink = DeadLetterSink::bounded(8);
        table
            .register_with(|handle| {
                Arc::new(ActorContext::new(
                    handle,
                    "idle",
                    Box::new(Idle),
                    ActorQueue::new(handle, 4),
                    sink,
                ))
            })
            .handle()
    }

    #[test]
    fn test_handles_are_sequential_and_nonzero() {
        let table = HandleTable::new(4);
        let handles: Vec<u32> = (0..3).map(|_| register(&table).raw()).collect();
        assert_eq!(handles, vec![1, 2, 3]);
        assert!(table.grab(Handle::new(0)).is_none());
    }

    #[test]
    fn test_growth_keeps_every_actor_reachable() {
        let table = HandleTable::new(4);
        let handles: Vec<Handle> = (0..20).map(|_| register(&table)).collect();
        assert_eq!(table.capacity(), 32);
        assert_eq!(table.len(), 20);
        for handle in handles {
            assert_eq!(table.grab(handle).unwrap().handle(), handle);
        }
    }

    #[test]
    fn test_retired_handle_is_not_reused_immediately() {
        let table = HandleTable::new(4);
        let first = register(&table);
        assert!(table.retire(first));
        assert!(!table.retire(first));

        let second = register(&table);
        assert_ne!(first, second);
        assert!(table.grab(first).is_none());
    }

    #[test]
    fn test_stale_handle_does_not_match_new_occupant() {
        let table = HandleTable::new(4);
        let handles: Vec<Handle> = (0..4).map(|_| register(&table)).collect();
        table.retire(handles[0]);
        // Fills the freed slot with a different handle value
        let reused = register(&table);
        assert_eq!(reused.raw() & 3, handles[0].raw() & 3);
        assert!(table.grab(handles[0]).is_none());
        assert!(table.grab(reused).is_some());
    }

    #[test]
    fn test_grab_keeps_context_alive_after_retire() {
        let table = HandleTable::new(4);
        let handle = register(&table);
        let held = table.grab(handle).unwrap();

        table.retire(handle);
        assert_eq!(Arc::strong_count(&held), 1);
        assert_eq!(held.handle(), handle);
        assert!(!held.queue().is_released());

        let queue = Arc::clone(held.queue());
        drop(held);
        assert!(queue.is_released());
    }

    #[test]
    fn test_bind_and_find_names() {
        let table = HandleTable::new(4);
        let gate = register(&table);
        let db = register(&table);

        table.bind_name(gate, "gate").unwrap();
        table.bind_name(db, "db").unwrap();
        table.bind_name(gate, "watchdog").unwrap();

        assert_eq!(table.find_by_name("gate"), Some(gate));
        assert_eq!(table.find_by_name("db"), Some(db));
        assert_eq!(table.find_by_name("missing"), None);
        assert_eq!(table.names_of(gate), vec!["gate", "watchdog"]);
    }

    #[test]
    fn test_bind_name_rejections() {
        let table = HandleTable::new(4);
        let gate = register(&table);
        let other = register(&table);
        table.bind_name(gate, "gate").unwrap();

        assert_eq!(
            table.bind_name(other, "gate"),
            Err(NameError::AlreadyExists("gate".to_string()))
        );
        assert_eq!(
            table.bind_name(gate, "gate"),
            Err(NameError::AlreadyExists("gate".to_string()))
        );
        assert_eq!(table.bind_name(gate, ""), Err(NameError::Empty));
        assert_eq!(
            table.bind_name(Handle::new(99), "ghost"),
            Err(NameError::UnknownHandle(Handle::new(99)))
        );
        assert_eq!(table.find_by_name("gate"), Some(gate));
    }

    #[test]
    fn test_retire_removes_all_names_of_handle() {
        let table = HandleTable::new(4);
        let a = register(&table);
        let b = register(&table);
        table.bind_name(a, "alpha").unwrap();
        table.bind_name(b, "beta").unwrap();
        table.bind_name(a, "gamma").unwrap();
        table.bind_name(b, "delta").unwrap();

        table.retire(a);
        assert_eq!(table.find_by_name("alpha"), None);
        assert_eq!(table.find_by_name("gamma"), None);
        assert_eq!(table.find_by_name("beta"), Some(b));
        assert_eq!(table.find_by_name("delta"), Some(b));
        assert_eq!(table.names_of(b), vec!["beta", "delta"]);
    }

    #[test]
    fn test_concurrent_registration_yields_unique_handles() {
        let table = Arc::new(HandleTable::new(4));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || (0..50).map(|_| register(&table)).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<Handle> = workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 200);
        assert_eq!(table.len(), 200);
    }
}
