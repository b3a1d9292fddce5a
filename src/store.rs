use crate::any_value::{Entry, Slot, Value};
use crate::config::StoreConfig;
use crate::dispatch::Dispatcher;
use crate::error::AssocError;
use crate::key::AssociationKey;
use crate::policy::Policy;
use log::{debug, trace, warn};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, RwLock, Weak};

static GLOBAL: OnceCell<AssociationStore> = OnceCell::new();

type Items = RwLock<HashMap<AssociationKey, Entry>>;

/// Queued non-atomic writes per key, not yet applied.
#[derive(Default)]
struct PendingWrites {
    keys: Mutex<HashMap<AssociationKey, usize>>,
    settled: Condvar,
}

impl PendingWrites {
    fn add(&self, key: &AssociationKey) -> Result<(), AssocError> {
        let mut keys = self.keys.lock().map_err(|_| AssocError::LockError)?;
        *keys.entry(key.clone()).or_insert(0) += 1;
        Ok(())
    }

    fn contains(&self, key: &AssociationKey) -> Result<bool, AssocError> {
        let keys = self.keys.lock().map_err(|_| AssocError::LockError)?;
        Ok(keys.contains_key(key))
    }

    fn release(&self, key: &AssociationKey) {
        // Must run even when poisoned, or writers waiting on the key hang.
        let mut keys = match self.keys.lock() {
            Ok(keys) => keys,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(count) = keys.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                keys.remove(key);
                self.settled.notify_all();
            }
        }
    }

    /// Blocks until no write for `key` is queued.
    fn wait_settled(&self, key: &AssociationKey) -> Result<(), AssocError> {
        let keys = self.keys.lock().map_err(|_| AssocError::LockError)?;
        let _settled = self
            .settled
            .wait_while(keys, |keys| keys.contains_key(key))
            .map_err(|_| AssocError::LockError)?;
        Ok(())
    }
}

/// A thread-safe store of values associated with objects it does not own.
///
/// Each entry is addressed by an [`AssociationKey`] (owner identity plus a
/// hashed user key) and written under a [`Policy`]. Owners are tracked
/// weakly; once an owner is dropped its entries become stale and are swept
/// on the next `get` or `set`.
///
/// Reads share a reader-writer lock. Atomic writes take it exclusively and
/// are applied before `set` returns. Non-atomic writes are handed to a pool of
/// background writers and may land in any order among themselves, but an
/// atomic write to a key first waits for the writes already queued for it.
///
/// # Examples
///
/// ```
/// use sovran_assoc::{AssociationKey, AssociationStore, AssocError, Policy, Value};
/// use std::sync::Arc;
///
/// fn main() -> Result<(), AssocError> {
///     let store = AssociationStore::new();
///     let owner = Arc::new(String::from("button"));
///     let key = AssociationKey::new(&owner, "clicks");
///
///     store.set(&key, Value::new(0u32), Policy::Atomic)?;
///     assert_eq!(store.get::<u32>(&key, Policy::Atomic)?, Some(0));
///
///     drop(owner);
///     store.sweep()?;
///     assert!(!store.contains_key(&key, Policy::Atomic)?);
///     Ok(())
/// }
/// ```
pub struct AssociationStore {
    items: Arc<Items>,
    pending: Arc<PendingWrites>,
    dispatcher: Dispatcher,
    config: StoreConfig,
}

impl AssociationStore {
    /// Creates a new, empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a new, empty store.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(PendingWrites::default()),
            dispatcher: Dispatcher::new(config.workers(), config.thread_name()),
            config,
        }
    }

    /// The process-wide store, created with the default configuration on first use.
    pub fn global() -> &'static AssociationStore {
        GLOBAL.get_or_init(AssociationStore::new)
    }

    /// Creates the process-wide store with `config`.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::AlreadyInitialized` if the global store already
    /// exists, whether it was created by an earlier `init_global` or by
    /// [`global`](Self::global).
    pub fn init_global(config: StoreConfig) -> Result<&'static AssociationStore, AssocError> {
        let mut created = false;
        let store = GLOBAL.get_or_init(|| {
            created = true;
            AssociationStore::with_config(config)
        });
        if created {
            Ok(store)
        } else {
            Err(AssocError::AlreadyInitialized)
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Reads the value stored under `key` as a `T`.
    ///
    /// Returns `Ok(None)` when there is no entry, when the entry was cleared,
    /// when the stored value is not a `T`, or when it was stored weakly and
    /// the referent is gone. A weak entry is only seen through
    /// [`Policy::Assign`] and a strong entry only through the other policies.
    /// Weakly held values are read back as the `Arc<U>` they were stored as.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn get<T: Any + Clone>(&self, key: &AssociationKey, policy: Policy) -> Result<Option<T>, AssocError> {
        self.sweep_if_enabled()?;
        let items = self.items.read().map_err(|_| AssocError::LockError)?;
        let value = items.get(key).and_then(|entry| {
            let weak_slot = matches!(entry.slot, Slot::Weak(_));
            if weak_slot == policy.is_weak() {
                entry.read::<T>()
            } else {
                None
            }
        });
        Ok(value)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// The copy policies store a duplicate of `value`. [`Policy::Assign`]
    /// stores a non-owning handle; values that are not shared `Arc`s cannot
    /// be held that way and will read back as absent. Atomic policies apply
    /// the write before returning, non-atomic ones queue it.
    ///
    /// # Errors
    ///
    /// - Returns `AssocError::NotDuplicable` for a copy policy and a value
    ///   without the duplicate capability; nothing is written
    /// - Returns `AssocError::LockError` if the internal lock cannot be acquired
    pub fn set(&self, key: &AssociationKey, value: impl Into<Value>, policy: Policy) -> Result<(), AssocError> {
        self.sweep_if_enabled()?;
        let slot = Self::make_slot(value.into(), policy)?;
        self.write(key, Entry { slot, policy })
    }

    /// Overwrites the entry under `key` with an absent value.
    ///
    /// The entry keeps existing, so [`contains_key`](Self::contains_key)
    /// stays true while reads return `None`.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn clear(&self, key: &AssociationKey, policy: Policy) -> Result<(), AssocError> {
        self.sweep_if_enabled()?;
        self.write(
            key,
            Entry {
                slot: Slot::Empty,
                policy,
            },
        )
    }

    /// Checks whether an entry exists for `key`.
    ///
    /// This neither sweeps nor checks whether a weakly held value is still
    /// alive. A queued non-atomic write counts as an existing entry.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn contains_key(&self, key: &AssociationKey, _policy: Policy) -> Result<bool, AssocError> {
        // Pending first: a queued write leaves the pending set only after it
        // has been inserted, so checking in this order cannot miss it.
        if self.pending.contains(key)? {
            return Ok(true);
        }
        let items = self.items.read().map_err(|_| AssocError::LockError)?;
        Ok(items.contains_key(key))
    }

    /// The policy the entry under `key` was last written with.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn policy_of(&self, key: &AssociationKey) -> Result<Option<Policy>, AssocError> {
        let items = self.items.read().map_err(|_| AssocError::LockError)?;
        Ok(items.get(key).map(|entry| entry.policy))
    }

    /// Removes every entry whose owner has been dropped.
    ///
    /// Returns how many entries were removed. Scans under the shared lock and
    /// only locks exclusively when there is something to remove.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn sweep(&self) -> Result<usize, AssocError> {
        {
            let items = self.items.read().map_err(|_| AssocError::LockError)?;
            if items.is_empty() || items.keys().all(AssociationKey::is_alive) {
                return Ok(0);
            }
        }

        // Removed entries are dropped after the lock is released, so a value
        // whose drop touches this store cannot deadlock.
        let stale: Vec<(AssociationKey, Entry)> = {
            let mut items = self.items.write().map_err(|_| AssocError::LockError)?;
            let dead: Vec<AssociationKey> = items.keys().filter(|key| !key.is_alive()).cloned().collect();
            let stale: Vec<_> = dead
                .into_iter()
                .filter_map(|key| items.remove_entry(&key))
                .collect();
            if !stale.is_empty() {
                debug!("swept {} stale association(s), {} left", stale.len(), items.len());
            }
            stale
        };
        Ok(stale.len())
    }

    /// Blocks until every queued non-atomic write has been applied.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn flush(&self) -> Result<(), AssocError> {
        self.dispatcher.flush()
    }

    /// Number of entries, stale ones included.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn len(&self) -> Result<usize, AssocError> {
        let items = self.items.read().map_err(|_| AssocError::LockError)?;
        Ok(items.len())
    }

    /// Checks if the store is empty.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the internal lock cannot be acquired.
    pub fn is_empty(&self) -> Result<bool, AssocError> {
        let items = self.items.read().map_err(|_| AssocError::LockError)?;
        Ok(items.is_empty())
    }

    fn sweep_if_enabled(&self) -> Result<(), AssocError> {
        if self.config.sweep_on_access() {
            self.sweep()?;
        }
        Ok(())
    }

    fn make_slot(value: Value, policy: Policy) -> Result<Slot, AssocError> {
        if policy.is_weak() {
            return Ok(match value.downgrade() {
                Some(handle) => Slot::Weak(handle),
                None => {
                    warn!(
                        "value of type {} is not shared and cannot be held weakly",
                        value.type_name()
                    );
                    Slot::Weak(Box::new(Weak::<()>::new()))
                }
            });
        }

        if policy.is_copy() {
            let type_name = value.type_name();
            return value
                .duplicate()
                .map(Slot::Strong)
                .ok_or(AssocError::NotDuplicable { type_name });
        }

        Ok(Slot::Strong(value))
    }

    fn write(&self, key: &AssociationKey, entry: Entry) -> Result<(), AssocError> {
        let policy = entry.policy;
        if policy.is_atomic() {
            // Earlier queued writes to this key land first, never after.
            self.pending.wait_settled(key)?;
            let replaced = apply(&self.items, key, entry)?;
            trace!("applied {:?} write for {:?}", policy, key);
            drop(replaced);
            return Ok(());
        }

        self.pending.add(key)?;

        let items = Arc::clone(&self.items);
        let pending = Arc::clone(&self.pending);
        let job_key = key.clone();
        let queued = self.dispatcher.submit(Box::new(move || {
            let replaced = match apply(&items, &job_key, entry) {
                Ok(replaced) => {
                    trace!("applied {:?} write for {:?}", policy, job_key);
                    replaced
                }
                Err(_) => {
                    warn!("dropped {:?} write for {:?}: store lock poisoned", policy, job_key);
                    None
                }
            };
            pending.release(&job_key);
            drop(replaced);
        }));

        if queued.is_err() {
            self.pending.release(key);
        }
        queued
    }
}

/// Inserts `entry` and hands back the one it replaced, to be dropped by the
/// caller once the lock is released.
fn apply(items: &Items, key: &AssociationKey, entry: Entry) -> Result<Option<Entry>, AssocError> {
    let mut items = items.write().map_err(|_| AssocError::LockError)?;
    Ok(items.insert(key.clone(), entry))
}

impl Default for AssociationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AssociationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("AssociationStore");
        match self.items.read() {
            Ok(items) => out.field("entries", &items.len()),
            Err(_) => out.field("entries", &"<poisoned>"),
        };
        out.field("workers", &self.dispatcher.worker_count())
            .field("config", &self.config)
            .finish()
    }
}
