use crate::any_value::Value;
use crate::error::AssocError;
use crate::key::AssociationKey;
use crate::policy::{CopyPolicy, Policy, ReferencePolicy, ValuePolicy};
use crate::store::AssociationStore;
use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A typed handle to one associated value.
///
/// An `Association` is bound at construction to an owner, a key and a
/// policy, and reads and writes a value of type `T` through an
/// [`AssociationStore`]. If nothing is stored yet when the handle is created,
/// the initial value is written, so the first `get` sees it.
///
/// Handles are cheap; creating a second one for the same owner and key does
/// not reset the value.
///
/// # Examples
///
/// ```
/// use sovran_assoc::{Association, AssocError, ValuePolicy};
/// use std::sync::Arc;
///
/// struct Widget;
///
/// fn main() -> Result<(), AssocError> {
///     let widget = Arc::new(Widget);
///
///     let clicks = Association::new(&widget, "clicks", 0u32, ValuePolicy::Atomic)?;
///     assert_eq!(clicks.get()?, Some(0));
///
///     clicks.set(3)?;
///
///     // another handle to the same slot keeps the stored value
///     let again = Association::new(&widget, "clicks", 0u32, ValuePolicy::Atomic)?;
///     assert_eq!(again.get()?, Some(3));
///     Ok(())
/// }
/// ```
pub struct Association<'s, T> {
    store: &'s AssociationStore,
    key: AssociationKey,
    policy: Policy,
    into_value: fn(T) -> Value,
}

impl<T: Any + Send + Sync + Clone> Association<'static, T> {
    /// Binds a handle in the global store; values are stored as-is.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn new<O, K>(owner: &Arc<O>, key: &K, init: T, policy: ValuePolicy) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        Association::new_in(AssociationStore::global(), owner, key, init, policy)
    }

    /// Binds a handle in the global store; values are stored as duplicates.
    ///
    /// For an `Arc` use [`copying_shared`](Association::copying_shared), which
    /// copies the pointee rather than the handle.
    ///
    /// # Errors
    ///
    /// - Returns `AssocError::NotDuplicable` if `T` is an `Arc`
    /// - Returns `AssocError::LockError` if the store's lock cannot be acquired
    pub fn copying<O, K>(owner: &Arc<O>, key: &K, init: T, policy: CopyPolicy) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        Association::copying_in(AssociationStore::global(), owner, key, init, policy)
    }
}

impl<U: ?Sized + Send + Sync + 'static> Association<'static, Arc<U>> {
    /// Binds a handle in the global store; values are held weakly.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn weak<O, K>(
        owner: &Arc<O>,
        key: &K,
        init: Option<Arc<U>>,
        policy: ReferencePolicy,
    ) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        Association::weak_in(AssociationStore::global(), owner, key, init, policy)
    }
}

impl<'s, T: Any + Send + Sync + Clone> Association<'s, T> {
    /// Like [`new`](Association::new), in an explicit store.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn new_in<O, K>(
        store: &'s AssociationStore,
        owner: &Arc<O>,
        key: &K,
        init: T,
        policy: ValuePolicy,
    ) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        let handle = Self::bind(store, AssociationKey::new(owner, key), policy.into(), Value::new::<T>);
        handle.initialize(init)?;
        Ok(handle)
    }

    /// Like [`copying`](Association::copying), in an explicit store.
    ///
    /// # Errors
    ///
    /// - Returns `AssocError::NotDuplicable` if `T` is an `Arc`
    /// - Returns `AssocError::LockError` if the store's lock cannot be acquired
    pub fn copying_in<O, K>(
        store: &'s AssociationStore,
        owner: &Arc<O>,
        key: &K,
        init: T,
        policy: CopyPolicy,
    ) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        let handle = Self::bind(
            store,
            AssociationKey::new(owner, key),
            policy.into(),
            Value::copyable::<T>,
        );
        handle.initialize(init)?;
        Ok(handle)
    }

    /// Writes `init` when nothing is stored, or when what is stored does not
    /// read back as a `T`.
    fn initialize(&self, init: T) -> Result<(), AssocError> {
        if !self.is_set()? {
            self.set(init.clone())?;
        }
        if self.get()?.is_none() {
            self.set(init)?;
        }
        Ok(())
    }
}

impl<U: Clone + Send + Sync + 'static> Association<'static, Arc<U>> {
    /// Binds a handle in the global store; each stored value is a fresh `Arc`
    /// around a clone of the pointee.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn copying_shared<O, K>(owner: &Arc<O>, key: &K, init: Arc<U>, policy: CopyPolicy) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        Association::copying_shared_in(AssociationStore::global(), owner, key, init, policy)
    }
}

impl<'s, U: Clone + Send + Sync + 'static> Association<'s, Arc<U>> {
    /// Like [`copying_shared`](Association::copying_shared), in an explicit store.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn copying_shared_in<O, K>(
        store: &'s AssociationStore,
        owner: &Arc<O>,
        key: &K,
        init: Arc<U>,
        policy: CopyPolicy,
    ) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        let handle = Self::bind(
            store,
            AssociationKey::new(owner, key),
            policy.into(),
            Value::shared_copyable::<U>,
        );
        handle.initialize(init)?;
        Ok(handle)
    }
}

impl<'s, U: ?Sized + Send + Sync + 'static> Association<'s, Arc<U>> {
    /// Like [`weak`](Association::weak), in an explicit store.
    ///
    /// Without an initial value the slot is created empty.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn weak_in<O, K>(
        store: &'s AssociationStore,
        owner: &Arc<O>,
        key: &K,
        init: Option<Arc<U>>,
        policy: ReferencePolicy,
    ) -> Result<Self, AssocError>
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        let handle = Self::bind(
            store,
            AssociationKey::new(owner, key),
            policy.into(),
            Value::shared::<U>,
        );
        if !handle.is_set()? {
            match init {
                Some(value) => handle.set(value)?,
                None => handle.clear()?,
            }
        }
        Ok(handle)
    }
}

impl<'s, T: Any + Clone> Association<'s, T> {
    fn bind(store: &'s AssociationStore, key: AssociationKey, policy: Policy, into_value: fn(T) -> Value) -> Self {
        Self {
            store,
            key,
            policy,
            into_value,
        }
    }

    /// Reads the current value.
    ///
    /// `None` means the value was cleared, a weakly held value was dropped,
    /// or another handle stored a different type under the same key.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn get(&self) -> Result<Option<T>, AssocError> {
        self.store.get::<T>(&self.key, self.policy)
    }

    /// Replaces the current value.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn set(&self, value: T) -> Result<(), AssocError> {
        self.store.set(&self.key, (self.into_value)(value), self.policy)
    }

    /// Overwrites the current value with an absent one.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn clear(&self) -> Result<(), AssocError> {
        self.store.clear(&self.key, self.policy)
    }

    /// Whether the store has an entry for this handle's key.
    ///
    /// # Errors
    ///
    /// Returns `AssocError::LockError` if the store's lock cannot be acquired.
    pub fn is_set(&self) -> Result<bool, AssocError> {
        self.store.contains_key(&self.key, self.policy)
    }

    pub fn key(&self) -> &AssociationKey {
        &self.key
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn store(&self) -> &'s AssociationStore {
        self.store
    }
}

impl<T> fmt::Debug for Association<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn local_store() -> AssociationStore {
        AssociationStore::with_config(StoreConfig::default().with_workers(1))
    }

    #[test]
    fn test_initial_value_written_once() -> Result<(), AssocError> {
        let store = local_store();
        let owner = Arc::new(());

        let first = Association::new_in(&store, &owner, "count", 0i32, ValuePolicy::Atomic)?;
        assert_eq!(first.get()?, Some(0));
        first.set(5)?;

        let second = Association::new_in(&store, &owner, "count", 0i32, ValuePolicy::Atomic)?;
        assert_eq!(second.get()?, Some(5));
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[test]
    fn test_type_conflict_reinitializes() -> Result<(), AssocError> {
        let store = local_store();
        let owner = Arc::new(());

        let text = Association::new_in(&store, &owner, "slot", String::from("a"), ValuePolicy::Atomic)?;
        let number = Association::new_in(&store, &owner, "slot", 1u8, ValuePolicy::Atomic)?;

        assert_eq!(number.get()?, Some(1));
        assert_eq!(text.get()?, None);
        Ok(())
    }

    #[test]
    fn test_copying_handle_stores_duplicates() -> Result<(), AssocError> {
        let store = local_store();
        let owner = Arc::new(());

        let mut tags = vec![String::from("new")];
        let handle = Association::copying_in(&store, &owner, "tags", tags.clone(), CopyPolicy::CopyAtomic)?;
        tags.push(String::from("unsaved"));

        assert_eq!(handle.get()?, Some(vec![String::from("new")]));
        assert_eq!(handle.policy(), Policy::CopyAtomic);
        Ok(())
    }

    #[derive(Debug)]
    struct Tally(AtomicU32);

    impl Clone for Tally {
        fn clone(&self) -> Self {
            Tally(AtomicU32::new(self.0.load(Ordering::SeqCst)))
        }
    }

    #[test]
    fn test_copying_shared_handle_copies_the_pointee() -> Result<(), AssocError> {
        let store = local_store();
        let owner = Arc::new(());
        let original = Arc::new(Tally(AtomicU32::new(1)));

        let handle = Association::copying_shared_in(
            &store,
            &owner,
            "tally",
            Arc::clone(&original),
            CopyPolicy::CopyAtomic,
        )?;
        original.0.store(2, Ordering::SeqCst);

        let stored = handle.get()?.expect("copy stored");
        assert!(!Arc::ptr_eq(&stored, &original));
        assert_eq!(stored.0.load(Ordering::SeqCst), 1);
        assert_eq!(Arc::strong_count(&original), 1);
        Ok(())
    }

    #[test]
    fn test_copying_handle_refuses_arc() {
        let store = local_store();
        let owner = Arc::new(());
        let original = Arc::new(Tally(AtomicU32::new(1)));

        let result = Association::copying_in(
            &store,
            &owner,
            "tally",
            Arc::clone(&original),
            CopyPolicy::CopyAtomic,
        );
        assert!(matches!(result, Err(AssocError::NotDuplicable { .. })));
        assert_eq!(Arc::strong_count(&original), 1);
    }

    #[test]
    fn test_weak_handle_without_initial_value() -> Result<(), AssocError> {
        let store = local_store();
        let owner = Arc::new(());

        let delegate: Association<'_, Arc<str>> =
            Association::weak_in(&store, &owner, "delegate", None, ReferencePolicy::Assign)?;
        assert!(delegate.is_set()?);
        assert_eq!(delegate.get()?, None);

        let target: Arc<str> = Arc::from("target");
        delegate.set(Arc::clone(&target))?;
        assert_eq!(delegate.get()?.as_deref(), Some("target"));

        drop(target);
        assert_eq!(delegate.get()?, None);
        Ok(())
    }

    #[test]
    fn test_clear() -> Result<(), AssocError> {
        let store = local_store();
        let owner = Arc::new(());

        let handle = Association::new_in(&store, &owner, "name", String::from("x"), ValuePolicy::Atomic)?;
        handle.clear()?;
        assert!(handle.is_set()?);
        assert_eq!(handle.get()?, None);
        Ok(())
    }

    #[test]
    fn test_debug_output() -> Result<(), AssocError> {
        let store = local_store();
        let owner = Arc::new(());
        let handle = Association::new_in(&store, &owner, "n", 1u64, ValuePolicy::Atomic)?;
        let printed = format!("{:?}", handle);
        assert!(printed.contains("Atomic"));
        assert!(printed.contains("u64"));
        Ok(())
    }
}
