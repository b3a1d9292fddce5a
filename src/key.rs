use crate::owner::Owner;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identifies one association: an owner object plus a user-chosen key.
///
/// The owner is held through a non-owning [`Owner`] handle and the user key
/// is reduced to a 64-bit hash. Two keys are equal when both the owner
/// identity and the key hash match, so different owners never share a slot
/// even when their user keys hash identically.
#[derive(Clone)]
pub struct AssociationKey {
    owner: Arc<dyn Owner>,
    identity: usize,
    hash: u64,
}

impl AssociationKey {
    /// Creates a key for `key` attached to `owner`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sovran_assoc::AssociationKey;
    /// use std::sync::Arc;
    ///
    /// let owner = Arc::new(String::from("window"));
    /// let a = AssociationKey::new(&owner, "title");
    /// let b = AssociationKey::new(&owner, "title");
    /// assert_eq!(a, b);
    /// ```
    pub fn new<O, K>(owner: &Arc<O>, key: &K) -> Self
    where
        O: ?Sized + Send + Sync + 'static,
        K: ?Sized + Hash,
    {
        Self::from_raw_hash(owner, hash_key(key))
    }

    /// Creates a key from an already computed user-key hash.
    pub fn from_raw_hash<O>(owner: &Arc<O>, hash: u64) -> Self
    where
        O: ?Sized + Send + Sync + 'static,
    {
        Self::with_owner(Arc::downgrade(owner), hash)
    }

    /// Creates a key around any [`Owner`] implementation.
    pub fn with_owner<W: Owner + 'static>(owner: W, hash: u64) -> Self {
        let identity = owner.identity();
        Self {
            owner: Arc::new(owner),
            identity,
            hash,
        }
    }

    /// The address-like identity of the owner.
    pub fn owner_identity(&self) -> usize {
        self.identity
    }

    /// The hash of the user key.
    pub fn key_hash(&self) -> u64 {
        self.hash
    }

    /// Whether the owner is still reachable.
    pub fn is_alive(&self) -> bool {
        self.owner.is_alive()
    }
}

/// Reduces a user key to the integer stored in an [`AssociationKey`].
///
/// Uses a fixed-key hasher so equal keys hash equally for the whole process.
pub fn hash_key<K: ?Sized + Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for AssociationKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.hash == other.hash
    }
}

impl Eq for AssociationKey {}

impl Hash for AssociationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
        self.hash.hash(state);
    }
}

impl fmt::Debug for AssociationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationKey")
            .field("owner", &format_args!("{:#x}", self.identity))
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_owner_same_key_is_equal() {
        let owner = Arc::new(1u32);
        assert_eq!(
            AssociationKey::new(&owner, "count"),
            AssociationKey::new(&owner, "count")
        );
        assert_ne!(
            AssociationKey::new(&owner, "count"),
            AssociationKey::new(&owner, "total")
        );
    }

    #[test]
    fn test_owner_identity_is_part_of_equality() {
        let a = Arc::new(1u32);
        let b = Arc::new(1u32);
        let ka = AssociationKey::from_raw_hash(&a, 42);
        let kb = AssociationKey::from_raw_hash(&b, 42);

        assert_eq!(ka.key_hash(), kb.key_hash());
        assert_ne!(ka, kb);
    }

    #[test]
    fn test_string_and_str_keys_agree() {
        let owner = Arc::new(());
        let from_str = AssociationKey::new(&owner, "name");
        let from_string = AssociationKey::new(&owner, &String::from("name"));
        assert_eq!(from_str, from_string);
    }

    #[test]
    fn test_liveness_follows_owner() {
        let owner = Arc::new(vec![1, 2, 3]);
        let key = AssociationKey::new(&owner, &7u8);
        assert!(key.is_alive());
        drop(owner);
        assert!(!key.is_alive());
    }

    #[test]
    fn test_debug_output() {
        let owner = Arc::new(0u8);
        let key = AssociationKey::from_raw_hash(&owner, 0xff);
        let printed = format!("{:?}", key);
        assert!(printed.contains("AssociationKey"));
        assert!(printed.contains("0x00000000000000ff"));
        assert!(printed.contains("alive: true"));
    }
}
