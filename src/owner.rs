use std::sync::Weak;

/// A non-owning view of the object an association is attached to.
///
/// The store never keeps owners alive. It only needs to tell owners apart and
/// to know whether one is still reachable, so that entries attached to a
/// dropped owner can be swept.
///
/// `identity` must stay stable and unique for as long as the handle itself
/// exists. For [`Weak`] this holds because a weak handle keeps the owner's
/// allocation reserved even after the value is dropped.
pub trait Owner: Send + Sync {
    /// An address-like value identifying the owner.
    fn identity(&self) -> usize;

    /// Whether the owner is still reachable.
    fn is_alive(&self) -> bool;
}

impl<T: ?Sized + Send + Sync> Owner for Weak<T> {
    fn identity(&self) -> usize {
        // thin the pointer so unsized owners compare by address alone
        self.as_ptr() as *const () as usize
    }

    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}
