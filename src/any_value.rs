use crate::policy::Policy;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

type AnyBox = Box<dyn Any + Send + Sync>;
type DuplicateFn = fn(&(dyn Any + Send + Sync)) -> Option<AnyBox>;
type DowngradeFn = fn(&(dyn Any + Send + Sync)) -> Option<Box<dyn WeakSlot>>;

/// A type-erased value on its way into the store.
///
/// Besides the value itself, a `Value` remembers what the store may do with
/// it: whether it can be duplicated (required by the copy policies) and
/// whether it is a shared handle that can be held weakly (required for
/// [`Policy::Assign`] to be meaningful). Those capabilities are picked by the
/// constructor used.
///
/// # Examples
///
/// ```
/// use sovran_assoc::Value;
/// use std::sync::Arc;
///
/// let plain = Value::new(5u32);
/// assert!(!plain.is_duplicable());
///
/// let copyable = Value::copyable(vec![1, 2, 3]);
/// assert!(copyable.is_duplicable());
///
/// let shared = Value::shared(Arc::new(String::from("shared")));
/// assert!(shared.is_shared());
/// ```
pub struct Value {
    type_id: TypeId,
    type_name: &'static str,
    inner: AnyBox,
    duplicate: Option<DuplicateFn>,
    downgrade: Option<DowngradeFn>,
}

impl Value {
    /// Wraps a value that will be stored as-is.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            inner: Box::new(value),
            duplicate: None,
            downgrade: None,
        }
    }

    /// Wraps a value that may be stored as an independent duplicate.
    ///
    /// Cloning an `Arc` only clones the handle, so an `Arc` wrapped here is
    /// not duplicable; use [`shared_copyable`](Self::shared_copyable) to copy
    /// the pointee instead.
    pub fn copyable<T: Any + Send + Sync + Clone>(value: T) -> Self {
        let duplicate: Option<DuplicateFn> = if is_shared_handle::<T>() {
            None
        } else {
            Some(duplicate_clone::<T>)
        };
        Self {
            duplicate,
            ..Self::new(value)
        }
    }

    /// Wraps a shared value that may be held weakly.
    ///
    /// Reads return the same `Arc<T>`.
    pub fn shared<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            downgrade: Some(downgrade_arc::<T>),
            ..Self::new(value)
        }
    }

    /// Wraps a shared value that may be held weakly or duplicated.
    ///
    /// Duplicating clones the pointee into a fresh `Arc`, never just the
    /// handle.
    pub fn shared_copyable<T: Send + Sync + Clone + 'static>(value: Arc<T>) -> Self {
        Self {
            duplicate: Some(duplicate_arc::<T>),
            ..Self::shared(value)
        }
    }

    /// Whether the copy policies can store this value.
    pub fn is_duplicable(&self) -> bool {
        self.duplicate.is_some()
    }

    /// Whether this value can be held through a non-owning handle.
    pub fn is_shared(&self) -> bool {
        self.downgrade.is_some()
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if the contained value is of type T
    pub fn is_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Get a reference to the contained value if it is of type T
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Produces an independent copy, if this value supports it.
    pub(crate) fn duplicate(&self) -> Option<Value> {
        let duplicate = self.duplicate?;
        let inner = duplicate(self.inner.as_ref())?;
        Some(Value {
            type_id: self.type_id,
            type_name: self.type_name,
            inner,
            duplicate: self.duplicate,
            downgrade: self.downgrade,
        })
    }

    /// Produces a non-owning handle, if this value is shared.
    pub(crate) fn downgrade(&self) -> Option<Box<dyn WeakSlot>> {
        self.downgrade.and_then(|downgrade| downgrade(self.inner.as_ref()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_name)
            .field("duplicable", &self.is_duplicable())
            .field("shared", &self.is_shared())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> From<Arc<T>> for Value {
    fn from(value: Arc<T>) -> Self {
        Value::shared(value)
    }
}

fn is_shared_handle<T: ?Sized>() -> bool {
    let name = type_name::<T>();
    name.starts_with("alloc::sync::Arc<") || name.starts_with("std::sync::Arc<")
}

fn duplicate_clone<T: Any + Send + Sync + Clone>(value: &(dyn Any + Send + Sync)) -> Option<AnyBox> {
    value
        .downcast_ref::<T>()
        .map(|value| Box::new(value.clone()) as AnyBox)
}

fn duplicate_arc<T: Send + Sync + Clone + 'static>(value: &(dyn Any + Send + Sync)) -> Option<AnyBox> {
    value
        .downcast_ref::<Arc<T>>()
        .map(|value| Box::new(Arc::new(T::clone(value))) as AnyBox)
}

fn downgrade_arc<T: ?Sized + Send + Sync + 'static>(
    value: &(dyn Any + Send + Sync),
) -> Option<Box<dyn WeakSlot>> {
    value
        .downcast_ref::<Arc<T>>()
        .map(|value| Box::new(Arc::downgrade(value)) as Box<dyn WeakSlot>)
}

/// A non-owning handle to a stored shared value.
pub(crate) trait WeakSlot: Send + Sync {
    /// Upgrades to a boxed `Arc<T>` while the referent lives.
    fn upgrade(&self) -> Option<AnyBox>;
}

impl<T: ?Sized + Send + Sync + 'static> WeakSlot for Weak<T> {
    fn upgrade(&self) -> Option<AnyBox> {
        Weak::upgrade(self).map(|strong| Box::new(strong) as AnyBox)
    }
}

/// What the store keeps for one association.
pub(crate) enum Slot {
    /// Held directly, or as a duplicate for the copy policies.
    Strong(Value),
    /// Held without keeping the referent alive.
    Weak(Box<dyn WeakSlot>),
    /// Overwritten to absent.
    Empty,
}

/// A stored slot tagged with the policy it was written under.
pub(crate) struct Entry {
    pub(crate) slot: Slot,
    pub(crate) policy: Policy,
}

impl Entry {
    /// Clones the stored value out as a `T`, if it is one and still reachable.
    pub(crate) fn read<T: Any + Clone>(&self) -> Option<T> {
        match &self.slot {
            Slot::Strong(value) => value.downcast_ref::<T>().cloned(),
            Slot::Weak(handle) => handle
                .upgrade()
                .and_then(|strong| strong.downcast::<T>().ok())
                .map(|strong| *strong),
            Slot::Empty => None,
        }
    }
}
