/// Storage discipline of a single association.
///
/// This is the full set of policies the store understands. Callers normally
/// pick one of the narrower families ([`ValuePolicy`], [`CopyPolicy`],
/// [`ReferencePolicy`]) which convert into it.
///
/// "Atomic" here means the write is applied synchronously and serialized
/// against every other reader and atomic writer. It says nothing about the
/// value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Policy {
    /// Holds a non-owning handle to a shared value.
    Assign,
    /// Stores an independent duplicate, applied synchronously.
    CopyAtomic,
    /// Stores an independent duplicate, applied in the background.
    CopyNonAtomic,
    /// Stores the value directly, applied synchronously.
    #[default]
    Atomic,
    /// Stores the value directly, applied in the background.
    NonAtomic,
}

impl Policy {
    /// Whether writes under this policy block until they are applied.
    pub fn is_atomic(self) -> bool {
        matches!(self, Policy::CopyAtomic | Policy::Atomic | Policy::Assign)
    }

    /// Whether writes under this policy store a duplicate of the value.
    pub fn is_copy(self) -> bool {
        matches!(self, Policy::CopyAtomic | Policy::CopyNonAtomic)
    }

    /// Whether writes under this policy hold the value weakly.
    pub fn is_weak(self) -> bool {
        self == Policy::Assign
    }
}

/// Policies for values stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValuePolicy {
    #[default]
    Atomic,
    NonAtomic,
}

/// Policies for values stored as independent duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CopyPolicy {
    #[default]
    CopyAtomic,
    CopyNonAtomic,
}

/// Policy for shared values held without keeping them alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReferencePolicy {
    #[default]
    Assign,
}

impl From<ValuePolicy> for Policy {
    fn from(policy: ValuePolicy) -> Self {
        match policy {
            ValuePolicy::Atomic => Policy::Atomic,
            ValuePolicy::NonAtomic => Policy::NonAtomic,
        }
    }
}

impl From<CopyPolicy> for Policy {
    fn from(policy: CopyPolicy) -> Self {
        match policy {
            CopyPolicy::CopyAtomic => Policy::CopyAtomic,
            CopyPolicy::CopyNonAtomic => Policy::CopyNonAtomic,
        }
    }
}

impl From<ReferencePolicy> for Policy {
    fn from(_: ReferencePolicy) -> Self {
        Policy::Assign
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomicity() {
        assert!(Policy::Atomic.is_atomic());
        assert!(Policy::CopyAtomic.is_atomic());
        // weak assignment is always applied synchronously
        assert!(Policy::Assign.is_atomic());
        assert!(!Policy::NonAtomic.is_atomic());
        assert!(!Policy::CopyNonAtomic.is_atomic());
    }

    #[test]
    fn test_copy_and_weak_flags() {
        assert!(Policy::CopyAtomic.is_copy());
        assert!(Policy::CopyNonAtomic.is_copy());
        assert!(!Policy::Atomic.is_copy());
        assert!(!Policy::Assign.is_copy());

        assert!(Policy::Assign.is_weak());
        assert!(!Policy::NonAtomic.is_weak());
    }

    #[test]
    fn test_family_conversions() {
        assert_eq!(Policy::from(ValuePolicy::Atomic), Policy::Atomic);
        assert_eq!(Policy::from(ValuePolicy::NonAtomic), Policy::NonAtomic);
        assert_eq!(Policy::from(CopyPolicy::CopyAtomic), Policy::CopyAtomic);
        assert_eq!(Policy::from(CopyPolicy::CopyNonAtomic), Policy::CopyNonAtomic);
        assert_eq!(Policy::from(ReferencePolicy::Assign), Policy::Assign);

        assert_eq!(Policy::from(ValuePolicy::default()), Policy::Atomic);
        assert_eq!(Policy::from(CopyPolicy::default()), Policy::CopyAtomic);
    }
}
