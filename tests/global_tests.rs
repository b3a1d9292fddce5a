// The global store is process-wide, so everything touching its
// initialization lives in this one test binary and one test.

use sovran_assoc::{AssocError, Association, AssociationStore, StoreConfig, ValuePolicy};
use std::sync::Arc;

#[test]
fn test_global_store_initialization() -> Result<(), AssocError> {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = StoreConfig::default()
        .with_workers(3)
        .with_thread_name("global-writer");
    let store = AssociationStore::init_global(config.clone())?;
    assert_eq!(store.config(), &config);

    // later calls see the same instance
    assert!(std::ptr::eq(store, AssociationStore::global()));
    assert_eq!(
        AssociationStore::init_global(StoreConfig::default()).err(),
        Some(AssocError::AlreadyInitialized)
    );

    // handles without an explicit store land in the global one
    let owner = Arc::new(());
    let handle = Association::new(&owner, "global", 7i32, ValuePolicy::NonAtomic)?;
    store.flush()?;
    assert!(std::ptr::eq(handle.store(), store));
    assert_eq!(handle.get()?, Some(7));
    assert!(store.contains_key(handle.key(), handle.policy())?);
    Ok(())
}
