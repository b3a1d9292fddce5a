//! # sovran-assoc
//!
//! Thread-safe associated storage: attach extra values to objects you don't own.
//!
//! `sovran-assoc` keeps a side table keyed by *(owner, key)*. The owner is any
//! reference-counted object (`Arc<T>`) and is tracked weakly, so attaching a
//! value never keeps the owner alive. Once an owner is dropped its entries go
//! stale and are swept away on the next access.
//!
//! ## Key Features
//!
//! - **Weak owners**: entries never extend the lifetime of the object they belong to
//! - **Storage policies**: store values as-is, as independent duplicates, or hold
//!   shared values weakly
//! - **Atomic or fire-and-forget writes**: atomic writes are applied before `set`
//!   returns; non-atomic writes are queued on background writer threads
//! - **Thread-safe**: one reader-writer lock, many concurrent readers
//! - **Type-checked reads**: a read with the wrong type yields `None`, never a panic
//!
//! ## Usage Examples
//!
//! ### Typed Handles
//!
//! ```rust
//! use sovran_assoc::{Association, AssocError, ValuePolicy};
//! use std::sync::Arc;
//!
//! // A type from some other crate that has no room for our data.
//! struct Connection {
//!     peer: String,
//! }
//!
//! fn retries(conn: &Arc<Connection>) -> Result<Association<'static, u32>, AssocError> {
//!     Association::new(conn, "retries", 0u32, ValuePolicy::Atomic)
//! }
//!
//! fn main() -> Result<(), AssocError> {
//!     let conn = Arc::new(Connection { peer: "10.0.0.1".to_string() });
//!
//!     let counter = retries(&conn)?;
//!     assert_eq!(counter.get()?, Some(0));
//!
//!     counter.set(counter.get()?.unwrap_or(0) + 1)?;
//!     assert_eq!(retries(&conn)?.get()?, Some(1));
//!
//!     println!("{} retried once", conn.peer);
//!     Ok(())
//! }
//! ```
//!
//! ### Copies and Weak References
//!
//! ```rust
//! use sovran_assoc::{Association, AssocError, CopyPolicy, ReferencePolicy};
//! use std::sync::Arc;
//!
//! struct View;
//! struct Delegate {
//!     name: &'static str,
//! }
//!
//! fn main() -> Result<(), AssocError> {
//!     let view = Arc::new(View);
//!
//!     // copies are independent of the caller's value
//!     let mut tags = vec!["draft"];
//!     let stored_tags = Association::copying(&view, "tags", tags.clone(), CopyPolicy::CopyAtomic)?;
//!     tags.push("local-only");
//!     assert_eq!(stored_tags.get()?, Some(vec!["draft"]));
//!
//!     // weak references disappear with their referent
//!     let delegate = Arc::new(Delegate { name: "controller" });
//!     let weak = Association::weak(&view, "delegate", Some(Arc::clone(&delegate)), ReferencePolicy::Assign)?;
//!     assert_eq!(weak.get()?.map(|d| d.name), Some("controller"));
//!
//!     drop(delegate);
//!     assert!(weak.get()?.is_none());
//!     Ok(())
//! }
//! ```
//!
//! ### Using the Store Directly
//!
//! ```rust
//! use sovran_assoc::{AssociationKey, AssociationStore, AssocError, Policy, Value};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), AssocError> {
//!     let store = AssociationStore::new();
//!     let owner = Arc::new(());
//!     let key = AssociationKey::new(&owner, "hits");
//!
//!     // non-atomic writes return immediately
//!     store.set(&key, Value::new(10u64), Policy::NonAtomic)?;
//!     assert!(store.contains_key(&key, Policy::NonAtomic)?);
//!
//!     // wait for queued writes before relying on them
//!     store.flush()?;
//!     assert_eq!(store.get::<u64>(&key, Policy::NonAtomic)?, Some(10));
//!
//!     drop(owner);
//!     assert_eq!(store.sweep()?, 1);
//!     Ok(())
//! }
//! ```
//!
//! ### Error Handling
//!
//! ```rust
//! use sovran_assoc::{AssociationKey, AssociationStore, AssocError, Policy, Value};
//! use std::sync::Arc;
//!
//! let store = AssociationStore::new();
//! let owner = Arc::new(());
//! let key = AssociationKey::new(&owner, "buffer");
//!
//! // copy policies need a value that knows how to duplicate itself
//! match store.set(&key, Value::new(vec![0u8; 4]), Policy::CopyAtomic) {
//!     Ok(()) => println!("stored"),
//!     Err(AssocError::NotDuplicable { type_name }) => println!("{} can't be copied", type_name),
//!     Err(e) => println!("Other error: {}", e),
//! }
//!
//! // absence is not an error
//! assert_eq!(store.get::<Vec<u8>>(&key, Policy::CopyAtomic), Ok(None));
//! ```

mod any_value;
mod association;
mod config;
mod dispatch;
mod error;
mod key;
mod owner;
mod policy;
mod store;

pub use any_value::Value;
pub use association::Association;
pub use config::StoreConfig;
pub use error::AssocError;
pub use key::{hash_key, AssociationKey};
pub use owner::Owner;
pub use policy::{CopyPolicy, Policy, ReferencePolicy, ValuePolicy};
pub use store::AssociationStore;
