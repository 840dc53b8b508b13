//! Key-value backends for the record collections.
//!
//! All backends implement [`kv_store::KvStore`]; the server picks one at
//! startup and hands it to the records service as a trait object.

pub mod kv_store;
pub mod file_kv_store;
pub mod memory_kv_store;
pub mod replit_kv_store;

pub use file_kv_store::FileKvStore;
pub use kv_store::KvStore;
pub use memory_kv_store::MemoryKvStore;
pub use replit_kv_store::ReplitKvStore;
