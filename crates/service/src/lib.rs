//! Service layer behind the HTTP routes.
//! - `storage`: key-value backends for the record collections.
//! - `records`: bulk save-all / load-all over the four collections.
//! - `invoices`: PDF invoice files on local disk.

pub mod errors;
pub mod names;
pub mod runtime;
pub mod storage;
pub mod records;
pub mod invoices;
#[cfg(test)]
pub mod test_support;
