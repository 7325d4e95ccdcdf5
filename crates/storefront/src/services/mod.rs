//! External collaborators of the payment core: receipt delivery and blob
//! storage.

pub mod blobs;
pub mod notifier;
