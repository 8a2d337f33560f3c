// # Secret Store Implementations
//
// Built-in implementations of the SecretStore trait. The HTTP object store
// lives in the `ddns-secret-http` crate.

pub mod file;
pub mod memory;

pub use file::{FileSecretStore, FileSecretStoreFactory};
pub use memory::{MemorySecretStore, MemorySecretStoreFactory};
