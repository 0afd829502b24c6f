//! Permission-scoped credential access and audit engine.
//!
//! Every operation takes an explicit [`Actor`] resolved by the authentication
//! layer; nothing in here reads ambient session state. Access decisions reduce
//! to [`access::is_allowed`] (admin bypass, otherwise the grant's matching
//! flag), and every mutation of a credential is paired with its audit row by
//! the storage backend inside one transaction.

pub mod access;
pub mod config;

mod actor;
mod credentials;
mod error;
mod groups;

pub use actor::Actor;
pub use credentials::{CredentialService, CredentialUpdate, NewCredential};
pub use error::VaultError;
pub use groups::{GroupDetail, GroupRegistry};
