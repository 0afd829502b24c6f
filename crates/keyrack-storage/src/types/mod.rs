//! Type definitions for keyrack storage.

mod credentials;
mod grants;
mod groups;
mod ids;
mod roles;
mod users;

// Re-export all types from submodules
pub use credentials::*;
pub use grants::*;
pub use groups::*;
pub use ids::*;
pub use roles::*;
pub use users::*;
