//! `kardex-auth` — closed role and permission sets for warehouse users.
//!
//! Authentication itself lives in the service layer; this crate only gives it
//! typed roles that are validated once, when a value is constructed.

pub mod permissions;
pub mod roles;

pub use permissions::Permission;
pub use roles::{Role, RoleError, UserAccount};
