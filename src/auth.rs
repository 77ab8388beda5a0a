//! Credential material, client assertion signing, identifiers, scopes, and token models.

pub mod assertion;
pub mod credential;
pub mod id;
pub mod scope;
pub mod token;

pub use assertion::*;
pub use credential::*;
pub use id::*;
pub use scope::*;
pub use token::{cached::*, secret::*};
