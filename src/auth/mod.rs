//! Identity and credentials: password hashing, bearer tokens, accounts.

pub mod identity;
pub mod password;
pub mod token;

pub use identity::*;
pub use token::{Claims, TokenError, TokenSigner};
