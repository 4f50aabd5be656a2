//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: token validation, injects the `Actor`
//! 2. Audit logger: logs after auth, has the user id
//! 3. Role gate: per route group, after the shared stack

pub mod audit;
pub mod auth;
