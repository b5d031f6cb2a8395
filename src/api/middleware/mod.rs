//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter: reject early, save resources
//! 2. Auth: bearer token to principal
//! 3. Role guard: patient or doctor routes
//! 4. Audit logger: logs after auth, has the principal

pub mod audit;
pub mod auth;
pub mod rate;
