//! HTTP middleware stack.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod trace;

pub use rate_limit::RouteGroup;
