pub mod middleware;

#[cfg(test)]
mod tests;

pub use middleware::{access_guard_middleware, AccessGuard, AuthDecision};
