//! Rate-limit-aware connection pool for the GitHub REST API
//!
//! Spreads calls across several personal access tokens so an aggregate
//! workload can run far past a single token's hourly quota. The pool tracks
//! each token's quota from response headers, never hands out a token with
//! nothing left, bounds the number of concurrent calls, and brings exhausted
//! tokens back once GitHub confirms their window has reset.
//!
//! Request lifecycle:
//! 1. Caller asks for a resource through [`GitHubPool::repos`] and friends
//! 2. [`AdmissionController`] waits for a free concurrency slot and picks a
//!    random token with quota left
//! 3. [`Executor`] runs the call, records `x-ratelimit-*` headers on the slot
//! 4. Quota hit zero → [`CooldownScheduler`] sleeps until reset, then checks
//!    `GET /rate_limit` before re-admitting the token
//! 5. Any failure → retried until it succeeds (default policy)
//! 6. Paginated collections fetch page 1, then the remaining pages in parallel

pub mod admission;
pub mod cooldown;
pub mod error;
pub mod executor;
pub mod pagination;
pub mod pool;
pub mod proxy;
pub mod slot;

pub use admission::{AdmissionController, SlotLease};
pub use cooldown::CooldownScheduler;
pub use error::{Error, Result};
pub use executor::{Executor, MaxAttempts, RetryForever, RetryPolicy};
pub use pagination::{Collection, PageSource};
pub use pool::{GitHubPool, PoolOptions};
pub use proxy::{RepoName, Repos, Search, Users, is_valid_name};
pub use slot::{Quota, Slot, TokenStatus};
