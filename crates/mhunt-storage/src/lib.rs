//! Persistence, provider transport and pacing utilities for Mission Hunter.

mod archive;
mod http;
mod memory;
mod postgres;
mod store;
mod throttle;

pub use archive::ResponseArchive;
pub use http::{
    classify_reqwest_error, classify_status, BackoffPolicy, ProviderHttp, ProviderHttpConfig,
    RetryDisposition, TransportError,
};
pub use memory::MemoryHuntStore;
pub use postgres::{PgHuntStore, PgHuntTransaction};
pub use store::{HuntStore, HuntTransaction, StoreError};
pub use throttle::{FixedIntervalGate, RateLimiter, SimpleTokenBucket};

pub const CRATE_NAME: &str = "mhunt-storage";
