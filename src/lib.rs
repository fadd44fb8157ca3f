#![deny(missing_docs)]

//! A bounded pool of consumer threads draining a shared job queue.
//!
//! Workers take entries from one unbounded FIFO channel and either run
//! them or, on a shutdown sentinel, exit. Shutdown is graceful: jobs
//! queued ahead of the sentinels and jobs already executing finish first.

mod command;
mod config;
mod error;
/// The consumer pool and the job abstraction it runs.
pub mod pool;

pub use command::{read_specs, CommandJob, CommandSpec, Tally};
pub use config::{parse_size, PoolConfig, SIZE_ENV_VAR};
pub use error::{PoolError, Result};
pub use pool::{Builder, ConsumerPool, Job, JobFailure, PoolState};
