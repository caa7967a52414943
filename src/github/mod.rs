mod client;
mod types;

pub use client::{GhClient, GhProcess, GhRunner, RetryMode};
pub use types::{JobRecord, RunRecord, StepRecord};

#[cfg(test)]
pub(crate) use client::testing;
