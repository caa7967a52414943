mod decision;
mod manager;
mod model;

pub use decision::{evaluate, Decision};
pub use manager::{RetryManager, RetryOutcome};
pub use model::{WorkflowJob, WorkflowRun, WorkflowStep};
