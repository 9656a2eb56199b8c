/// Availability checking: the scheduler fans site checks out to the
/// work queue, the checker executes them and publishes the outcome to
/// the broker. Neither side touches the event store; persistence is
/// the transfer pipeline's job.
pub mod checker;
pub mod scheduler;

pub use checker::Checker;
pub use scheduler::Scheduler;
