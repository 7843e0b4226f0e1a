//! Execution lease seam.
//!
//! Some hosts only keep a process alive while it declares work in progress.
//! The server asks a [`LeaseProvider`] for a lease after binding and gives
//! it back when it stops.

/// Error type lease providers report failures with.
pub type LeaseError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A granted permission to keep running.
pub trait ExecutionLease: Send {
    /// Returns the lease to the host.
    fn release(self: Box<Self>);
}

/// Source of execution leases.
pub trait LeaseProvider: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn ExecutionLease>, LeaseError>;
}

/// Provider for hosts with no lease facility. Always grants.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLeaseProvider;

struct NoopLease;

impl ExecutionLease for NoopLease {
    fn release(self: Box<Self>) {}
}

impl LeaseProvider for NoopLeaseProvider {
    fn acquire(&self) -> Result<Box<dyn ExecutionLease>, LeaseError> {
        Ok(Box::new(NoopLease))
    }
}
