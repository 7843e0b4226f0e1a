/// Control surface of an in-flight transfer.
///
/// Calls must return promptly and must not call back into the session
/// that owns the handle.
pub trait TransferHandle: Send + Sync {
    fn suspend(&self);
    fn resume(&self);
    fn cancel(&self);
}

/// Notification sent by a transfer handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Bytes completed so far out of `total`.
    Progress { completed: u64, total: u64 },
    /// The transfer ended. Sent at most once.
    Finished(TransferOutcome),
}

/// How a transfer ended, as reported by the handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// The remote side answered. `body` is the parsed JSON response, or the
    /// raw text as a JSON string when it is not JSON.
    Response {
        status: u16,
        body: serde_json::Value,
    },
    /// The transport failed before a response arrived.
    Failed(String),
}

impl TransferOutcome {
    /// `true` for a 2xx response.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Response { status, .. } if (200..300).contains(status))
    }
}
