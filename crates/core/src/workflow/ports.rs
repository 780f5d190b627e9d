//! Port interfaces for request persistence
//!
//! A request, its work orders and its history are written together through
//! [`RequestStore::commit`], which is the single unit of work for every
//! action.

use async_trait::async_trait;
use servicedesk_domain::{HistoryEntry, RequestId, Result, ServiceRequest, UserId};

/// Everything one accepted action writes, applied atomically.
#[derive(Debug, Clone)]
pub struct RequestCommit {
    /// The mutated request including its work orders.
    pub request: ServiceRequest,
    /// Version read when the action started; a mismatch inside the
    /// transaction fails with `ConcurrentModification`.
    pub expected_version: u64,
    pub history: Vec<HistoryEntry>,
    /// Replacement request created by a rejection.
    pub spawned: Option<ServiceRequest>,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: &ServiceRequest) -> Result<()>;

    /// Load a request with its work orders.
    async fn load(&self, id: RequestId) -> Result<Option<ServiceRequest>>;

    /// Apply a commit in one transaction and return the stored version.
    ///
    /// Implementations re-read the stored version inside the transaction,
    /// fail with `ConcurrentModification` if it moved, and write nothing on
    /// any error.
    async fn commit(&self, commit: RequestCommit) -> Result<u64>;

    /// History of a request in append order.
    async fn history(&self, id: RequestId) -> Result<Vec<HistoryEntry>>;

    /// Append a standalone entry outside a commit.
    async fn append_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// Requests that are not done and carry an SLA policy.
    async fn list_open_with_sla(&self) -> Result<Vec<RequestId>>;

    /// Open requests currently assigned to `technician_id`.
    async fn count_active_for_technician(&self, technician_id: UserId) -> Result<usize>;

    /// Delete a request together with its work orders and history.
    async fn delete(&self, id: RequestId) -> Result<()>;
}
