//! Store trait definitions

use clockwarden_api::{CredentialRecord, PunchEvent};
use clockwarden_util::LocalUser;

use crate::{AuditEvent, StoreResult};

/// Raw punch and credential persistence. Rules over the data live in the core.
pub trait PunchStore: Send + Sync {
    /// Append one punch event
    fn append_punch(&self, event: &PunchEvent) -> StoreResult<()>;

    /// All punch events for a user, in append order
    fn punches_for(&self, local_user: &LocalUser) -> StoreResult<Vec<PunchEvent>>;

    /// Append a credential capture
    fn append_credentials(&self, record: &CredentialRecord) -> StoreResult<()>;

    /// Most recently appended credential capture for a user
    fn last_credentials(&self, local_user: &LocalUser) -> StoreResult<Option<CredentialRecord>>;
}

/// Audit trail
pub trait AuditStore: Send + Sync {
    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
