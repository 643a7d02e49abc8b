//! Narrow interfaces to the collaborators the workflow relies on.
use super::error::WorkflowError;
use super::requisition::Requisition;
use super::types::{FacilityId, PeriodId, ProgramId, RequisitionId, UserId};

pub trait RequisitionRepository: Send + Sync {
    fn find_by_id(&self, id: &RequisitionId) -> anyhow::Result<Option<Requisition>>;

    /// Persist `requisition` if the stored copy still has the version it was
    /// read at, returning the stored copy with its new version.
    /// Fails with [`WorkflowError::ConcurrencyConflict`] otherwise.
    /// A new regular requisition for a facility, program and period that
    /// already has one is a validation error, decided atomically.
    fn save(&self, requisition: &Requisition) -> Result<Requisition, WorkflowError>;

    fn search(
        &self,
        facility: &FacilityId,
        program: &ProgramId,
        period: &PeriodId,
    ) -> anyhow::Result<Vec<Requisition>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionResult {
    Granted,
    Denied(String),
}

impl PermissionResult {
    pub fn no_permission(message: &str) -> Self {
        PermissionResult::Denied(message.to_owned())
    }
    pub fn into_result(self) -> Result<(), WorkflowError> {
        match self {
            PermissionResult::Granted => Ok(()),
            PermissionResult::Denied(message) => Err(WorkflowError::Permission(message)),
        }
    }
}

/// Rights of the current user. Checked before anything is loaded or changed.
pub trait PermissionService: Send + Sync {
    fn can_init_or_authorize(&self, program: &ProgramId, facility: &FacilityId)
    -> PermissionResult;
    fn can_update(&self, id: &RequisitionId) -> PermissionResult;
    fn can_submit(&self, id: &RequisitionId) -> PermissionResult;
    fn can_authorize(&self, id: &RequisitionId) -> PermissionResult;
    fn can_approve(&self, id: &RequisitionId) -> PermissionResult;
    fn can_release(&self, id: &RequisitionId) -> PermissionResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

pub trait AuthenticationHelper: Send + Sync {
    fn current_user(&self) -> anyhow::Result<User>;
}

/// Told about every status change. Best effort: errors are logged by the
/// caller and never undo the change.
pub trait StatusNotifier: Send + Sync {
    fn notify_status_changed(&self, requisition: &Requisition) -> anyhow::Result<()>;
}

/// Notifier that only writes the change to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn notify_status_changed(&self, requisition: &Requisition) -> anyhow::Result<()> {
        tracing::info!(
            requisition = %requisition.id(),
            status = %requisition.status(),
            "requisition status changed"
        );
        Ok(())
    }
}
