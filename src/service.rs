//! Service layer API for requisition workflow operations
//!
//! Every operation runs the same sequence: permission check, load, validate,
//! transition, save, notify. Nothing is written unless every step before the
//! save succeeded, and a failed notification never undoes a saved change.
use super::column::{APPROVED_QUANTITY, ColumnCatalog, ColumnName};
use super::error::{ValidationErrors, WorkflowError};
use super::hierarchy::{ApprovalHierarchy, SupervisoryNodeDirectory};
use super::ports::{
    AuthenticationHelper, PermissionService, RequisitionRepository, StatusNotifier, User,
};
use super::requisition::{Requisition, RequisitionBuilder, RequisitionStatus};
use super::requisition_validator::{RequisitionValidator, ValidationStage};
use super::template::{RequisitionTemplate, TemplateSource};
use super::template_validator::RequisitionTemplateValidator;
use super::types::RequisitionId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the service talks to.
pub struct Collaborators {
    pub repository: Arc<dyn RequisitionRepository>,
    pub templates: Arc<dyn TemplateSource>,
    pub permissions: Arc<dyn PermissionService>,
    pub hierarchy: Arc<dyn SupervisoryNodeDirectory>,
    pub authentication: Arc<dyn AuthenticationHelper>,
    pub notifier: Arc<dyn StatusNotifier>,
}

pub struct RequisitionService {
    repository: Arc<dyn RequisitionRepository>,
    templates: Arc<dyn TemplateSource>,
    permissions: Arc<dyn PermissionService>,
    hierarchy: Arc<dyn SupervisoryNodeDirectory>,
    authentication: Arc<dyn AuthenticationHelper>,
    notifier: Arc<dyn StatusNotifier>,
    template_validator: RequisitionTemplateValidator,
}

impl RequisitionService {
    pub fn new(collaborators: Collaborators, catalog: Arc<ColumnCatalog>) -> Self {
        Self {
            repository: collaborators.repository,
            templates: collaborators.templates,
            permissions: collaborators.permissions,
            hierarchy: collaborators.hierarchy,
            authentication: collaborators.authentication,
            notifier: collaborators.notifier,
            template_validator: RequisitionTemplateValidator::new(catalog),
        }
    }

    /// Load requisition, a missing one is a validation error
    fn load(&self, id: &RequisitionId) -> Result<Requisition, WorkflowError> {
        self.repository.find_by_id(id)?.ok_or_else(|| {
            WorkflowError::validation("id", format!("requisition {id} not found"))
        })
    }

    fn load_template(
        &self,
        requisition: &Requisition,
    ) -> Result<Arc<RequisitionTemplate>, WorkflowError> {
        let id = requisition.template_id();
        self.templates.find_template(id)?.ok_or_else(|| {
            WorkflowError::validation("template", format!("requisition template {id} not found"))
        })
    }

    fn current_user(&self) -> Result<User, WorkflowError> {
        Ok(self.authentication.current_user()?)
    }

    /// `calculated` errors plus the template rules and the line item rules
    /// for `stage`, as one error.
    fn validate(
        &self,
        requisition: &Requisition,
        template: &RequisitionTemplate,
        stage: ValidationStage,
        calculated: ValidationErrors,
    ) -> Result<(), WorkflowError> {
        let mut errors = calculated;
        if stage != ValidationStage::Draft {
            errors.extend(self.template_validator.validate(template));
        }
        errors.extend(RequisitionValidator::validate(requisition, template, stage));

        if !errors.is_empty() {
            debug!(requisition = %requisition.id(), %errors, "requisition rejected by validation");
        }
        errors.into_result()
    }

    fn save_and_notify(&self, requisition: &Requisition) -> Result<Requisition, WorkflowError> {
        let saved = self.repository.save(requisition)?;
        info!(
            requisition = %saved.id(),
            status = %saved.status(),
            version = saved.version(),
            "requisition status changed"
        );

        if let Err(err) = self.notifier.notify_status_changed(&saved) {
            warn!(requisition = %saved.id(), error = %err, "failed to notify status change");
        }
        Ok(saved)
    }

    /// Create a new requisition in INITIATED status
    pub fn initiate(&self, draft: RequisitionBuilder) -> Result<Requisition, WorkflowError> {
        if let (Some(program), Some(facility)) = (draft.program_id(), draft.facility_id()) {
            self.permissions
                .can_init_or_authorize(program, facility)
                .into_result()?;
        }

        // only one regular requisition per facility, program and period
        if let (Some(program), Some(facility), Some(period)) = (
            draft.program_id(),
            draft.facility_id(),
            draft.processing_period_id(),
        ) {
            if !draft.is_emergency()
                && self
                    .repository
                    .search(facility, program, period)?
                    .iter()
                    .any(|r| !r.is_emergency())
            {
                return Err(WorkflowError::validation(
                    "processingPeriodId",
                    format!("a requisition for period {period} already exists"),
                ));
            }
        }

        if let Some(template) = draft.template_id() {
            if self.templates.find_template(template)?.is_none() {
                return Err(WorkflowError::validation(
                    "template",
                    format!("requisition template {template} not found"),
                ));
            }
        }

        let user = self.current_user()?;
        let requisition = draft.initiate(RequisitionId::generate()?, &user.id)?;
        self.save_and_notify(&requisition)
    }

    /// Replace the line item values of an initiated requisition
    pub fn update(
        &self,
        id: &RequisitionId,
        payload: Requisition,
    ) -> Result<Requisition, WorkflowError> {
        if payload.id() != id {
            return Err(WorkflowError::validation(
                "id",
                format!(
                    "requisition id {} does not match the id in the request {id}",
                    payload.id()
                ),
            ));
        }
        self.permissions.can_update(id).into_result()?;

        let stored = self.load(id)?;
        if payload.version() != stored.version() {
            return Err(WorkflowError::ConcurrencyConflict {
                id: id.clone(),
                expected: payload.version(),
                found: stored.version(),
            });
        }
        if !stored.status().is_editable() {
            return Err(WorkflowError::illegal("update", stored.status()));
        }

        let template = self.load_template(&stored)?;
        // approved quantities belong to the approval step, never to a draft
        let mut ignored = template.non_editable_columns();
        ignored.push(ColumnName::new(APPROVED_QUANTITY)?);

        let mut updated = stored;
        updated.update_from(&payload, &ignored, true)?;
        let calculated = updated.calculate(&template);
        self.validate(&updated, &template, ValidationStage::Draft, calculated)?;

        let saved = self.repository.save(&updated)?;
        info!(requisition = %saved.id(), version = saved.version(), "requisition updated");
        Ok(saved)
    }

    /// Submit an initiated requisition
    pub fn submit(&self, id: &RequisitionId) -> Result<Requisition, WorkflowError> {
        self.permissions.can_submit(id).into_result()?;

        let mut requisition = self.load(id)?;
        if requisition.status() != RequisitionStatus::Initiated {
            return Err(WorkflowError::illegal("submit", requisition.status()));
        }
        let template = self.load_template(&requisition)?;

        let mut prepared = requisition.clone();
        let calculated = prepared.calculate(&template);
        self.validate(&prepared, &template, ValidationStage::Submit, calculated)?;

        let user = self.current_user()?;
        requisition.submit(&template, &[], &user.id)?;
        self.save_and_notify(&requisition)
    }

    /// Authorize a submitted requisition and route it to its first approver
    pub fn authorize(&self, id: &RequisitionId) -> Result<Requisition, WorkflowError> {
        self.permissions.can_authorize(id).into_result()?;

        let mut requisition = self.load(id)?;
        if requisition.status() != RequisitionStatus::Submitted {
            return Err(WorkflowError::illegal("authorize", requisition.status()));
        }
        let template = self.load_template(&requisition)?;

        let mut prepared = requisition.clone();
        let calculated = prepared.calculate(&template);
        self.validate(&prepared, &template, ValidationStage::Authorize, calculated)?;

        let node = ApprovalHierarchy::new(self.hierarchy.as_ref())
            .resolve_initial(requisition.program_id(), requisition.facility_id())?;
        if node.is_none() {
            debug!(requisition = %id, "no supervisory node, requisition needs a single approval");
        }

        let user = self.current_user()?;
        requisition.authorize(&template, node, &user.id)?;
        self.save_and_notify(&requisition)
    }

    /// Approve at the current supervisory node. Moves one level up the
    /// hierarchy, or finally approves when the node has no parent.
    pub fn approve(&self, id: &RequisitionId) -> Result<Requisition, WorkflowError> {
        self.permissions.can_approve(id).into_result()?;

        let mut requisition = self.load(id)?;
        if !requisition.is_approvable() {
            return Err(WorkflowError::illegal("approve", requisition.status()));
        }

        // resolved here, never taken from the caller
        let parent = ApprovalHierarchy::new(self.hierarchy.as_ref())
            .resolve_parent(requisition.supervisory_node_id())?;

        let user = self.current_user()?;
        requisition.approve(parent, &user.id)?;
        self.save_and_notify(&requisition)
    }

    /// Send an authorized requisition back to the facility
    pub fn reject(&self, id: &RequisitionId) -> Result<Requisition, WorkflowError> {
        self.permissions.can_approve(id).into_result()?;

        let mut requisition = self.load(id)?;
        if !requisition.is_approvable() {
            return Err(WorkflowError::illegal("reject", requisition.status()));
        }

        let user = self.current_user()?;
        requisition.reject(&user.id)?;
        self.save_and_notify(&requisition)
    }

    /// Convert an approved requisition into an order
    pub fn release(&self, id: &RequisitionId) -> Result<Requisition, WorkflowError> {
        self.permissions.can_release(id).into_result()?;

        let mut requisition = self.load(id)?;
        let user = self.current_user()?;
        requisition.release(&user.id)?;
        self.save_and_notify(&requisition)
    }

    /// Check a template against the catalog and the column dependency rules
    pub fn validate_template(&self, template: &RequisitionTemplate) -> ValidationErrors {
        self.template_validator.validate(template)
    }
}
