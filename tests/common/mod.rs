//! Fakes and fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use requisition_workflow::{
    Collaborators, Requisition, RequisitionService, RequisitionStatus, WorkflowError,
    column::ColumnCatalog,
    hierarchy::{InMemoryHierarchy, SupervisoryNode},
    ports::{
        AuthenticationHelper, PermissionResult, PermissionService, RequisitionRepository,
        StatusNotifier, User,
    },
    requisition::LineItem,
    store::SledRequisitionRepository,
    template::{RequisitionTemplate, TemplateRegistry},
    types::*,
};
use tempfile::TempDir;

pub const TEMPLATE: &str = "template_standard";
pub const PROGRAM: &str = "program_family_planning";
pub const UNSUPERVISED_PROGRAM: &str = "program_essential_meds";
pub const FACILITY: &str = "facility_comfort_health_clinic";

/// Grants everything except the listed operations.
#[derive(Debug, Default)]
pub struct FakePermissions {
    denied: Vec<&'static str>,
}

impl FakePermissions {
    pub fn denying(denied: &[&'static str]) -> Self {
        Self {
            denied: denied.to_vec(),
        }
    }
    fn check(&self, operation: &str) -> PermissionResult {
        if self.denied.contains(&operation) {
            PermissionResult::no_permission(&format!("user may not {operation}"))
        } else {
            PermissionResult::Granted
        }
    }
}

impl PermissionService for FakePermissions {
    fn can_init_or_authorize(&self, _: &ProgramId, _: &FacilityId) -> PermissionResult {
        self.check("initiate")
    }
    fn can_update(&self, _: &RequisitionId) -> PermissionResult {
        self.check("update")
    }
    fn can_submit(&self, _: &RequisitionId) -> PermissionResult {
        self.check("submit")
    }
    fn can_authorize(&self, _: &RequisitionId) -> PermissionResult {
        self.check("authorize")
    }
    fn can_approve(&self, _: &RequisitionId) -> PermissionResult {
        self.check("approve")
    }
    fn can_release(&self, _: &RequisitionId) -> PermissionResult {
        self.check("release")
    }
}

pub struct FixedUser(pub User);

impl AuthenticationHelper for FixedUser {
    fn current_user(&self) -> anyhow::Result<User> {
        Ok(self.0.clone())
    }
}

/// Records every notification, optionally failing each one afterwards.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub notified: Mutex<Vec<(RequisitionId, RequisitionStatus)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.notified.lock().map(|n| n.len()).unwrap_or_default()
    }
    pub fn last_status(&self) -> Option<RequisitionStatus> {
        self.notified.lock().ok()?.last().map(|(_, status)| *status)
    }
}

impl StatusNotifier for RecordingNotifier {
    fn notify_status_changed(&self, requisition: &Requisition) -> anyhow::Result<()> {
        if let Ok(mut notified) = self.notified.lock() {
            notified.push((requisition.id().clone(), requisition.status()));
        }
        if self.fail {
            anyhow::bail!("notification service unavailable");
        }
        Ok(())
    }
}

/// sled store that counts the writes that went through.
pub struct CountingRepository {
    inner: SledRequisitionRepository,
    saves: AtomicUsize,
}

impl CountingRepository {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl RequisitionRepository for CountingRepository {
    fn find_by_id(&self, id: &RequisitionId) -> anyhow::Result<Option<Requisition>> {
        self.inner.find_by_id(id)
    }
    fn save(&self, requisition: &Requisition) -> Result<Requisition, WorkflowError> {
        let saved = self.inner.save(requisition)?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(saved)
    }
    fn search(
        &self,
        facility: &FacilityId,
        program: &ProgramId,
        period: &PeriodId,
    ) -> anyhow::Result<Vec<Requisition>> {
        self.inner.search(facility, program, period)
    }
}

pub struct Harness {
    pub service: RequisitionService,
    pub repository: Arc<CountingRepository>,
    pub notifier: Arc<RecordingNotifier>,
    // keeps the database directory alive for the test
    _dir: TempDir,
}

pub fn standard_template() -> RequisitionTemplate {
    let catalog = ColumnCatalog::standard();
    let names: Vec<String> = catalog.iter().map(|c| c.name().to_string()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    RequisitionTemplate::from_catalog(TemplateId::new(TEMPLATE), &catalog, &names)
        .expect("standard columns form a template")
}

/// district -> region -> national, the district supervising [`PROGRAM`] at [`FACILITY`].
pub fn three_level_hierarchy() -> InMemoryHierarchy {
    InMemoryHierarchy::new([
        SupervisoryNode::new(NodeId::new("node_district"), "SN-DISTRICT")
            .set_parent(NodeId::new("node_region"))
            .set_scope(FacilityId::new(FACILITY), vec![ProgramId::new(PROGRAM)]),
        SupervisoryNode::new(NodeId::new("node_region"), "SN-REGION")
            .set_parent(NodeId::new("node_national")),
        SupervisoryNode::new(NodeId::new("node_national"), "SN-NATIONAL"),
    ])
    .expect("valid hierarchy")
}

pub fn harness_with(permissions: FakePermissions, notifier: RecordingNotifier) -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = Arc::new(sled::open(dir.path().join("requisitions.db")).expect("open sled"));
    let repository = Arc::new(CountingRepository {
        inner: SledRequisitionRepository::new(db).expect("open tree"),
        saves: AtomicUsize::new(0),
    });

    let mut templates = TemplateRegistry::new();
    templates.register(standard_template());
    let notifier = Arc::new(notifier);

    let service = RequisitionService::new(
        Collaborators {
            repository: repository.clone(),
            templates: Arc::new(templates),
            permissions: Arc::new(permissions),
            hierarchy: Arc::new(three_level_hierarchy()),
            authentication: Arc::new(FixedUser(User {
                id: UserId::new("user_administrator"),
                username: "administrator".into(),
            })),
            notifier: notifier.clone(),
        },
        Arc::new(ColumnCatalog::standard()),
    );

    Harness {
        service,
        repository,
        notifier,
        _dir: dir,
    }
}

pub fn harness() -> Harness {
    harness_with(FakePermissions::default(), RecordingNotifier::default())
}

/// A line item that passes submit and authorize validation on the standard template.
pub fn complete_line_item(orderable: &str) -> LineItem {
    LineItem {
        beginning_balance: Some(10),
        total_received_quantity: Some(20),
        total_consumed_quantity: Some(15),
        total_stockout_days: Some(0),
        stock_on_hand: Some(15),
        requested_quantity: Some(40),
        requested_quantity_explanation: Some("rainy season".into()),
        ..LineItem::new(OrderableId::new(orderable))
    }
}

pub fn draft(program: &str, period: &str) -> requisition_workflow::requisition::RequisitionBuilder {
    Requisition::builder()
        .set_program(ProgramId::new(program))
        .set_facility(FacilityId::new(FACILITY))
        .set_processing_period(PeriodId::new(period))
        .set_template(TemplateId::new(TEMPLATE))
        .add_line_item(complete_line_item("orderable_condoms"))
        .add_line_item(complete_line_item("orderable_implants"))
}
