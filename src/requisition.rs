//! The requisition aggregate and its status transitions.
//!
//! Transitions work on a copy and only replace `self` once every check has
//! passed, so a failed call never leaves a half-applied change behind.
use super::column::{
    ADJUSTED_CONSUMPTION, APPROVED_QUANTITY, BEGINNING_BALANCE, ColumnName, REMARKS,
    REQUESTED_QUANTITY, REQUESTED_QUANTITY_EXPLANATION, SKIPPED, STOCK_ON_HAND,
    TOTAL_CONSUMED_QUANTITY, TOTAL_RECEIVED_QUANTITY, TOTAL_STOCKOUT_DAYS,
};
use super::error::{ValidationErrors, WorkflowError};
use super::requisition_validator::{
    REQUISITION_LINE_ITEMS, RequisitionValidator, ValidationStage,
};
use super::template::RequisitionTemplate;
use super::types::{
    FacilityId, NodeId, OrderableId, PeriodId, ProgramId, RequisitionId, TemplateId, TimeStamp,
    UserId,
};
use super::utils::digest_cbor;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;

pub const DAYS_PER_MONTH: i64 = 30;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequisitionStatus {
    #[n(0)]
    Initiated,
    #[n(1)]
    Submitted,
    #[n(2)]
    Authorized,
    #[n(3)]
    Approved,
    #[n(4)]
    Rejected,
    #[n(5)]
    Released,
}

impl RequisitionStatus {
    /// Line items may only be changed while initiated.
    pub fn is_editable(&self) -> bool {
        matches!(self, RequisitionStatus::Initiated)
    }
    pub fn is_approvable(&self) -> bool {
        matches!(self, RequisitionStatus::Authorized)
    }
}

impl fmt::Display for RequisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequisitionStatus::Initiated => "INITIATED",
            RequisitionStatus::Submitted => "SUBMITTED",
            RequisitionStatus::Authorized => "AUTHORIZED",
            RequisitionStatus::Approved => "APPROVED",
            RequisitionStatus::Rejected => "REJECTED",
            RequisitionStatus::Released => "RELEASED",
        };
        f.write_str(name)
    }
}

/// Value of a line item column, as seen by the template rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnValue<'a> {
    Quantity(Option<i64>),
    Text(Option<&'a str>),
    Flag(bool),
}

impl ColumnValue<'_> {
    pub fn is_filled(&self) -> bool {
        match self {
            ColumnValue::Quantity(value) => value.is_some(),
            ColumnValue::Text(value) => value.is_some_and(|v| !v.trim().is_empty()),
            ColumnValue::Flag(_) => true,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    #[n(0)]
    pub orderable_id: OrderableId,
    #[n(1)]
    pub beginning_balance: Option<i64>,
    #[n(2)]
    pub total_received_quantity: Option<i64>,
    #[n(3)]
    pub total_consumed_quantity: Option<i64>,
    #[n(4)]
    pub total_stockout_days: Option<i64>,
    #[n(5)]
    pub stock_on_hand: Option<i64>,
    #[n(6)]
    pub requested_quantity: Option<i64>,
    #[n(7)]
    pub requested_quantity_explanation: Option<String>,
    #[n(8)]
    pub adjusted_consumption: Option<i64>, // calculated when the template says so
    #[n(9)]
    pub approved_quantity: Option<i64>,
    #[n(10)]
    pub remarks: Option<String>,
    #[n(11)]
    pub skipped: bool,
}

impl LineItem {
    pub fn new(orderable_id: OrderableId) -> Self {
        Self {
            orderable_id,
            beginning_balance: None,
            total_received_quantity: None,
            total_consumed_quantity: None,
            total_stockout_days: None,
            stock_on_hand: None,
            requested_quantity: None,
            requested_quantity_explanation: None,
            adjusted_consumption: None,
            approved_quantity: None,
            remarks: None,
            skipped: false,
        }
    }

    /// `None` when the column is not backed by a line item field
    /// (e.g. reference data such as the product name).
    pub fn value(&self, column: &str) -> Option<ColumnValue<'_>> {
        let value = match column {
            BEGINNING_BALANCE => ColumnValue::Quantity(self.beginning_balance),
            TOTAL_RECEIVED_QUANTITY => ColumnValue::Quantity(self.total_received_quantity),
            TOTAL_CONSUMED_QUANTITY => ColumnValue::Quantity(self.total_consumed_quantity),
            TOTAL_STOCKOUT_DAYS => ColumnValue::Quantity(self.total_stockout_days),
            STOCK_ON_HAND => ColumnValue::Quantity(self.stock_on_hand),
            REQUESTED_QUANTITY => ColumnValue::Quantity(self.requested_quantity),
            REQUESTED_QUANTITY_EXPLANATION => {
                ColumnValue::Text(self.requested_quantity_explanation.as_deref())
            }
            ADJUSTED_CONSUMPTION => ColumnValue::Quantity(self.adjusted_consumption),
            APPROVED_QUANTITY => ColumnValue::Quantity(self.approved_quantity),
            REMARKS => ColumnValue::Text(self.remarks.as_deref()),
            SKIPPED => ColumnValue::Flag(self.skipped),
            _ => return None,
        };
        Some(value)
    }

    /// Copy every user editable field from `other`, except the ignored columns.
    pub fn copy_from(&mut self, other: &LineItem, ignored: &[ColumnName]) {
        let copy = |name: &str| !ignored.iter().any(|c| c == name);

        if copy(BEGINNING_BALANCE) {
            self.beginning_balance = other.beginning_balance;
        }
        if copy(TOTAL_RECEIVED_QUANTITY) {
            self.total_received_quantity = other.total_received_quantity;
        }
        if copy(TOTAL_CONSUMED_QUANTITY) {
            self.total_consumed_quantity = other.total_consumed_quantity;
        }
        if copy(TOTAL_STOCKOUT_DAYS) {
            self.total_stockout_days = other.total_stockout_days;
        }
        if copy(STOCK_ON_HAND) {
            self.stock_on_hand = other.stock_on_hand;
        }
        if copy(REQUESTED_QUANTITY) {
            self.requested_quantity = other.requested_quantity;
        }
        if copy(REQUESTED_QUANTITY_EXPLANATION) {
            self.requested_quantity_explanation = other.requested_quantity_explanation.clone();
        }
        if copy(APPROVED_QUANTITY) {
            self.approved_quantity = other.approved_quantity;
        }
        if copy(REMARKS) {
            self.remarks = other.remarks.clone();
        }
        if copy(SKIPPED) {
            self.skipped = other.skipped;
        }
    }

    /// Fill the columns the template marks as calculated. Returns the
    /// columns whose value does not fit in an `i64`; those are left empty.
    pub fn calculate(
        &mut self,
        template: &RequisitionTemplate,
        months_in_period: u32,
    ) -> Vec<&'static str> {
        let mut overflowed = vec![];

        if template.is_column_calculated(TOTAL_CONSUMED_QUANTITY)
            && !template.is_column_calculated(STOCK_ON_HAND)
        {
            self.total_consumed_quantity = match (
                self.beginning_balance,
                self.total_received_quantity,
                self.stock_on_hand,
            ) {
                (Some(a), Some(b), Some(e)) => {
                    let consumed = a.checked_add(b).and_then(|v| v.checked_sub(e));
                    if consumed.is_none() {
                        overflowed.push(TOTAL_CONSUMED_QUANTITY);
                    }
                    consumed
                }
                _ => None,
            };
        }
        if template.is_column_calculated(STOCK_ON_HAND) {
            self.stock_on_hand = match (
                self.beginning_balance,
                self.total_received_quantity,
                self.total_consumed_quantity,
            ) {
                (Some(a), Some(b), Some(c)) => {
                    let on_hand = a.checked_add(b).and_then(|v| v.checked_sub(c));
                    if on_hand.is_none() {
                        overflowed.push(STOCK_ON_HAND);
                    }
                    on_hand
                }
                _ => None,
            };
        }
        if template.is_column_calculated(ADJUSTED_CONSUMPTION) {
            self.adjusted_consumption = match self.total_consumed_quantity {
                Some(consumed) => {
                    let adjusted = adjusted_consumption(
                        consumed,
                        self.total_stockout_days.unwrap_or(0),
                        months_in_period,
                    );
                    if adjusted.is_none() {
                        overflowed.push(ADJUSTED_CONSUMPTION);
                    }
                    adjusted
                }
                None => None,
            };
        }
        overflowed
    }
}

/// One line item per orderable.
fn duplicate_orderables(items: &[LineItem]) -> ValidationErrors {
    let mut seen = HashSet::new();
    let mut errors = ValidationErrors::new();
    for (index, item) in items.iter().enumerate() {
        if !seen.insert(&item.orderable_id) {
            errors.reject(
                format!("{REQUISITION_LINE_ITEMS}[{index}].orderableId"),
                format!("orderable {} appears more than once", item.orderable_id),
            );
        }
    }
    errors
}

/// Consumption scaled up to cover the days the product was out of stock,
/// rounded up. `None` when the result does not fit in an `i64`.
pub fn adjusted_consumption(
    consumed: i64,
    stockout_days: i64,
    months_in_period: u32,
) -> Option<i64> {
    let days = i64::from(months_in_period).checked_mul(DAYS_PER_MONTH)?;
    let non_stockout_days = days.checked_sub(stockout_days)?;
    if non_stockout_days <= 0 || consumed <= 0 {
        return Some(consumed);
    }
    let scaled = consumed
        .checked_mul(days)?
        .checked_add(non_stockout_days - 1)?;
    Some(scaled / non_stockout_days)
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    #[n(0)]
    Initiated,
    #[n(1)]
    Submitted,
    #[n(2)]
    Authorized {
        #[n(0)]
        node: Option<NodeId>,
    },
    #[n(3)]
    Approved {
        #[n(0)]
        node: Option<NodeId>, // the node that approved
        #[n(1)]
        final_approval: bool,
    },
    #[n(4)]
    Rejected,
    #[n(5)]
    Released,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    #[n(0)]
    pub event: StatusEvent,
    #[n(1)]
    pub author: UserId,
    #[n(2)]
    pub timestamp: TimeStamp<Utc>,
    #[n(3)]
    pub details_hash: String, // sha256 of the line items at the time of the change
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Requisition {
    #[n(0)]
    id: RequisitionId,
    #[n(1)]
    status: RequisitionStatus,
    #[n(2)]
    template_id: TemplateId,
    #[n(3)]
    facility_id: FacilityId,
    #[n(4)]
    program_id: ProgramId,
    #[n(5)]
    processing_period_id: PeriodId,
    #[n(6)]
    emergency: bool,
    #[n(7)]
    months_in_period: u32,
    #[n(8)]
    supervisory_node_id: Option<NodeId>,
    #[n(9)]
    line_items: Vec<LineItem>,
    #[n(10)]
    status_changes: Vec<StatusChange>,
    #[n(11)]
    draft_status_message: Option<String>,
    #[n(12)]
    version: u64,
    #[n(13)]
    modified_date: TimeStamp<Utc>,
}

// Also used for constructing new requisitions before they are initiated
#[derive(Debug, Default)]
pub struct RequisitionBuilder {
    program_id: Option<ProgramId>,
    facility_id: Option<FacilityId>,
    processing_period_id: Option<PeriodId>,
    template_id: Option<TemplateId>,
    emergency: bool,
    months_in_period: u32,
    line_items: Vec<LineItem>,
}

impl RequisitionBuilder {
    pub fn new() -> Self {
        Self {
            months_in_period: 1,
            ..Default::default()
        }
    }
    pub fn set_program(mut self, program: ProgramId) -> Self {
        self.program_id = Some(program);
        self
    }
    pub fn set_facility(mut self, facility: FacilityId) -> Self {
        self.facility_id = Some(facility);
        self
    }
    pub fn set_processing_period(mut self, period: PeriodId) -> Self {
        self.processing_period_id = Some(period);
        self
    }
    pub fn set_template(mut self, template: TemplateId) -> Self {
        self.template_id = Some(template);
        self
    }
    pub fn set_emergency(mut self, emergency: bool) -> Self {
        self.emergency = emergency;
        self
    }
    pub fn set_months_in_period(mut self, months: u32) -> Self {
        self.months_in_period = months;
        self
    }
    pub fn add_line_item(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    pub fn program_id(&self) -> Option<&ProgramId> {
        self.program_id.as_ref()
    }
    pub fn facility_id(&self) -> Option<&FacilityId> {
        self.facility_id.as_ref()
    }
    pub fn processing_period_id(&self) -> Option<&PeriodId> {
        self.processing_period_id.as_ref()
    }
    pub fn template_id(&self) -> Option<&TemplateId> {
        self.template_id.as_ref()
    }
    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// Checks every header field and reports all that are missing at once.
    pub fn initiate(
        self,
        id: RequisitionId,
        initiator: &UserId,
    ) -> Result<Requisition, WorkflowError> {
        let mut errors = ValidationErrors::new();
        if self.program_id.is_none() {
            errors.reject("programId", "program id is required");
        }
        if self.facility_id.is_none() {
            errors.reject("facilityId", "facility id is required");
        }
        if self.processing_period_id.is_none() {
            errors.reject("processingPeriodId", "processing period id is required");
        }
        if self.template_id.is_none() {
            errors.reject("template", "template id is required");
        }
        if self.months_in_period == 0 {
            errors.reject("monthsInPeriod", "period must last at least one month");
        }
        errors.extend(duplicate_orderables(&self.line_items));

        match (
            self.program_id,
            self.facility_id,
            self.processing_period_id,
            self.template_id,
        ) {
            (Some(program_id), Some(facility_id), Some(processing_period_id), Some(template_id))
                if errors.is_empty() =>
            {
                let mut requisition = Requisition {
                    id,
                    status: RequisitionStatus::Initiated,
                    template_id,
                    facility_id,
                    program_id,
                    processing_period_id,
                    emergency: self.emergency,
                    months_in_period: self.months_in_period,
                    supervisory_node_id: None,
                    line_items: self.line_items,
                    status_changes: vec![],
                    draft_status_message: None,
                    version: 0,
                    modified_date: TimeStamp::new(),
                };
                requisition.record(StatusEvent::Initiated, initiator)?;
                Ok(requisition)
            }
            _ => Err(WorkflowError::Validation(errors)),
        }
    }
}

impl Requisition {
    pub fn builder() -> RequisitionBuilder {
        RequisitionBuilder::new()
    }

    pub fn id(&self) -> &RequisitionId {
        &self.id
    }
    pub fn status(&self) -> RequisitionStatus {
        self.status
    }
    pub fn template_id(&self) -> &TemplateId {
        &self.template_id
    }
    pub fn facility_id(&self) -> &FacilityId {
        &self.facility_id
    }
    pub fn program_id(&self) -> &ProgramId {
        &self.program_id
    }
    pub fn processing_period_id(&self) -> &PeriodId {
        &self.processing_period_id
    }
    pub fn is_emergency(&self) -> bool {
        self.emergency
    }
    pub fn months_in_period(&self) -> u32 {
        self.months_in_period
    }
    pub fn supervisory_node_id(&self) -> Option<&NodeId> {
        self.supervisory_node_id.as_ref()
    }
    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }
    /// Only while the requisition is editable, later changes go through
    /// the transitions.
    pub fn line_items_mut(&mut self) -> Result<&mut Vec<LineItem>, WorkflowError> {
        if !self.status.is_editable() {
            return Err(WorkflowError::illegal("edit", self.status));
        }
        Ok(&mut self.line_items)
    }
    pub fn line_item(&self, orderable: &OrderableId) -> Option<&LineItem> {
        self.line_items.iter().find(|l| &l.orderable_id == orderable)
    }
    pub fn status_changes(&self) -> &[StatusChange] {
        &self.status_changes
    }
    pub fn draft_status_message(&self) -> Option<&str> {
        self.draft_status_message.as_deref()
    }
    pub fn set_draft_status_message(&mut self, message: Option<String>) {
        self.draft_status_message = message;
    }
    pub fn version(&self) -> u64 {
        self.version
    }
    pub fn modified_date(&self) -> &TimeStamp<Utc> {
        &self.modified_date
    }
    pub fn is_approvable(&self) -> bool {
        self.status.is_approvable()
    }

    /// Called by the store once a write has gone through.
    pub(crate) fn mark_saved(&mut self) {
        self.version += 1;
        self.modified_date = TimeStamp::new();
    }

    fn record(&mut self, event: StatusEvent, author: &UserId) -> Result<(), WorkflowError> {
        let (details_hash, _) = digest_cbor(&self.line_items)?;
        self.status_changes.push(StatusChange {
            event,
            author: author.clone(),
            timestamp: TimeStamp::new(),
            details_hash,
        });
        Ok(())
    }

    /// Recompute the calculated columns of every line item, rejecting
    /// values that overflow.
    pub fn calculate(&mut self, template: &RequisitionTemplate) -> ValidationErrors {
        let months = self.months_in_period;
        let mut errors = ValidationErrors::new();
        for (index, item) in self.line_items.iter_mut().enumerate() {
            for column in item.calculate(template, months) {
                errors.reject(
                    format!("{REQUISITION_LINE_ITEMS}[{index}].{column}"),
                    format!("{column} is out of range"),
                );
            }
        }
        errors
    }

    pub fn submit(
        &mut self,
        template: &RequisitionTemplate,
        skipped: &[OrderableId],
        submitter: &UserId,
    ) -> Result<(), WorkflowError> {
        if self.status != RequisitionStatus::Initiated {
            return Err(WorkflowError::illegal("submit", self.status));
        }

        let mut next = self.clone();
        for item in next.line_items.iter_mut() {
            if skipped.contains(&item.orderable_id) {
                item.skipped = true;
            }
        }
        let mut errors = next.calculate(template);
        errors.extend(RequisitionValidator::validate(
            &next,
            template,
            ValidationStage::Submit,
        ));
        errors.into_result()?;

        next.status = RequisitionStatus::Submitted;
        next.record(StatusEvent::Submitted, submitter)?;
        *self = next;
        Ok(())
    }

    /// `node` is the first approver in the hierarchy, `None` when nobody
    /// supervises this program at this facility.
    pub fn authorize(
        &mut self,
        template: &RequisitionTemplate,
        node: Option<NodeId>,
        authorizer: &UserId,
    ) -> Result<(), WorkflowError> {
        if self.status != RequisitionStatus::Submitted {
            return Err(WorkflowError::illegal("authorize", self.status));
        }

        let mut next = self.clone();
        let mut errors = next.calculate(template);
        errors.extend(RequisitionValidator::validate(
            &next,
            template,
            ValidationStage::Authorize,
        ));
        errors.into_result()?;

        for item in next.line_items.iter_mut().filter(|l| !l.skipped) {
            if item.approved_quantity.is_none() {
                item.approved_quantity = item.requested_quantity;
            }
        }
        next.status = RequisitionStatus::Authorized;
        next.supervisory_node_id = node.clone();
        next.record(StatusEvent::Authorized { node }, authorizer)?;
        *self = next;
        Ok(())
    }

    /// `parent_node` must be the parent of the current supervisory node as
    /// resolved by the caller. With a parent the requisition stays authorized
    /// and moves one level up, without one it is finally approved.
    pub fn approve(
        &mut self,
        parent_node: Option<NodeId>,
        approver: &UserId,
    ) -> Result<(), WorkflowError> {
        if !self.status.is_approvable() {
            return Err(WorkflowError::illegal("approve", self.status));
        }

        let approving_node = self.supervisory_node_id.clone();
        let final_approval = parent_node.is_none();
        let mut next = self.clone();
        match parent_node {
            Some(parent) => next.supervisory_node_id = Some(parent),
            None => {
                next.status = RequisitionStatus::Approved;
                next.supervisory_node_id = None;
            }
        }
        next.record(
            StatusEvent::Approved {
                node: approving_node,
                final_approval,
            },
            approver,
        )?;
        *self = next;
        Ok(())
    }

    /// Returns the requisition to the facility for correction.
    pub fn reject(&mut self, rejector: &UserId) -> Result<(), WorkflowError> {
        if self.status != RequisitionStatus::Authorized {
            return Err(WorkflowError::illegal("reject", self.status));
        }

        let mut next = self.clone();
        next.record(StatusEvent::Rejected, rejector)?;
        next.status = RequisitionStatus::Initiated;
        next.supervisory_node_id = None;
        for item in next.line_items.iter_mut() {
            item.approved_quantity = None;
        }
        *self = next;
        Ok(())
    }

    /// Converts a fully approved requisition into an order.
    pub fn release(&mut self, releaser: &UserId) -> Result<(), WorkflowError> {
        if self.status != RequisitionStatus::Approved {
            return Err(WorkflowError::illegal("release", self.status));
        }

        let mut next = self.clone();
        next.status = RequisitionStatus::Released;
        next.record(StatusEvent::Released, releaser)?;
        *self = next;
        Ok(())
    }

    /// Take over line item values from `other`. Status, facility, program,
    /// period and supervisory node are never touched. A full update also
    /// adds line items only present in `other` and drops those missing from it.
    pub fn update_from(
        &mut self,
        other: &Requisition,
        ignored: &[ColumnName],
        is_full_update: bool,
    ) -> Result<(), WorkflowError> {
        if !self.status.is_editable() {
            return Err(WorkflowError::illegal("update", self.status));
        }
        duplicate_orderables(&other.line_items).into_result()?;

        let mut line_items = Vec::with_capacity(other.line_items.len());
        for incoming in &other.line_items {
            match self.line_item(&incoming.orderable_id) {
                Some(existing) => {
                    let mut item = existing.clone();
                    item.copy_from(incoming, ignored);
                    line_items.push(item);
                }
                None if is_full_update => {
                    let mut item = LineItem::new(incoming.orderable_id.clone());
                    item.copy_from(incoming, ignored);
                    line_items.push(item);
                }
                None => {}
            }
        }
        if !is_full_update {
            for existing in &self.line_items {
                if other.line_item(&existing.orderable_id).is_none() {
                    line_items.push(existing.clone());
                }
            }
        }

        self.line_items = line_items;
        if is_full_update {
            self.draft_status_message = other.draft_status_message.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjusted_consumption_scales_for_stockouts() {
        assert_eq!(adjusted_consumption(100, 0, 1), Some(100));
        // 100 * 30 / 15
        assert_eq!(adjusted_consumption(100, 15, 1), Some(200));
        // 10 * 30 / 29 rounds up
        assert_eq!(adjusted_consumption(10, 1, 1), Some(11));
        assert_eq!(adjusted_consumption(10, 30, 1), Some(10));
        assert_eq!(adjusted_consumption(10, 45, 1), Some(10));
    }

    #[test]
    fn adjusted_consumption_overflow_is_none() {
        assert_eq!(adjusted_consumption(i64::MAX / 2, 0, 1), None);
        assert_eq!(adjusted_consumption(10, i64::MIN, 1), None);
        assert_eq!(adjusted_consumption(i64::MAX, 45, 1), Some(i64::MAX));
    }

    #[test]
    fn builder_reports_every_missing_field() {
        let result = Requisition::builder()
            .set_months_in_period(0)
            .initiate(RequisitionId::new("requisition_x"), &UserId::new("user_x"));

        match result {
            Err(WorkflowError::Validation(errors)) => {
                assert_eq!(errors.len(), 5);
                assert!(errors.has_field("programId"));
                assert!(errors.has_field("facilityId"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn requisition_cbor_roundtrip() {
        let requisition = Requisition::builder()
            .set_program(ProgramId::new("program_a"))
            .set_facility(FacilityId::new("facility_a"))
            .set_processing_period(PeriodId::new("period_a"))
            .set_template(TemplateId::new("template_a"))
            .add_line_item(LineItem {
                requested_quantity: Some(5),
                remarks: Some("urgent".into()),
                ..LineItem::new(OrderableId::new("orderable_a"))
            })
            .initiate(RequisitionId::new("requisition_a"), &UserId::new("user_a"))
            .unwrap();

        let encoding = minicbor::to_vec(&requisition).unwrap();
        let decode: Requisition = minicbor::decode(&encoding).unwrap();

        assert_eq!(requisition, decode);
        assert_eq!(decode.status_changes().len(), 1);
        assert_eq!(decode.status_changes()[0].event, StatusEvent::Initiated);
    }

    fn standard_template() -> RequisitionTemplate {
        let catalog = crate::column::ColumnCatalog::standard();
        let names: Vec<String> = catalog.iter().map(|c| c.name().to_string()).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        RequisitionTemplate::from_catalog(TemplateId::new("template_a"), &catalog, &names).unwrap()
    }

    fn complete(orderable: &str) -> LineItem {
        LineItem {
            beginning_balance: Some(10),
            total_received_quantity: Some(5),
            total_consumed_quantity: Some(8),
            total_stockout_days: Some(0),
            stock_on_hand: Some(7),
            ..LineItem::new(OrderableId::new(orderable))
        }
    }

    fn two_line_requisition(second: LineItem) -> Requisition {
        Requisition::builder()
            .set_program(ProgramId::new("program_a"))
            .set_facility(FacilityId::new("facility_a"))
            .set_processing_period(PeriodId::new("period_a"))
            .set_template(TemplateId::new("template_a"))
            .add_line_item(complete("orderable_a"))
            .add_line_item(second)
            .initiate(RequisitionId::new("requisition_a"), &UserId::new("user_a"))
            .unwrap()
    }

    #[test]
    fn skipped_line_items_need_no_values() {
        let template = standard_template();
        let user = UserId::new("user_a");
        let mut requisition = two_line_requisition(LineItem::new(OrderableId::new("orderable_b")));

        assert!(requisition.clone().submit(&template, &[], &user).is_err());

        requisition
            .submit(&template, &[OrderableId::new("orderable_b")], &user)
            .unwrap();
        assert_eq!(requisition.status(), RequisitionStatus::Submitted);
        assert!(requisition.line_item(&OrderableId::new("orderable_b")).unwrap().skipped);
        assert!(!requisition.line_item(&OrderableId::new("orderable_a")).unwrap().skipped);
    }

    #[test]
    fn all_skipped_line_items_are_rejected() {
        let template = standard_template();
        let mut requisition = two_line_requisition(complete("orderable_b"));
        let before = requisition.clone();

        let result = requisition.submit(
            &template,
            &[OrderableId::new("orderable_a"), OrderableId::new("orderable_b")],
            &UserId::new("user_a"),
        );

        match result {
            Err(WorkflowError::Validation(errors)) => {
                assert!(errors.has_field(REQUISITION_LINE_ITEMS))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(requisition, before);
    }

    #[test]
    fn overflowing_calculation_blocks_submit() {
        let template = standard_template();
        let mut requisition = two_line_requisition(LineItem {
            total_consumed_quantity: Some(i64::MAX / 2),
            ..complete("orderable_b")
        });

        match requisition.submit(&template, &[], &UserId::new("user_a")) {
            Err(WorkflowError::Validation(errors)) => {
                assert!(errors.has_field("requisitionLineItems[1].adjustedConsumption"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(requisition.status(), RequisitionStatus::Initiated);
    }

    #[test]
    fn duplicate_orderables_are_rejected_at_initiation() {
        let result = Requisition::builder()
            .set_program(ProgramId::new("program_a"))
            .set_facility(FacilityId::new("facility_a"))
            .set_processing_period(PeriodId::new("period_a"))
            .set_template(TemplateId::new("template_a"))
            .add_line_item(complete("orderable_a"))
            .add_line_item(complete("orderable_a"))
            .initiate(RequisitionId::new("requisition_a"), &UserId::new("user_a"));

        match result {
            Err(WorkflowError::Validation(errors)) => {
                assert!(errors.has_field("requisitionLineItems[1].orderableId"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
