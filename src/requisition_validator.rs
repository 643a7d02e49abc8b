//! Line item rules driven by the template.
use super::column::{
    APPROVED_QUANTITY, REMARKS, REQUESTED_QUANTITY, REQUESTED_QUANTITY_EXPLANATION,
    TOTAL_STOCKOUT_DAYS,
};
use super::error::ValidationErrors;
use super::requisition::{ColumnValue, DAYS_PER_MONTH, Requisition, RequisitionStatus};
use super::template::RequisitionTemplate;

pub const REQUISITION_LINE_ITEMS: &str = "requisitionLineItems";
pub const APPROVED_QUANTITY_ONLY_IN_APPROVAL: &str =
    "approvedQuantity is only available during the approval step of the requisition process";

// user input columns that may be left empty
const OPTIONAL_COLUMNS: [&str; 3] = [REMARKS, REQUESTED_QUANTITY, APPROVED_QUANTITY];

/// Which request the requisition is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    /// Saving work in progress, missing values are fine.
    Draft,
    Submit,
    Authorize,
}

pub struct RequisitionValidator;

impl RequisitionValidator {
    pub fn validate(
        requisition: &Requisition,
        template: &RequisitionTemplate,
        stage: ValidationStage,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        let complete = stage != ValidationStage::Draft;
        let days_in_period = i64::from(requisition.months_in_period()) * DAYS_PER_MONTH;

        if complete && requisition.line_items().iter().all(|l| l.skipped) {
            errors.reject(
                REQUISITION_LINE_ITEMS,
                "a requisition must contain at least one line item that is not skipped",
            );
        }

        for (index, item) in requisition.line_items().iter().enumerate() {
            let field = |column: &str| format!("{REQUISITION_LINE_ITEMS}[{index}].{column}");

            for column in template.columns() {
                let name = column.name().as_str();
                let Some(value) = item.value(name) else {
                    continue;
                };

                if let ColumnValue::Quantity(Some(quantity)) = value {
                    if quantity < 0 {
                        errors.reject(field(name), format!("{name} must be a non-negative value"));
                    }
                }

                if complete
                    && !item.skipped
                    && column.is_user_input()
                    && !OPTIONAL_COLUMNS.contains(&name)
                    && name != REQUESTED_QUANTITY_EXPLANATION
                    && !value.is_filled()
                {
                    errors.reject(field(name), format!("{name} is required"));
                }
            }

            if item.approved_quantity.is_some()
                && requisition.status() != RequisitionStatus::Authorized
            {
                errors.reject(field(APPROVED_QUANTITY), APPROVED_QUANTITY_ONLY_IN_APPROVAL);
            }

            if item
                .total_stockout_days
                .is_some_and(|days| days > days_in_period)
            {
                errors.reject(
                    field(TOTAL_STOCKOUT_DAYS),
                    format!("{TOTAL_STOCKOUT_DAYS} cannot exceed the {days_in_period} days in the period"),
                );
            }

            let explanation_missing = !item
                .value(REQUESTED_QUANTITY_EXPLANATION)
                .is_some_and(|v| v.is_filled());
            if complete
                && !item.skipped
                && item.requested_quantity.is_some()
                && template.is_column_displayed(REQUESTED_QUANTITY_EXPLANATION)
                && explanation_missing
            {
                errors.reject(
                    field(REQUESTED_QUANTITY_EXPLANATION),
                    format!(
                        "{REQUESTED_QUANTITY_EXPLANATION} is required when {REQUESTED_QUANTITY} is entered"
                    ),
                );
            }
        }

        errors
    }
}
