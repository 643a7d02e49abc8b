//! Structural business rules for requisition templates.
//!
//! Every rule runs on every call and all violations are reported together.
//! Source and option availability is re-checked against the current catalog
//! snapshot, since definitions may change while stored templates do not.
use super::column::{
    ADJUSTED_CONSUMPTION, ColumnCatalog, REQUESTED_QUANTITY, REQUESTED_QUANTITY_EXPLANATION,
    SourceType, TOTAL_CONSUMED_QUANTITY, TOTAL_STOCKOUT_DAYS,
};
use super::error::ValidationErrors;
use super::template::RequisitionTemplate;
use std::sync::Arc;

pub const COLUMNS_MAP: &str = "columnsMap";
pub const ADJUSTED_CONSUMPTION_MUST_BE_CALCULATED_INFORMATION: &str =
    " must be displayed when adjusted consumption is calculated.";

#[derive(Debug, Clone)]
pub struct RequisitionTemplateValidator {
    catalog: Arc<ColumnCatalog>,
}

impl RequisitionTemplateValidator {
    pub fn new(catalog: Arc<ColumnCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<ColumnCatalog> {
        &self.catalog
    }

    pub fn validate(&self, template: &RequisitionTemplate) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        if template.is_column_user_input(REQUESTED_QUANTITY)
            && !template.is_column_displayed(REQUESTED_QUANTITY_EXPLANATION)
        {
            errors.reject(
                COLUMNS_MAP,
                format!(
                    "{REQUESTED_QUANTITY_EXPLANATION} must be displayed when requested quantity is displayed."
                ),
            );
        }

        for column in template.columns() {
            let Some(definition) = self.catalog.get(column.name().as_str()) else {
                errors.reject(
                    COLUMNS_MAP,
                    format!("Column {} is no longer available.", column.name()),
                );
                continue;
            };

            if definition.is_display_required() && !column.is_displayed() {
                errors.reject(COLUMNS_MAP, format!("{} must be displayed.", column.name()));
            }
            if !definition.allows_source(column.source()) {
                errors.reject(
                    COLUMNS_MAP,
                    format!(
                        "Source {} is not available for column {}.",
                        column.source(),
                        column.name()
                    ),
                );
            }
            if let Some(option) = column.option() {
                if !definition.allows_option(option) {
                    errors.reject(
                        COLUMNS_MAP,
                        format!(
                            "Option {option} is not available for column {}.",
                            column.name()
                        ),
                    );
                }
            }
        }

        if template
            .column(ADJUSTED_CONSUMPTION)
            .is_some_and(|c| c.source() == SourceType::Calculated)
        {
            for dependency in [TOTAL_STOCKOUT_DAYS, TOTAL_CONSUMED_QUANTITY] {
                if !template.is_column_displayed(dependency) {
                    errors.reject(
                        COLUMNS_MAP,
                        format!("{dependency}{ADJUSTED_CONSUMPTION_MUST_BE_CALCULATED_INFORMATION}"),
                    );
                }
            }
        }

        errors
    }
}
