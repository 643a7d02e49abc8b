//! Static catalog of the columns a requisition template may use.
//!
//! The catalog is loaded once at startup and shared as an immutable
//! `Arc<ColumnCatalog>` snapshot. Templates keep an `Arc` to the definition
//! they were built from; replacing the catalog means building a new snapshot,
//! never mutating the old one.
use super::error::TemplateColumnError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub const BEGINNING_BALANCE: &str = "beginningBalance";
pub const TOTAL_RECEIVED_QUANTITY: &str = "totalReceivedQuantity";
pub const TOTAL_CONSUMED_QUANTITY: &str = "totalConsumedQuantity";
pub const TOTAL_STOCKOUT_DAYS: &str = "totalStockoutDays";
pub const STOCK_ON_HAND: &str = "stockOnHand";
pub const REQUESTED_QUANTITY: &str = "requestedQuantity";
pub const REQUESTED_QUANTITY_EXPLANATION: &str = "requestedQuantityExplanation";
pub const ADJUSTED_CONSUMPTION: &str = "adjustedConsumption";
pub const APPROVED_QUANTITY: &str = "approvedQuantity";
pub const REMARKS: &str = "remarks";
pub const SKIPPED: &str = "skipped";
pub const PRODUCT_CODE: &str = "productCode";
pub const PRODUCT_NAME: &str = "fullProductName";

/// Where the value of a column comes from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    UserInput,
    Calculated,
    ReferenceData,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::UserInput => "USER_INPUT",
            SourceType::Calculated => "CALCULATED",
            SourceType::ReferenceData => "REFERENCE_DATA",
        };
        f.write_str(name)
    }
}

/// Validated column identifier. Letters, digits, `.` and `_` only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnName(String);

impl ColumnName {
    pub fn new(name: &str) -> Result<Self, TemplateColumnError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
        if !valid {
            return Err(TemplateColumnError::InvalidName(name.to_owned()));
        }
        Ok(Self(name.to_owned()))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ColumnName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnOption {
    pub name: String,
    pub label: String,
}

impl ColumnOption {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_owned(),
            label: label.to_owned(),
        }
    }
}

/// Static definition of a column: what it may display and where its value may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableColumn {
    name: ColumnName,
    indicator: String,
    label: String,
    is_display_required: bool,
    sources: BTreeSet<SourceType>,
    options: BTreeSet<ColumnOption>,
}

impl AvailableColumn {
    pub fn new(name: &str, indicator: &str) -> Result<Self, TemplateColumnError> {
        Ok(Self {
            name: ColumnName::new(name)?,
            indicator: indicator.to_owned(),
            label: name.to_owned(),
            is_display_required: false,
            sources: BTreeSet::new(),
            options: BTreeSet::new(),
        })
    }
    pub fn set_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }
    pub fn set_display_required(mut self, required: bool) -> Self {
        self.is_display_required = required;
        self
    }
    pub fn set_sources(mut self, sources: impl IntoIterator<Item = SourceType>) -> Self {
        self.sources = sources.into_iter().collect();
        self
    }
    pub fn set_options(mut self, options: impl IntoIterator<Item = ColumnOption>) -> Self {
        self.options = options.into_iter().collect();
        self
    }

    pub fn name(&self) -> &ColumnName {
        &self.name
    }
    pub fn indicator(&self) -> &str {
        &self.indicator
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn is_display_required(&self) -> bool {
        self.is_display_required
    }
    pub fn sources(&self) -> &BTreeSet<SourceType> {
        &self.sources
    }
    pub fn options(&self) -> &BTreeSet<ColumnOption> {
        &self.options
    }
    pub fn allows_source(&self, source: SourceType) -> bool {
        self.sources.contains(&source)
    }
    pub fn allows_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o.name == option)
    }
    /// Source picked for a fresh template column: user input when allowed.
    pub fn default_source(&self) -> Option<SourceType> {
        self.sources.first().copied()
    }
}

/// Immutable snapshot of every available column definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnCatalog {
    columns: BTreeMap<ColumnName, Arc<AvailableColumn>>,
}

impl ColumnCatalog {
    pub fn new(
        columns: impl IntoIterator<Item = AvailableColumn>,
    ) -> Result<Self, TemplateColumnError> {
        let mut map = BTreeMap::new();
        for column in columns {
            let name = column.name().clone();
            if map.insert(name.clone(), Arc::new(column)).is_some() {
                return Err(TemplateColumnError::DuplicateColumn(name.to_string()));
            }
        }
        Ok(Self { columns: map })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AvailableColumn>> {
        let name = ColumnName::new(name).ok()?;
        self.columns.get(&name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AvailableColumn>> {
        self.columns.values()
    }

    /// The columns every deployment starts with.
    pub fn standard() -> Self {
        use SourceType::*;

        let column = |name: &str, indicator: &str, label: &str, sources: &[SourceType]| {
            AvailableColumn {
                name: ColumnName(name.to_owned()),
                indicator: indicator.to_owned(),
                label: label.to_owned(),
                is_display_required: false,
                sources: sources.iter().copied().collect(),
                options: BTreeSet::new(),
            }
        };

        let columns = vec![
            column(PRODUCT_CODE, "O", "Product code", &[ReferenceData]).set_display_required(true),
            column(PRODUCT_NAME, "R", "Product", &[ReferenceData]).set_display_required(true),
            column(BEGINNING_BALANCE, "A", "Stock on hand at the beginning of the period", &[UserInput]),
            column(TOTAL_RECEIVED_QUANTITY, "B", "Total received quantity", &[UserInput]),
            column(TOTAL_CONSUMED_QUANTITY, "C", "Total consumed quantity", &[UserInput, Calculated]),
            column(TOTAL_STOCKOUT_DAYS, "X", "Total stockout days", &[UserInput]),
            column(STOCK_ON_HAND, "E", "Stock on hand", &[UserInput, Calculated]),
            column(REQUESTED_QUANTITY, "J", "Requested quantity", &[UserInput]),
            column(REQUESTED_QUANTITY_EXPLANATION, "W", "Requested quantity explanation", &[UserInput]),
            column(ADJUSTED_CONSUMPTION, "N", "Adjusted consumption", &[Calculated]),
            column(APPROVED_QUANTITY, "K", "Approved quantity", &[UserInput]),
            column(REMARKS, "L", "Remarks", &[UserInput]),
            column(SKIPPED, "S", "Skip", &[UserInput]).set_options([
                ColumnOption::new("disableSkipLineItem", "Disable skipping line items"),
                ColumnOption::new("hideSkippedLineItem", "Hide skipped line items"),
            ]),
        ];

        Self {
            columns: columns
                .into_iter()
                .map(|c| (c.name.clone(), Arc::new(c)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_validated() {
        assert!(ColumnName::new("requestedQuantity").is_ok());
        assert!(ColumnName::new("orderable.productCode").is_ok());
        assert!(ColumnName::new("").is_err());
        assert!(ColumnName::new("bad name").is_err());
    }

    #[test]
    fn duplicate_definitions_are_rejected() {
        let a = AvailableColumn::new("a", "A").unwrap();
        let b = AvailableColumn::new("a", "B").unwrap();

        assert_eq!(
            ColumnCatalog::new([a, b]),
            Err(TemplateColumnError::DuplicateColumn("a".into()))
        );
    }

    #[test]
    fn standard_catalog_prefers_user_input() {
        let catalog = ColumnCatalog::standard();
        let consumed = catalog.get(TOTAL_CONSUMED_QUANTITY).unwrap();

        assert_eq!(consumed.default_source(), Some(SourceType::UserInput));
        assert_eq!(
            catalog.get(ADJUSTED_CONSUMPTION).unwrap().default_source(),
            Some(SourceType::Calculated)
        );
        assert!(catalog.get(SKIPPED).unwrap().allows_option("hideSkippedLineItem"));
        assert!(catalog.get("unknown").is_none());
    }
}
