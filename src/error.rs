use super::requisition::RequisitionStatus;
use super::types::RequisitionId;
use std::fmt;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TemplateColumnError {
    #[error("Column {0} is not part of this template")]
    ColumnNotFound(String),
    #[error("Column {0} is not defined in the column catalog")]
    UnknownColumn(String),
    #[error("Column {0} appears more than once in the template")]
    DuplicateColumn(String),
    #[error("Invalid column name {0:?}")]
    InvalidName(String),
    #[error("Source {source_type} is not available for column {column}")]
    SourceNotAvailable { column: String, source_type: String },
    #[error("Option {option} is not available for column {column}")]
    OptionNotAvailable { column: String, option: String },
}

/// A single rejected field. `field` is the path of the offending value,
/// e.g. `columnsMap` or `requisitionLineItems[0].beginningBalance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every violation found while validating one request, in the order found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.reject(field, message);
        errors
    }
    pub fn reject(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }
    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
    pub fn has_message(&self, message: &str) -> bool {
        self.0.iter().any(|e| e.message == message)
    }
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
    /// `Ok(())` when nothing was rejected, otherwise every violation as one error.
    pub fn into_result(self) -> Result<(), WorkflowError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("Requisition {id} was modified concurrently (read version {expected}, found {found})")]
    ConcurrencyConflict {
        id: RequisitionId,
        expected: u64,
        found: u64,
    },
    #[error("Cannot {action} a requisition in status {status}")]
    IllegalTransition {
        action: &'static str,
        status: RequisitionStatus,
    },
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }
    pub fn illegal(action: &'static str, status: RequisitionStatus) -> Self {
        Self::IllegalTransition { action, status }
    }
}

impl From<TemplateColumnError> for WorkflowError {
    fn from(value: TemplateColumnError) -> Self {
        Self::validation("columnsMap", value.to_string())
    }
}
