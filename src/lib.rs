//! Requisition workflow: templates, the requisition lifecycle and the
//! supervisory node hierarchy that decides who approves next.

pub mod column;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod ports;
pub mod requisition;
pub mod requisition_validator;
pub mod service;
pub mod store;
pub mod template;
pub mod template_validator;
pub mod types;
pub mod utils;

pub use error::{ValidationErrors, WorkflowError};
pub use requisition::{Requisition, RequisitionStatus};
pub use service::{Collaborators, RequisitionService};
