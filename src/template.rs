//! Requisition templates: which columns a requisition shows and where each value comes from.
use super::column::{AvailableColumn, ColumnCatalog, ColumnName, SourceType};
use super::error::TemplateColumnError;
use super::types::TemplateId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateColumn {
    name: ColumnName,
    display_order: u32,
    is_displayed: bool,
    source: SourceType,
    option: Option<String>,
    definition: Arc<AvailableColumn>, // shared with the catalog it was built from
}

impl TemplateColumn {
    /// A displayed column using the definition's default source.
    pub fn from_definition(definition: Arc<AvailableColumn>, display_order: u32) -> Self {
        Self {
            name: definition.name().clone(),
            display_order,
            is_displayed: true,
            source: definition.default_source().unwrap_or(SourceType::UserInput),
            option: None,
            definition,
        }
    }
    pub fn name(&self) -> &ColumnName {
        &self.name
    }
    pub fn display_order(&self) -> u32 {
        self.display_order
    }
    pub fn is_displayed(&self) -> bool {
        self.is_displayed
    }
    pub fn source(&self) -> SourceType {
        self.source
    }
    pub fn option(&self) -> Option<&str> {
        self.option.as_deref()
    }
    pub fn definition(&self) -> &Arc<AvailableColumn> {
        &self.definition
    }
    /// Displayed and typed in by the user.
    pub fn is_user_input(&self) -> bool {
        self.is_displayed && self.source == SourceType::UserInput
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequisitionTemplate {
    id: TemplateId,
    columns: BTreeMap<ColumnName, TemplateColumn>,
}

impl RequisitionTemplate {
    pub fn new(
        id: TemplateId,
        columns: impl IntoIterator<Item = TemplateColumn>,
    ) -> Result<Self, TemplateColumnError> {
        let mut map = BTreeMap::new();
        for column in columns {
            let name = column.name.clone();
            if map.insert(name.clone(), column).is_some() {
                return Err(TemplateColumnError::DuplicateColumn(name.to_string()));
            }
        }
        Ok(Self { id, columns: map })
    }

    /// Build a template from catalog definitions, in the given display order.
    /// Names missing from the catalog are rejected here rather than at use.
    pub fn from_catalog(
        id: TemplateId,
        catalog: &ColumnCatalog,
        names: &[&str],
    ) -> Result<Self, TemplateColumnError> {
        let mut columns = Vec::with_capacity(names.len());
        for (order, name) in names.iter().enumerate() {
            let definition = catalog
                .get(name)
                .ok_or_else(|| TemplateColumnError::UnknownColumn((*name).to_owned()))?;
            columns.push(TemplateColumn::from_definition(
                definition.clone(),
                order as u32,
            ));
        }
        Self::new(id, columns)
    }

    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn column(&self, name: &str) -> Option<&TemplateColumn> {
        let name = ColumnName::new(name).ok()?;
        self.columns.get(&name)
    }

    /// Columns in display order.
    pub fn columns(&self) -> Vec<&TemplateColumn> {
        let mut columns: Vec<_> = self.columns.values().collect();
        columns.sort_by_key(|c| (c.display_order, c.name.clone()));
        columns
    }

    pub fn is_column_displayed(&self, name: &str) -> bool {
        self.column(name).is_some_and(|c| c.is_displayed)
    }

    pub fn is_column_user_input(&self, name: &str) -> bool {
        self.column(name).is_some_and(|c| c.is_user_input())
    }

    pub fn is_column_calculated(&self, name: &str) -> bool {
        self.column(name)
            .is_some_and(|c| c.source == SourceType::Calculated)
    }

    /// Columns a client payload must never overwrite: hidden ones and those
    /// not typed in by the user.
    pub fn non_editable_columns(&self) -> Vec<ColumnName> {
        self.columns
            .values()
            .filter(|c| !c.is_user_input())
            .map(|c| c.name.clone())
            .collect()
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut TemplateColumn, TemplateColumnError> {
        ColumnName::new(name)
            .ok()
            .and_then(|key| self.columns.get_mut(&key))
            .ok_or_else(|| TemplateColumnError::ColumnNotFound(name.to_owned()))
    }

    /// Mandatory display is not enforced here, the template validator reports it.
    pub fn change_column_display(
        &mut self,
        name: &str,
        displayed: bool,
    ) -> Result<(), TemplateColumnError> {
        self.column_mut(name)?.is_displayed = displayed;
        Ok(())
    }

    pub fn change_column_source(
        &mut self,
        name: &str,
        source: SourceType,
    ) -> Result<(), TemplateColumnError> {
        let column = self.column_mut(name)?;
        if !column.definition.allows_source(source) {
            return Err(TemplateColumnError::SourceNotAvailable {
                column: name.to_owned(),
                source_type: source.to_string(),
            });
        }
        column.source = source;
        Ok(())
    }

    pub fn change_column_option(
        &mut self,
        name: &str,
        option: &str,
    ) -> Result<(), TemplateColumnError> {
        let column = self.column_mut(name)?;
        if !column.definition.allows_option(option) {
            return Err(TemplateColumnError::OptionNotAvailable {
                column: name.to_owned(),
                option: option.to_owned(),
            });
        }
        column.option = Some(option.to_owned());
        Ok(())
    }
}

/// Lookup of templates by id.
pub trait TemplateSource: Send + Sync {
    fn find_template(&self, id: &TemplateId) -> anyhow::Result<Option<Arc<RequisitionTemplate>>>;
}

/// Templates held in memory, registered at startup.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<TemplateId, Arc<RequisitionTemplate>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Replaces any template already registered under the same id.
    pub fn register(&mut self, template: RequisitionTemplate) {
        self.templates
            .insert(template.id().clone(), Arc::new(template));
    }
}

impl TemplateSource for TemplateRegistry {
    fn find_template(&self, id: &TemplateId) -> anyhow::Result<Option<Arc<RequisitionTemplate>>> {
        Ok(self.templates.get(id).cloned())
    }
}
