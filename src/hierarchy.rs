//! Supervisory node hierarchy and the resolution of who approves next.
use super::error::WorkflowError;
use super::types::{FacilityId, NodeId, ProgramId};
use anyhow::bail;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisoryNode {
    pub id: NodeId,
    pub code: String,
    pub parent_id: Option<NodeId>,
    pub facility_id: Option<FacilityId>,
    pub program_ids: Vec<ProgramId>,
}

impl SupervisoryNode {
    pub fn new(id: NodeId, code: &str) -> Self {
        Self {
            id,
            code: code.to_owned(),
            parent_id: None,
            facility_id: None,
            program_ids: vec![],
        }
    }
    pub fn set_parent(mut self, parent: NodeId) -> Self {
        self.parent_id = Some(parent);
        self
    }
    /// The facility/program pair whose requisitions this node approves first.
    pub fn set_scope(mut self, facility: FacilityId, programs: Vec<ProgramId>) -> Self {
        self.facility_id = Some(facility);
        self.program_ids = programs;
        self
    }
    pub fn supervises(&self, program: &ProgramId, facility: &FacilityId) -> bool {
        self.facility_id.as_ref() == Some(facility) && self.program_ids.contains(program)
    }
}

/// Read-only access to supervisory node reference data.
pub trait SupervisoryNodeDirectory: Send + Sync {
    fn find_node(&self, id: &NodeId) -> anyhow::Result<Option<SupervisoryNode>>;

    /// The node that first approves requisitions of this program at this facility.
    fn find_for(
        &self,
        program: &ProgramId,
        facility: &FacilityId,
    ) -> anyhow::Result<Option<SupervisoryNode>>;

    fn find_parent(&self, id: &NodeId) -> anyhow::Result<Option<SupervisoryNode>> {
        let Some(node) = self.find_node(id)? else {
            bail!("supervisory node {id} not found");
        };
        match node.parent_id {
            Some(parent) => self.find_node(&parent),
            None => Ok(None),
        }
    }
}

/// Stateless walks over a [`SupervisoryNodeDirectory`]. Safe to call before
/// touching the requisition; the value it returns is what `approve` receives.
pub struct ApprovalHierarchy<'a> {
    directory: &'a dyn SupervisoryNodeDirectory,
}

impl<'a> ApprovalHierarchy<'a> {
    pub fn new(directory: &'a dyn SupervisoryNodeDirectory) -> Self {
        Self { directory }
    }

    pub fn resolve_initial(
        &self,
        program: &ProgramId,
        facility: &FacilityId,
    ) -> Result<Option<NodeId>, WorkflowError> {
        Ok(self.directory.find_for(program, facility)?.map(|n| n.id))
    }

    /// `None` when there is no current node or it has no parent: final approval.
    pub fn resolve_parent(&self, current: Option<&NodeId>) -> Result<Option<NodeId>, WorkflowError> {
        let Some(current) = current else {
            return Ok(None);
        };
        if self.directory.find_node(current)?.is_none() {
            return Err(WorkflowError::validation(
                "supervisoryNode",
                format!("supervisory node {current} not found"),
            ));
        }
        Ok(self.directory.find_parent(current)?.map(|n| n.id))
    }

    /// Nodes from `start` up to its root, `start` included.
    pub fn approval_chain(&self, start: &NodeId) -> Result<Vec<NodeId>, WorkflowError> {
        let mut chain = vec![start.clone()];
        let mut current = Some(start.clone());
        while let Some(parent) = self.resolve_parent(current.as_ref())? {
            if chain.contains(&parent) {
                return Err(WorkflowError::validation(
                    "supervisoryNode",
                    format!("supervisory node {parent} is its own ancestor"),
                ));
            }
            chain.push(parent.clone());
            current = Some(parent);
        }
        Ok(chain)
    }
}

/// A fixed set of nodes, checked to form a forest.
#[derive(Debug, Default)]
pub struct InMemoryHierarchy {
    nodes: HashMap<NodeId, SupervisoryNode>,
}

impl InMemoryHierarchy {
    pub fn new(nodes: impl IntoIterator<Item = SupervisoryNode>) -> anyhow::Result<Self> {
        let mut map = HashMap::new();
        for node in nodes {
            if let Some(previous) = map.insert(node.id.clone(), node) {
                bail!("supervisory node {} defined twice", previous.id);
            }
        }

        for node in map.values() {
            if let Some(parent) = &node.parent_id {
                if !map.contains_key(parent) {
                    bail!("supervisory node {} has unknown parent {parent}", node.id);
                }
            }
            let mut seen = HashSet::from([&node.id]);
            let mut cursor = node.parent_id.as_ref();
            while let Some(id) = cursor {
                if !seen.insert(id) {
                    bail!("supervisory node {} is part of a cycle", node.id);
                }
                cursor = map.get(id).and_then(|n| n.parent_id.as_ref());
            }
        }

        Ok(Self { nodes: map })
    }
}

impl SupervisoryNodeDirectory for InMemoryHierarchy {
    fn find_node(&self, id: &NodeId) -> anyhow::Result<Option<SupervisoryNode>> {
        Ok(self.nodes.get(id).cloned())
    }

    fn find_for(
        &self,
        program: &ProgramId,
        facility: &FacilityId,
    ) -> anyhow::Result<Option<SupervisoryNode>> {
        let mut matching: Vec<_> = self
            .nodes
            .values()
            .filter(|n| n.supervises(program, facility))
            .collect();
        // deterministic pick when reference data overlaps
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching.first().map(|n| (*n).clone()))
    }
}
