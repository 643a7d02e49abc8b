//! sled backed requisition storage. Requisitions are stored as CBOR under their id.
use super::error::WorkflowError;
use super::ports::RequisitionRepository;
use super::requisition::Requisition;
use super::types::{FacilityId, PeriodId, ProgramId, RequisitionId};
use anyhow::Context;
use std::sync::Arc;

const REQUISITIONS_TREE: &str = "requisitions";
// facility/program/period -> id of the regular requisition holding it
const REGULAR_PERIODS_TREE: &str = "regular_periods";

pub struct SledRequisitionRepository {
    instance: Arc<sled::Db>,
    tree: sled::Tree,
    periods: sled::Tree,
}

impl SledRequisitionRepository {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        let tree = instance
            .open_tree(REQUISITIONS_TREE)
            .context("failed to open requisitions tree")?;
        let periods = instance
            .open_tree(REGULAR_PERIODS_TREE)
            .context("failed to open regular periods tree")?;
        Ok(Self {
            instance,
            tree,
            periods,
        })
    }

    pub fn instance(&self) -> &Arc<sled::Db> {
        &self.instance
    }

    fn decode(bytes: &[u8]) -> anyhow::Result<Requisition> {
        minicbor::decode(bytes).context("failed to decode stored requisition")
    }

    /// Claim the facility, program and period of a new regular requisition.
    /// The claim is a single compare and swap, so of two concurrent
    /// requisitions for the same period only one gets through.
    fn claim_period(&self, requisition: &Requisition) -> Result<(), WorkflowError> {
        let key = format!(
            "{}\0{}\0{}",
            requisition.facility_id(),
            requisition.program_id(),
            requisition.processing_period_id()
        );
        let id = requisition.id().as_str().as_bytes();

        let claimed = self
            .periods
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(id))
            .context("failed to claim processing period")?;
        match claimed {
            Ok(()) => Ok(()),
            // a retried save of the requisition that already holds the claim
            Err(err) if err.current.as_deref() == Some(id) => Ok(()),
            Err(_) => Err(WorkflowError::validation(
                "processingPeriodId",
                format!(
                    "a requisition for period {} already exists",
                    requisition.processing_period_id()
                ),
            )),
        }
    }
}

impl RequisitionRepository for SledRequisitionRepository {
    fn find_by_id(&self, id: &RequisitionId) -> anyhow::Result<Option<Requisition>> {
        self.tree
            .get(id.as_str().as_bytes())
            .context("failed to read requisition")?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    fn save(&self, requisition: &Requisition) -> Result<Requisition, WorkflowError> {
        let key = requisition.id().as_str().as_bytes();
        let current = self.tree.get(key).context("failed to read requisition")?;

        let found = match &current {
            Some(bytes) => Self::decode(bytes)?.version(),
            None => 0,
        };
        if found != requisition.version() {
            return Err(WorkflowError::ConcurrencyConflict {
                id: requisition.id().clone(),
                expected: requisition.version(),
                found,
            });
        }

        if current.is_none() && !requisition.is_emergency() {
            self.claim_period(requisition)?;
        }

        let mut saved = requisition.clone();
        saved.mark_saved();
        let encoded = minicbor::to_vec(&saved).context("failed to encode requisition")?;

        // another writer got in between the read above and this write
        if self
            .tree
            .compare_and_swap(key, current, Some(encoded))
            .context("failed to write requisition")?
            .is_err()
        {
            let found = self
                .find_by_id(requisition.id())?
                .map(|r| r.version())
                .unwrap_or_default();
            return Err(WorkflowError::ConcurrencyConflict {
                id: requisition.id().clone(),
                expected: requisition.version(),
                found,
            });
        }

        tracing::debug!(
            requisition = %saved.id(),
            version = saved.version(),
            "requisition saved"
        );
        Ok(saved)
    }

    fn search(
        &self,
        facility: &FacilityId,
        program: &ProgramId,
        period: &PeriodId,
    ) -> anyhow::Result<Vec<Requisition>> {
        let mut found = vec![];
        for entry in self.tree.iter() {
            let (_, bytes) = entry.context("failed to scan requisitions")?;
            let requisition = Self::decode(&bytes)?;
            if requisition.facility_id() == facility
                && requisition.program_id() == program
                && requisition.processing_period_id() == period
            {
                found.push(requisition);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requisition::LineItem;
    use crate::types::*;
    use tempfile::tempdir;

    fn requisition() -> Requisition {
        requisition_with("requisition_s", false)
    }

    fn requisition_with(id: &str, emergency: bool) -> Requisition {
        Requisition::builder()
            .set_program(ProgramId::new("program_s"))
            .set_facility(FacilityId::new("facility_s"))
            .set_processing_period(PeriodId::new("period_s"))
            .set_template(TemplateId::new("template_s"))
            .set_emergency(emergency)
            .add_line_item(LineItem::new(OrderableId::new("orderable_s")))
            .initiate(RequisitionId::new(id), &UserId::new("user_s"))
            .unwrap()
    }

    #[test]
    fn save_bumps_version_and_rejects_stale_writes() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("store.db"))?);
        let store = SledRequisitionRepository::new(db)?;

        let fresh = requisition();
        let saved = store.save(&fresh).unwrap();
        assert_eq!(saved.version(), 1);

        let stale = saved.clone();
        let saved_again = store.save(&saved).unwrap();
        assert_eq!(saved_again.version(), 2);

        assert!(matches!(
            store.save(&stale),
            Err(WorkflowError::ConcurrencyConflict {
                expected: 1,
                found: 2,
                ..
            })
        ));
        assert_eq!(store.find_by_id(fresh.id())?.unwrap().version(), 2);
        Ok(())
    }

    #[test]
    fn search_matches_header_fields() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("search.db"))?);
        let store = SledRequisitionRepository::new(db)?;
        store.save(&requisition()).unwrap();

        let hits = store.search(
            &FacilityId::new("facility_s"),
            &ProgramId::new("program_s"),
            &PeriodId::new("period_s"),
        )?;
        let misses = store.search(
            &FacilityId::new("facility_s"),
            &ProgramId::new("program_other"),
            &PeriodId::new("period_s"),
        )?;

        assert_eq!(hits.len(), 1);
        assert!(misses.is_empty());
        Ok(())
    }

    #[test]
    fn second_regular_requisition_for_a_period_is_rejected() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("periods.db"))?);
        let store = SledRequisitionRepository::new(db)?;

        let first = store.save(&requisition_with("requisition_first", false)).unwrap();
        // saving the holder again is not a second claim
        store.save(&first).unwrap();

        match store.save(&requisition_with("requisition_second", false)) {
            Err(WorkflowError::Validation(errors)) => {
                assert!(errors.has_field("processingPeriodId"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(
            store
                .save(&requisition_with("requisition_emergency", true))
                .is_ok()
        );
        assert!(
            store
                .find_by_id(&RequisitionId::new("requisition_second"))?
                .is_none()
        );
        Ok(())
    }

    #[test]
    fn concurrent_regular_requisitions_claim_the_period_once() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("race.db"))?);
        let store = SledRequisitionRepository::new(db)?;
        let barrier = std::sync::Barrier::new(8);

        let created = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let (store, barrier) = (&store, &barrier);
                    scope.spawn(move || {
                        let requisition = requisition_with(&format!("requisition_{n}"), false);
                        barrier.wait();
                        store.save(&requisition).is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|created| *created)
                .count()
        });

        assert_eq!(created, 1);
        Ok(())
    }
}
