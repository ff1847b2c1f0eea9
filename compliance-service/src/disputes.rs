use crate::config::ComplianceConfig;
use crate::error::{ComplianceError, Result};
use crate::types::{
    Dispute, DisputeStatus, DisputeType, Evidence, EvidenceKind, Resolution, ResolutionKind,
    TimelineEntry,
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use trust_ledger::storage::{memory_store, KeyLocks, SharedStore};
use trust_ledger::{SharedClock, SubjectId};
use uuid::Uuid;

/// Evidence as submitted
#[derive(Debug, Clone)]
pub struct EvidenceSubmission {
    pub kind: EvidenceKind,
    pub description: String,
    pub file_url: Option<String>,
    pub submitted_by: SubjectId,
}

/// DisputeLedger tracks complaints between subjects from intake to resolution
///
/// Status only moves forward (open -> in_progress -> escalated); `escalated`
/// is reachable from any non-resolved state and `resolved` is terminal.
pub struct DisputeLedger {
    config: ComplianceConfig,
    clock: SharedClock,
    store: SharedStore<Dispute>,
    locks: KeyLocks<Uuid>,
}

impl DisputeLedger {
    pub fn new(config: ComplianceConfig, clock: SharedClock, store: SharedStore<Dispute>) -> Self {
        Self {
            config,
            clock,
            store,
            locks: KeyLocks::new(),
        }
    }

    pub fn in_memory(config: ComplianceConfig, clock: SharedClock) -> Self {
        Self::new(config, clock, memory_store())
    }

    /// Read-modify-write one dispute under its lock; resolved disputes are refused
    fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Dispute) -> Result<R>) -> Result<R> {
        self.locks.with(&id, || {
            let mut dispute = self.get(id)?;
            if dispute.status == DisputeStatus::Resolved {
                warn!("Rejected change to resolved dispute {}", id);
                return Err(ComplianceError::TerminalState(id));
            }
            let out = f(&mut dispute)?;
            self.store.put(&id.to_string(), dispute)?;
            Ok(out)
        })
    }

    pub fn open(
        &self,
        complainant: &SubjectId,
        respondent: &SubjectId,
        dispute_type: DisputeType,
        description: impl Into<String>,
    ) -> Result<Dispute> {
        if complainant == respondent {
            return Err(ComplianceError::InvalidInput(
                "complainant and respondent must differ".to_string(),
            ));
        }

        let now = self.clock.now();
        let dispute = Dispute {
            id: Uuid::now_v7(),
            complainant_id: complainant.clone(),
            respondent_id: respondent.clone(),
            dispute_type,
            description: description.into(),
            status: DisputeStatus::Open,
            timeline: vec![TimelineEntry {
                at: now,
                status: DisputeStatus::Open,
                note: "Dispute opened".to_string(),
            }],
            evidence: Vec::new(),
            resolution: None,
            created_at: now,
        };
        self.store.put(&dispute.id.to_string(), dispute.clone())?;

        info!(
            dispute_id = %dispute.id,
            complainant = %complainant,
            respondent = %respondent,
            "Dispute opened"
        );
        Ok(dispute)
    }

    /// Move a dispute forward and record the note on its timeline
    pub fn transition(
        &self,
        id: Uuid,
        status: DisputeStatus,
        note: impl Into<String>,
    ) -> Result<Dispute> {
        let note = note.into();
        self.update(id, |dispute| {
            let from = dispute.status;
            // resolve() is the only way in; backwards moves are refused
            if status == DisputeStatus::Resolved || status.rank() < from.rank() {
                return Err(ComplianceError::InvalidTransition { from, to: status });
            }
            dispute.status = status;
            dispute.timeline.push(TimelineEntry {
                at: self.clock.now(),
                status,
                note,
            });
            info!(dispute_id = %id, %from, to = %status, "Dispute transitioned");
            Ok(dispute.clone())
        })
    }

    pub fn escalate(&self, id: Uuid, note: impl Into<String>) -> Result<Dispute> {
        self.transition(id, DisputeStatus::Escalated, note)
    }

    pub fn resolve(
        &self,
        id: Uuid,
        decision: ResolutionKind,
        compensation: Option<Decimal>,
        note: impl Into<String>,
    ) -> Result<Dispute> {
        if compensation.map_or(false, |c| c < Decimal::ZERO) {
            return Err(ComplianceError::InvalidInput(
                "compensation cannot be negative".to_string(),
            ));
        }

        let note = note.into();
        self.update(id, |dispute| {
            let now = self.clock.now();
            dispute.status = DisputeStatus::Resolved;
            dispute.timeline.push(TimelineEntry {
                at: now,
                status: DisputeStatus::Resolved,
                note: note.clone(),
            });
            dispute.resolution = Some(Resolution {
                decision,
                compensation,
                note,
                resolved_at: now,
            });
            info!(dispute_id = %id, ?decision, ?compensation, "Dispute resolved");
            Ok(dispute.clone())
        })
    }

    /// Attach evidence; enough pieces move an open dispute into progress
    pub fn submit_evidence(&self, id: Uuid, submission: EvidenceSubmission) -> Result<Dispute> {
        self.update(id, |dispute| {
            let now = self.clock.now();
            dispute.evidence.push(Evidence {
                id: Uuid::now_v7(),
                kind: submission.kind,
                description: submission.description,
                file_url: submission.file_url,
                submitted_by: submission.submitted_by,
                submitted_at: now,
            });

            if dispute.status == DisputeStatus::Open
                && dispute.evidence.len() >= self.config.evidence_for_investigation
            {
                dispute.status = DisputeStatus::InProgress;
                dispute.timeline.push(TimelineEntry {
                    at: now,
                    status: DisputeStatus::InProgress,
                    note: "Sufficient evidence received, investigation started".to_string(),
                });
                info!(dispute_id = %id, "Dispute moved to investigation");
            }
            Ok(dispute.clone())
        })
    }

    pub fn get(&self, id: Uuid) -> Result<Dispute> {
        self.store
            .get(&id.to_string())?
            .ok_or(ComplianceError::DisputeNotFound(id))
    }

    /// Disputes where the subject is either party, oldest first
    pub fn disputes_for(&self, subject: &SubjectId) -> Result<Vec<Dispute>> {
        let mut disputes = self
            .store
            .scan(&|d| &d.complainant_id == subject || &d.respondent_id == subject)?;
        disputes.sort_by_key(|d| (d.created_at, d.id));
        Ok(disputes)
    }

    /// Unresolved disputes naming the subject as respondent
    pub fn open_disputes_against(&self, subject: &SubjectId) -> Result<Vec<Dispute>> {
        let mut disputes = self
            .store
            .scan(&|d| &d.respondent_id == subject && d.is_open())?;
        disputes.sort_by_key(|d| (d.created_at, d.id));
        Ok(disputes)
    }
}
