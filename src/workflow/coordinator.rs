//! Workflow Coordinator
//!
//! Drives a session through Draft -> Submitted -> Verified -> Reported.
//! Each call loads the session snapshot, applies one transition and writes it
//! back, so handlers only ever pass a session id around.
//!
//! Field rules are enforced here on submit. The profile service below only
//! sees details that already passed them.

use crate::catalog::{FieldCatalog, SectionLayout};
use crate::error::{KycError, KycResult};
use crate::pan;
use crate::report::{ProfileReport, VerificationSummary};
use crate::store::ProfileId;
use crate::validation::{validate_details, validate_section};
use crate::workflow::profiles::ProfileService;
use crate::workflow::session::{SessionStore, WorkflowSession, WorkflowStage};
use tracing::info;
use uuid::Uuid;

/// Stages that already have a persisted profile
const PERSISTED: &[WorkflowStage] = &[WorkflowStage::Submitted, WorkflowStage::Verified];

#[derive(Clone)]
pub struct WorkflowCoordinator {
    profiles: ProfileService,
    catalog: FieldCatalog,
    sessions: SessionStore,
}

impl WorkflowCoordinator {
    pub fn new(profiles: ProfileService, catalog: FieldCatalog, sessions: SessionStore) -> Self {
        Self {
            profiles,
            catalog,
            sessions,
        }
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Open a Draft session. Without an explicit layout the catalog's is used.
    pub async fn start_session(&self, layout: Option<SectionLayout>) -> KycResult<WorkflowSession> {
        let layout = match layout {
            Some(layout) => layout,
            None => self.catalog.layout().await?,
        };
        let session = WorkflowSession::new(layout, self.sessions.ttl())?;
        self.sessions.insert(session.clone()).await;
        info!(session_id = %session.session_id, sections = session.sections().len(), "Started maker session");
        Ok(session)
    }

    /// Open a session over a persisted profile, ready for the checker.
    pub async fn open_profile(&self, id: ProfileId) -> KycResult<WorkflowSession> {
        let profile = self.profiles.require(id).await?;
        let mut session = WorkflowSession::seeded(
            SectionLayout::default(),
            profile.details,
            profile.verified,
            Some(profile.id),
            self.sessions.ttl(),
        )?;
        session.stage = if session.verified.is_empty() {
            WorkflowStage::Submitted
        } else {
            WorkflowStage::Verified
        };
        self.sessions.insert(session.clone()).await;
        info!(session_id = %session.session_id, profile_id = id, "Opened profile session");
        Ok(session)
    }

    pub async fn session(&self, session_id: Uuid) -> KycResult<WorkflowSession> {
        Ok(self.sessions.get(session_id).await?)
    }

    /// Drop a session without persisting anything
    pub async fn discard(&self, session_id: Uuid) -> KycResult<()> {
        self.sessions
            .remove(session_id)
            .await
            .map(|_| ())
            .ok_or_else(|| KycError::not_found("session", session_id))
    }

    async fn apply<T>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut WorkflowSession) -> KycResult<T>,
    ) -> KycResult<(WorkflowSession, T)> {
        let mut session = self.sessions.get(session_id).await?;
        let out = f(&mut session)?;
        self.sessions.put(session.clone()).await;
        Ok((session, out))
    }

    // ========================================================================
    // Maker
    // ========================================================================

    pub async fn set_field(
        &self,
        session_id: Uuid,
        section: &str,
        field: &str,
        value: &str,
    ) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| Ok(s.set_field(section, field, value)?))
            .await?;
        Ok(session)
    }

    pub async fn select_section(&self, session_id: Uuid, section: &str) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| Ok(s.select_section(section)?))
            .await?;
        Ok(session)
    }

    /// Validate the active section without moving.
    pub async fn save_section(&self, session_id: Uuid) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| {
                s.ensure_stage("save a section", &[WorkflowStage::Draft])?;
                check_active_section(s)
            })
            .await?;
        Ok(session)
    }

    /// Validate the active section, then advance. Stays on the last section.
    pub async fn next_section(&self, session_id: Uuid) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| {
                s.ensure_stage("advance a section", &[WorkflowStage::Draft])?;
                check_active_section(s)?;
                s.next_section();
                Ok(())
            })
            .await?;
        Ok(session)
    }

    /// Step back without validating.
    pub async fn previous_section(&self, session_id: Uuid) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| {
                s.previous_section();
                Ok(())
            })
            .await?;
        Ok(session)
    }

    /// Validate everything and persist: create on first submit, update afterwards.
    pub async fn submit(&self, session_id: Uuid) -> KycResult<WorkflowSession> {
        let mut session = self.sessions.get(session_id).await?;
        session.ensure_stage("submit", &[WorkflowStage::Draft])?;
        validate_details(&session.details)?;

        let profile = match session.profile_id {
            None => self.profiles.create_profile(&session.details).await?,
            Some(id) => self.profiles.update_profile(id, &session.details).await?,
        };

        session.profile_id = Some(profile.id);
        session.details = profile.details;
        session.stage = WorkflowStage::Submitted;
        self.sessions.put(session.clone()).await;

        info!(session_id = %session_id, profile_id = profile.id, "Maker submitted profile");
        Ok(session)
    }

    // ========================================================================
    // Checker
    // ========================================================================

    pub async fn set_verified(
        &self,
        session_id: Uuid,
        section: &str,
        field: &str,
        verified: bool,
    ) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| Ok(s.set_verified(section, field, verified)?))
            .await?;
        Ok(session)
    }

    pub async fn toggle_verified(
        &self,
        session_id: Uuid,
        section: &str,
        field: &str,
    ) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| Ok(s.toggle_verified(section, field)?))
            .await?;
        Ok(session)
    }

    /// Counts over the session's current decisions
    pub async fn summary(&self, session_id: Uuid) -> KycResult<VerificationSummary> {
        let session = self.sessions.get(session_id).await?;
        Ok(VerificationSummary::compute(&session.details, &session.verified))
    }

    /// Persist the session's `verified` map, replacing what is stored.
    pub async fn submit_verification(&self, session_id: Uuid) -> KycResult<WorkflowSession> {
        let mut session = self.sessions.get(session_id).await?;
        session.ensure_stage("submit verification", PERSISTED)?;
        let id = session.persisted_id()?;

        let profile = self.profiles.record_verification(id, &session.verified).await?;
        session.verified = profile.verified;
        session.stage = WorkflowStage::Verified;
        self.sessions.put(session.clone()).await;

        info!(session_id = %session_id, profile_id = id, "Checker submitted verification");
        Ok(session)
    }

    /// Back to Draft for a correction, optionally jumping to a section.
    pub async fn edit(&self, session_id: Uuid, section: Option<&str>) -> KycResult<WorkflowSession> {
        let (session, _) = self
            .apply(session_id, |s| Ok(s.reopen(section)?))
            .await?;
        info!(session_id = %session_id, profile_id = ?session.profile_id, "Profile reopened for correction");
        Ok(session)
    }

    // ========================================================================
    // Reporter
    // ========================================================================

    /// Reports for the session's profile, looked up by PAN.
    ///
    /// A profile with no PAN asserted is reported by its own id.
    pub async fn report(&self, session_id: Uuid) -> KycResult<Vec<ProfileReport>> {
        let mut session = self.sessions.get(session_id).await?;
        session.ensure_stage(
            "generate a report",
            &[
                WorkflowStage::Submitted,
                WorkflowStage::Verified,
                WorkflowStage::Reported,
            ],
        )?;

        let reports = match pan::resolve_normalized(&session.details) {
            Some(normalized) => self.profiles.generate_report(&normalized).await?,
            None => {
                let profile = self.profiles.require(session.persisted_id()?).await?;
                vec![ProfileReport::from_profile(&profile)]
            }
        };

        session.stage = WorkflowStage::Reported;
        self.sessions.put(session).await;
        Ok(reports)
    }

    /// Report lookup without a session
    pub async fn report_by_pan(&self, raw_pan: &str) -> KycResult<Vec<ProfileReport>> {
        self.profiles.generate_report(raw_pan).await
    }
}

fn check_active_section(session: &WorkflowSession) -> KycResult<()> {
    let errors = validate_section(
        &session.active_section,
        session.section_values(&session.active_section),
    );
    Ok(errors.into_result()?)
}
