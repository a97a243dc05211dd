//! Workflow sessions
//!
//! A session carries one Maker/Checker pass over a profile: the values being
//! edited, the checker's decisions, the active section and (once submitted)
//! the profile id. Sessions live server-side, keyed by id, and expire after a
//! period of inactivity.

use crate::catalog::SectionLayout;
use crate::sections::{OrderedMap, ProfileDetails, VerificationMap};
use crate::store::ProfileId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Types
// ============================================================================

/// Workflow stage of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStage {
    /// Maker editing
    #[default]
    Draft,
    /// Persisted, awaiting checker
    Submitted,
    /// Checker decisions recorded
    Verified,
    /// Retrieved for reporting
    Reported,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Submitted => write!(f, "submitted"),
            Self::Verified => write!(f, "verified"),
            Self::Reported => write!(f, "reported"),
        }
    }
}

/// Session-level errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Session expired: {0}")]
    Expired(Uuid),

    #[error("Cannot {operation} while the session is {stage}")]
    InvalidStage {
        operation: &'static str,
        stage: WorkflowStage,
    },

    #[error("No sections were assigned")]
    NoSections,

    #[error("Unknown section '{0}'")]
    UnknownSection(String),

    #[error("Unknown field '{field}' in section '{section}'")]
    UnknownField { section: String, field: String },

    #[error("Session {0} has not been submitted")]
    Unsaved(Uuid),
}

/// One user's pass through the workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub session_id: Uuid,
    pub stage: WorkflowStage,
    pub layout: SectionLayout,
    pub details: ProfileDetails,
    pub verified: VerificationMap,
    pub active_section: String,
    pub profile_id: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WorkflowSession {
    /// Fresh Draft session over a layout. Every assigned field starts empty.
    pub fn new(layout: SectionLayout, ttl: Duration) -> Result<Self, SessionError> {
        let mut details = ProfileDetails::new();
        for section in layout.sections() {
            let fields: OrderedMap<String> = layout
                .fields(section)
                .iter()
                .map(|f| (f.as_str(), String::new()))
                .collect();
            details.insert(section, fields);
        }
        Self::seeded(layout, details, VerificationMap::new(), None, ttl)
    }

    /// Draft session resuming existing values, e.g. a checker-requested correction.
    ///
    /// With an empty layout the sections come from `details` itself.
    pub fn seeded(
        layout: SectionLayout,
        details: ProfileDetails,
        verified: VerificationMap,
        profile_id: Option<ProfileId>,
        ttl: Duration,
    ) -> Result<Self, SessionError> {
        let layout = if layout.is_empty() {
            SectionLayout::from_details(&details)
        } else {
            layout
        };
        let active_section = layout
            .sections()
            .first()
            .map(|s| s.to_string())
            .ok_or(SessionError::NoSections)?;

        let now = Utc::now();
        Ok(Self {
            session_id: Uuid::new_v4(),
            stage: WorkflowStage::Draft,
            layout,
            details,
            verified,
            active_section,
            profile_id,
            created_at: now,
            last_activity_at: now,
            expires_at: now + ttl,
        })
    }

    pub fn sections(&self) -> Vec<&str> {
        self.layout.sections()
    }

    /// `(field, value)` pairs for a section in layout order, blanks for untouched fields
    pub fn section_values(&self, section: &str) -> Vec<(&str, &str)> {
        self.layout
            .fields(section)
            .iter()
            .map(|field| {
                let value = self
                    .details
                    .field(section, field)
                    .map(String::as_str)
                    .unwrap_or("");
                (field.as_str(), value)
            })
            .collect()
    }

    /// Guard an operation against the current stage
    pub fn ensure_stage(
        &self,
        operation: &'static str,
        allowed: &[WorkflowStage],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(SessionError::InvalidStage {
                operation,
                stage: self.stage,
            })
        }
    }

    fn ensure_section(&self, section: &str) -> Result<(), SessionError> {
        if self.sections().contains(&section) {
            Ok(())
        } else {
            Err(SessionError::UnknownSection(section.to_string()))
        }
    }

    /// Maker edit of one field
    pub fn set_field(&mut self, section: &str, field: &str, value: &str) -> Result<(), SessionError> {
        self.ensure_stage("edit a field", &[WorkflowStage::Draft])?;
        self.ensure_section(section)?;
        if !self.layout.contains(section, field) {
            return Err(SessionError::UnknownField {
                section: section.to_string(),
                field: field.to_string(),
            });
        }
        self.details.set_field(section, field, value.to_string());
        Ok(())
    }

    pub fn select_section(&mut self, section: &str) -> Result<(), SessionError> {
        self.ensure_section(section)?;
        self.active_section = section.to_string();
        Ok(())
    }

    /// Move to the next section; stays put on the last one.
    pub fn next_section(&mut self) -> bool {
        self.step_section(1)
    }

    /// Move to the previous section; stays put on the first one.
    pub fn previous_section(&mut self) -> bool {
        self.step_section(-1)
    }

    fn step_section(&mut self, delta: isize) -> bool {
        let target = {
            let sections = self.sections();
            let Some(idx) = sections.iter().position(|s| *s == self.active_section) else {
                return false;
            };
            let target = idx as isize + delta;
            if target < 0 || target as usize >= sections.len() {
                return false;
            }
            sections[target as usize].to_string()
        };
        self.active_section = target;
        true
    }

    /// Checker decision on one field
    pub fn set_verified(&mut self, section: &str, field: &str, verified: bool) -> Result<(), SessionError> {
        self.ensure_stage(
            "record a verification",
            &[WorkflowStage::Submitted, WorkflowStage::Verified],
        )?;
        if self.details.field(section, field).is_none() {
            return Err(SessionError::UnknownField {
                section: section.to_string(),
                field: field.to_string(),
            });
        }
        self.verified.set_field(section, field, verified);
        Ok(())
    }

    /// Flip a checker decision; a pending field becomes verified.
    pub fn toggle_verified(&mut self, section: &str, field: &str) -> Result<bool, SessionError> {
        let next = !self.verified.field(section, field).copied().unwrap_or(false);
        self.set_verified(section, field, next)?;
        Ok(next)
    }

    /// Back to Draft for a correction, keeping values, decisions and profile id.
    pub fn reopen(&mut self, section: Option<&str>) -> Result<(), SessionError> {
        self.ensure_stage(
            "edit the profile",
            &[WorkflowStage::Submitted, WorkflowStage::Verified],
        )?;
        if let Some(section) = section {
            self.select_section(section)?;
        }
        self.stage = WorkflowStage::Draft;
        Ok(())
    }

    /// Id of the persisted profile, once the session has been submitted
    pub fn persisted_id(&self) -> Result<ProfileId, SessionError> {
        self.profile_id.ok_or(SessionError::Unsaved(self.session_id))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn touch(&mut self, ttl: Duration) {
        let now = Utc::now();
        self.last_activity_at = now;
        self.expires_at = now + ttl;
    }
}

// ============================================================================
// Store
// ============================================================================

/// Server-side session map shared by request handlers
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, WorkflowSession>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn insert(&self, session: WorkflowSession) -> Uuid {
        let id = session.session_id;
        self.sessions.write().await.insert(id, session);
        debug!(session_id = %id, "Workflow session opened");
        id
    }

    /// Snapshot of a live session. Expired sessions are dropped on sight.
    pub async fn get(&self, id: Uuid) -> Result<WorkflowSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&id) {
            None => Err(SessionError::NotFound(id)),
            Some(session) if session.is_expired(Utc::now()) => {
                sessions.remove(&id);
                debug!(session_id = %id, "Workflow session expired");
                Err(SessionError::Expired(id))
            }
            Some(session) => Ok(session.clone()),
        }
    }

    /// Write a session back and extend its expiry.
    pub async fn put(&self, mut session: WorkflowSession) {
        session.touch(self.ttl);
        self.sessions
            .write()
            .await
            .insert(session.session_id, session);
    }

    pub async fn remove(&self, id: Uuid) -> Option<WorkflowSession> {
        self.sessions.write().await.remove(&id)
    }

    /// Drop every expired session, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SectionLayout {
        SectionLayout::from_sections(vec![
            ("Personal", vec!["Name", "PAN"]),
            ("Contact", vec!["Email"]),
        ])
    }

    fn session() -> WorkflowSession {
        WorkflowSession::new(layout(), Duration::minutes(30)).unwrap()
    }

    #[test]
    fn test_new_session_starts_on_first_section_with_blanks() {
        let s = session();
        assert_eq!(s.stage, WorkflowStage::Draft);
        assert_eq!(s.active_section, "Personal");
        assert_eq!(s.section_values("Personal"), vec![("Name", ""), ("PAN", "")]);
        assert!(s.profile_id.is_none());
    }

    #[test]
    fn test_empty_layout_is_rejected() {
        let err = WorkflowSession::new(SectionLayout::default(), Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, SessionError::NoSections));
    }

    #[test]
    fn test_seeded_session_falls_back_to_details_sections() {
        let details: ProfileDetails =
            serde_json::from_str(r#"{"KYC": {"PAN": "ABCDE1234F"}}"#).unwrap();
        let s = WorkflowSession::seeded(
            SectionLayout::default(),
            details,
            VerificationMap::new(),
            Some(4),
            Duration::minutes(1),
        )
        .unwrap();
        assert_eq!(s.sections(), vec!["KYC"]);
        assert_eq!(s.profile_id, Some(4));
    }

    #[test]
    fn test_set_field_checks_layout() {
        let mut s = session();
        s.set_field("Personal", "Name", "A").unwrap();
        assert!(matches!(
            s.set_field("Personal", "Email", "x"),
            Err(SessionError::UnknownField { .. })
        ));
        assert!(matches!(
            s.set_field("Bank", "IFSC", "x"),
            Err(SessionError::UnknownSection(_))
        ));
    }

    #[test]
    fn test_navigation_stops_at_edges() {
        let mut s = session();
        assert!(!s.previous_section());
        assert!(s.next_section());
        assert_eq!(s.active_section, "Contact");
        assert!(!s.next_section());
        assert!(s.previous_section());
        assert_eq!(s.active_section, "Personal");
    }

    #[test]
    fn test_stage_guards() {
        let mut s = session();
        assert!(matches!(
            s.set_verified("Personal", "Name", true),
            Err(SessionError::InvalidStage { stage: WorkflowStage::Draft, .. })
        ));
        assert!(s.reopen(None).is_err());

        s.stage = WorkflowStage::Submitted;
        assert!(s.set_field("Personal", "Name", "B").is_err());
        assert!(s.toggle_verified("Personal", "Name").unwrap());
        assert!(!s.toggle_verified("Personal", "Name").unwrap());
        assert_eq!(s.verified.field("Personal", "Name"), Some(&false));

        s.reopen(Some("Contact")).unwrap();
        assert_eq!(s.stage, WorkflowStage::Draft);
        assert_eq!(s.active_section, "Contact");
        assert_eq!(s.verified.field("Personal", "Name"), Some(&false));
    }

    #[tokio::test]
    async fn test_store_expires_sessions() {
        let store = SessionStore::new(Duration::zero());
        let id = store.insert(session()).await;

        let mut stale = session();
        stale.expires_at = Utc::now() - Duration::seconds(1);
        let stale_id = store.insert(stale).await;

        assert!(store.get(id).await.is_ok());
        assert!(matches!(store.get(stale_id).await, Err(SessionError::Expired(_))));
        assert!(matches!(store.get(stale_id).await, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = SessionStore::new(Duration::minutes(5));
        store.insert(session()).await;
        let mut stale = session();
        stale.expires_at = Utc::now() - Duration::seconds(1);
        store.insert(stale).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
