//! Session aggregate
//!
//! `SessionState` owns everything a mockup session knows and exposes the
//! transitions as plain synchronous methods. Nothing here awaits; the async
//! orchestration around the generation backend lives in `machine`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{ImageData, LogoAsset, MockupVersion, Product};
use super::error::{Phase, SessionError};

/// Inputs captured by value when an edit starts
#[derive(Debug, Clone)]
pub struct EditInputs {
    pub base_image: ImageData,
    pub reference_logo: Option<ImageData>,
}

#[derive(Debug, Default)]
pub struct SessionState {
    logo: Option<LogoAsset>,
    selected_product: Option<Product>,
    /// Always the id of an entry in `history`
    current: Option<Uuid>,
    /// Most recent first; append-only
    history: VecDeque<MockupVersion>,
    phase: Phase,
    last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn logo(&self) -> Option<&LogoAsset> {
        self.logo.as_ref()
    }

    #[cfg(test)]
    pub fn selected_product(&self) -> Option<&Product> {
        self.selected_product.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// History, most recent first
    #[cfg(test)]
    pub fn history(&self) -> impl Iterator<Item = &MockupVersion> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn current_version(&self) -> Option<&MockupVersion> {
        let id = self.current?;
        self.history.iter().find(|v| v.id == id)
    }

    /// Replace the logo. Valid in any phase; an outstanding call keeps the
    /// logo it captured when it started.
    pub fn upload_logo(&mut self, logo: LogoAsset) {
        self.logo = Some(logo);
    }

    /// Enter `Generating` for `product`, returning the logo to generate from
    pub fn begin_generation(&mut self, product: &Product) -> Result<ImageData, SessionError> {
        self.ensure_idle()?;
        let logo = self
            .logo
            .as_ref()
            .map(|l| l.image.clone())
            .ok_or(SessionError::MissingLogo)?;

        self.selected_product = Some(product.clone());
        self.phase = Phase::Generating;
        self.last_error = None;
        Ok(logo)
    }

    /// Enter `Editing`, returning the current image and the logo (if any)
    pub fn begin_edit(&mut self) -> Result<EditInputs, SessionError> {
        self.ensure_idle()?;
        let base_image = self
            .current_version()
            .map(|v| v.image.clone())
            .ok_or(SessionError::NoCurrentVersion)?;

        self.phase = Phase::Editing;
        self.last_error = None;
        Ok(EditInputs {
            base_image,
            reference_logo: self.logo.as_ref().map(|l| l.image.clone()),
        })
    }

    /// Settle the outstanding call successfully: record a new version and
    /// make it current
    pub fn complete(&mut self, image: ImageData, instruction: String) -> MockupVersion {
        debug_assert!(self.phase.is_busy(), "complete() without an outstanding call");

        let version = MockupVersion::new(image, instruction);
        self.history.push_front(version.clone());
        self.current = Some(version.id);
        self.phase = Phase::Idle;
        version
    }

    /// Settle the outstanding call with a failure; history is untouched
    pub fn fail(&mut self, message: &str) {
        debug_assert!(self.phase.is_busy(), "fail() without an outstanding call");

        let message = message.trim();
        let message = if !message.is_empty() {
            message
        } else if self.phase == Phase::Editing {
            "Failed to edit image."
        } else {
            "Failed to generate mockup."
        };

        self.last_error = Some(message.to_string());
        self.phase = Phase::Idle;
    }

    /// Move the current pointer to an existing version. Valid in any phase.
    pub fn select_version(&mut self, id: Uuid) -> Result<&MockupVersion, SessionError> {
        let version = self
            .history
            .iter()
            .find(|v| v.id == id)
            .ok_or(SessionError::VersionNotFound(id))?;
        self.current = Some(version.id);
        Ok(version)
    }

    /// The current version's image, for download
    pub fn export(&self) -> Result<ImageData, SessionError> {
        self.current_version()
            .map(|v| v.image.clone())
            .ok_or(SessionError::NoCurrentVersion)
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.phase.is_busy() {
            return Err(SessionError::Busy { phase: self.phase });
        }
        Ok(())
    }

    /// Everything the presentation layer renders
    pub fn snapshot(&self, session_id: Uuid) -> SessionSnapshot {
        let current = self.current_version();

        SessionSnapshot {
            session_id,
            phase: self.phase,
            has_logo: self.logo.is_some(),
            logo: self.logo.as_ref().map(|l| l.image.clone()),
            logo_uploaded_at: self.logo.as_ref().map(|l| l.uploaded_at),
            selected_product: self.selected_product.as_ref().map(|p| SelectedProduct {
                id: p.id.clone(),
                name: p.name.clone(),
            }),
            current_version_id: current.map(|v| v.id),
            current_image: current.map(|v| v.image.clone()),
            last_error: self.last_error.clone(),
            history: self
                .history
                .iter()
                .map(|v| HistoryEntry {
                    id: v.id,
                    image: v.image.clone(),
                    label: v.instruction.clone(),
                    created_at: v.created_at,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Presentation view
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SelectedProduct {
    pub id: String,
    pub name: String,
}

/// One history thumbnail
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub image: ImageData,
    /// Originating instruction
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub has_logo: bool,
    #[schema(value_type = Option<String>)]
    pub logo: Option<ImageData>,
    pub logo_uploaded_at: Option<DateTime<Utc>>,
    pub selected_product: Option<SelectedProduct>,
    pub current_version_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub current_image: Option<ImageData>,
    pub last_error: Option<String>,
    /// Most recent first
    pub history: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductCatalog;

    fn tshirt() -> Product {
        ProductCatalog::builtin().find("tshirt").cloned().unwrap()
    }

    fn image(tag: &str) -> ImageData {
        ImageData::encode(tag.as_bytes(), "image/png")
    }

    fn with_first_version() -> (SessionState, MockupVersion) {
        let mut state = SessionState::new();
        state.upload_logo(LogoAsset::new(b"logo", "image/png"));
        state.begin_generation(&tshirt()).unwrap();
        let v1 = state.complete(image("v1"), MockupVersion::initial_label(&tshirt()));
        (state, v1)
    }

    #[test]
    fn test_new_state_is_empty_and_idle() {
        let state = SessionState::new();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.logo().is_none());
        assert!(state.selected_product().is_none());
        assert!(state.current_version().is_none());
        assert!(state.last_error().is_none());
        assert_eq!(state.history_len(), 0);
    }

    #[test]
    fn test_begin_generation_without_logo() {
        let mut state = SessionState::new();
        assert_eq!(state.begin_generation(&tshirt()), Err(SessionError::MissingLogo));
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.selected_product().is_none());
        assert_eq!(state.history_len(), 0);
    }

    #[test]
    fn test_begin_generation_captures_logo_and_clears_error() {
        let mut state = SessionState::new();
        state.upload_logo(LogoAsset::new(b"logo", "image/png"));
        state.begin_generation(&tshirt()).unwrap();
        state.fail("backend down");
        assert_eq!(state.last_error(), Some("backend down"));

        let logo = state.begin_generation(&tshirt()).unwrap();
        assert_eq!(logo.decode().unwrap(), b"logo");
        assert_eq!(state.phase(), Phase::Generating);
        assert!(state.last_error().is_none());
        assert_eq!(state.selected_product().map(|p| p.id.as_str()), Some("tshirt"));
    }

    #[test]
    fn test_complete_prepends_and_moves_current() {
        let (mut state, v1) = with_first_version();
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(v1.instruction, "Initial Classic T-Shirt mockup");
        assert_eq!(state.current_version(), Some(&v1));

        state.begin_edit().unwrap();
        let v2 = state.complete(image("v2"), "make it blue".to_string());

        let ids: Vec<Uuid> = state.history().map(|v| v.id).collect();
        assert_eq!(ids, vec![v2.id, v1.id]);
        assert_eq!(state.current_version().map(|v| v.id), Some(v2.id));
    }

    #[test]
    fn test_begin_edit_requires_current_version() {
        let mut state = SessionState::new();
        state.upload_logo(LogoAsset::new(b"logo", "image/png"));
        assert!(matches!(state.begin_edit(), Err(SessionError::NoCurrentVersion)));
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_begin_edit_passes_logo_when_present() {
        let (mut state, v1) = with_first_version();
        let inputs = state.begin_edit().unwrap();
        assert_eq!(inputs.base_image, v1.image);
        assert!(inputs.reference_logo.is_some());
        assert_eq!(state.phase(), Phase::Editing);
    }

    #[test]
    fn test_busy_rejects_new_operations() {
        let (mut state, _) = with_first_version();
        state.begin_edit().unwrap();

        assert_eq!(
            state.begin_generation(&tshirt()),
            Err(SessionError::Busy { phase: Phase::Editing })
        );
        assert!(matches!(
            state.begin_edit(),
            Err(SessionError::Busy { phase: Phase::Editing })
        ));
    }

    #[test]
    fn test_fail_keeps_history_and_uses_fallback_message() {
        let (mut state, v1) = with_first_version();
        state.begin_edit().unwrap();
        state.fail("   ");

        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.last_error(), Some("Failed to edit image."));
        assert_eq!(state.history_len(), 1);
        assert_eq!(state.current_version(), Some(&v1));

        state.begin_generation(&tshirt()).unwrap();
        state.fail("");
        assert_eq!(state.last_error(), Some("Failed to generate mockup."));
    }

    #[test]
    fn test_select_version_any_phase() {
        let (mut state, v1) = with_first_version();
        state.begin_edit().unwrap();
        let v2 = state.complete(image("v2"), "make it blue".to_string());

        state.begin_edit().unwrap();
        let selected = state.select_version(v1.id).unwrap().clone();
        assert_eq!(selected, v1);
        assert_eq!(state.phase(), Phase::Editing);
        assert_eq!(state.history_len(), 2);
        assert_eq!(state.history().next().map(|v| v.id), Some(v2.id));
    }

    #[test]
    fn test_select_unknown_version() {
        let (mut state, v1) = with_first_version();
        let missing = Uuid::new_v4();
        assert_eq!(
            state.select_version(missing).map(|v| v.id),
            Err(SessionError::VersionNotFound(missing))
        );
        assert_eq!(state.current_version(), Some(&v1));
    }

    #[test]
    fn test_export() {
        let state = SessionState::new();
        assert_eq!(state.export(), Err(SessionError::NoCurrentVersion));

        let (state, v1) = with_first_version();
        assert_eq!(state.export().unwrap(), v1.image);
        assert_eq!(state.export().unwrap(), state.export().unwrap());
    }

    #[test]
    fn test_upload_logo_does_not_touch_workflow() {
        let (mut state, v1) = with_first_version();
        state.begin_edit().unwrap();
        state.upload_logo(LogoAsset::new(b"new-logo", "image/jpeg"));

        assert_eq!(state.phase(), Phase::Editing);
        assert_eq!(state.current_version(), Some(&v1));
        assert_eq!(state.history_len(), 1);
        assert_eq!(state.logo().unwrap().image.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let (state, v1) = with_first_version();
        let id = Uuid::new_v4();
        let snapshot = state.snapshot(id);

        assert_eq!(snapshot.session_id, id);
        assert!(snapshot.has_logo);
        assert_eq!(snapshot.current_version_id, Some(v1.id));
        assert_eq!(snapshot.current_image, Some(v1.image.clone()));
        assert_eq!(snapshot.selected_product.map(|p| p.id), Some("tshirt".to_string()));
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].label, "Initial Classic T-Shirt mockup");

        let json = serde_json::to_value(state.snapshot(id)).unwrap();
        assert_eq!(json["phase"], "idle");
        assert!(json["current_image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }
}
