//! Mockup session orchestration
//!
//! Wraps `SessionState` in a mutex and drives the generation backend. The
//! phase check and the phase write happen under one lock acquisition, so two
//! callers can never both observe `Idle` and both start a call. The lock is
//! never held across an await.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{ImageData, LogoAsset, MockupVersion, Product};
use crate::providers::{GenerationError, GenerationResult, GenerationService};
use super::error::SessionError;
use super::state::{SessionSnapshot, SessionState};

/// One user's mockup workflow
pub struct MockupSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    state: Arc<Mutex<SessionState>>,
    generator: Arc<dyn GenerationService>,
    last_active: Mutex<Instant>,
}

impl std::fmt::Debug for MockupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockupSession")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl MockupSession {
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        MockupSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: Arc::new(Mutex::new(SessionState::new())),
            generator,
            last_active: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Mark the session as used now
    pub fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    /// Time since the last `touch` as seen from `now`
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_active.lock())
    }

    /// A generation or edit call is outstanding
    pub fn is_busy(&self) -> bool {
        self.state.lock().phase().is_busy()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().snapshot(self.id)
    }

    /// Replace the logo. Never suspends and never disturbs an outstanding call.
    pub fn upload_logo(&self, bytes: &[u8], mime_type: &str) {
        let logo = LogoAsset::new(bytes, mime_type);
        info!(session_id = %self.id, mime_type = %mime_type, bytes = bytes.len(), "Logo uploaded");
        self.state.lock().upload_logo(logo);
    }

    /// Generate the initial mockup of the logo on `product`
    pub async fn select_product(&self, product: &Product) -> Result<MockupVersion, SessionError> {
        let logo = self.state.lock().begin_generation(product)?;

        info!(session_id = %self.id, product_id = %product.id, "Generating mockup");

        let generator = self.generator.clone();
        let prompt = product.prompt.clone();
        let label = MockupVersion::initial_label(product);

        self.settle(label, async move { generator.generate(&logo, &prompt).await })
            .await
    }

    /// Apply a free-text edit to the current version
    ///
    /// Callers validate that `instruction` is non-blank before calling.
    pub async fn submit_edit(&self, instruction: &str) -> Result<MockupVersion, SessionError> {
        let inputs = self.state.lock().begin_edit()?;

        info!(session_id = %self.id, instruction = %instruction, "Editing mockup");

        let generator = self.generator.clone();
        let text = instruction.to_string();

        self.settle(instruction.to_string(), async move {
            generator
                .edit(&inputs.base_image, &text, inputs.reference_logo.as_ref())
                .await
        })
        .await
    }

    /// Point the session at an earlier version. Valid in any phase.
    pub fn select_version(&self, version_id: Uuid) -> Result<MockupVersion, SessionError> {
        let mut state = self.state.lock();
        let version = state.select_version(version_id)?.clone();
        info!(session_id = %self.id, version_id = %version_id, "Selected history version");
        Ok(version)
    }

    /// The current version's image
    pub fn export(&self) -> Result<ImageData, SessionError> {
        self.state.lock().export()
    }

    /// Run the backend call on its own task and settle the state from there.
    ///
    /// The outcome is written back even if the awaiting caller goes away, so
    /// the session cannot be left stuck in a busy phase. A panicking backend
    /// counts as a failed call.
    async fn settle<F>(&self, label: String, call: F) -> Result<MockupVersion, SessionError>
    where
        F: std::future::Future<Output = GenerationResult<ImageData>> + Send + 'static,
    {
        let state = self.state.clone();
        let session_id = self.id;

        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(call)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(GenerationError::Internal("generation backend panicked".to_string())))
                // An image without payload would become a blank history entry
                .and_then(|image| {
                    if image.is_empty() {
                        Err(GenerationError::EmptyResponse(None))
                    } else {
                        Ok(image)
                    }
                });

            let mut state = state.lock();
            match outcome {
                Ok(image) => {
                    let version = state.complete(image, label);
                    info!(
                        session_id = %session_id,
                        version_id = %version.id,
                        history_len = state.history_len(),
                        "Mockup version created"
                    );
                    Ok(version)
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(session_id = %session_id, error = %message, "Generation failed");
                    state.fail(&message);
                    Err(SessionError::GenerationFailed(
                        state.last_error().unwrap_or_default().to_string(),
                    ))
                }
            }
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                // Only reachable if the runtime is shutting down
                error!(session_id = %session_id, error = %e, "Generation task aborted");
                let mut state = self.state.lock();
                if state.phase().is_busy() {
                    state.fail("Generation was interrupted.");
                }
                Err(SessionError::GenerationFailed("Generation was interrupted.".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    use crate::domain::ProductCatalog;
    use crate::session::Phase;

    /// Scripted backend: returns images named after their inputs, can fail
    /// on demand and can hold calls open until released.
    #[derive(Default)]
    struct FakeGenerator {
        calls: AtomicUsize,
        fail_with: Mutex<Option<String>>,
        gate: Option<Arc<Notify>>,
        seen_logos: Mutex<Vec<Option<ImageData>>>,
    }

    impl FakeGenerator {
        fn gated(gate: Arc<Notify>) -> Self {
            FakeGenerator {
                gate: Some(gate),
                ..Default::default()
            }
        }

        fn fail_next(&self, message: &str) {
            *self.fail_with.lock() = Some(message.to_string());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn respond(&self, tag: String) -> GenerationResult<ImageData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(message) = self.fail_with.lock().take() {
                return Err(GenerationError::ApiError { status: 500, message });
            }
            Ok(ImageData::encode(tag.as_bytes(), "image/png"))
        }
    }

    #[async_trait]
    impl GenerationService for FakeGenerator {
        fn code(&self) -> &'static str {
            "fake"
        }

        async fn generate(&self, logo: &ImageData, prompt: &str) -> GenerationResult<ImageData> {
            self.seen_logos.lock().push(Some(logo.clone()));
            self.respond(format!("generate:{}", prompt)).await
        }

        async fn edit(
            &self,
            base_image: &ImageData,
            instruction: &str,
            reference_logo: Option<&ImageData>,
        ) -> GenerationResult<ImageData> {
            self.seen_logos.lock().push(reference_logo.cloned());
            let base = String::from_utf8(base_image.decode().unwrap()).unwrap();
            self.respond(format!("{}+{}", base, instruction)).await
        }
    }

    struct PanickingGenerator;

    #[async_trait]
    impl GenerationService for PanickingGenerator {
        fn code(&self) -> &'static str {
            "panics"
        }

        async fn generate(&self, _logo: &ImageData, _prompt: &str) -> GenerationResult<ImageData> {
            panic!("backend exploded");
        }

        async fn edit(&self, _: &ImageData, _: &str, _: Option<&ImageData>) -> GenerationResult<ImageData> {
            panic!("backend exploded");
        }
    }

    /// Answers with a well-formed but payload-free image
    struct BlankGenerator;

    #[async_trait]
    impl GenerationService for BlankGenerator {
        fn code(&self) -> &'static str {
            "blank"
        }

        async fn generate(&self, _logo: &ImageData, _prompt: &str) -> GenerationResult<ImageData> {
            Ok(ImageData::encode(&[], "image/png"))
        }

        async fn edit(&self, _: &ImageData, _: &str, _: Option<&ImageData>) -> GenerationResult<ImageData> {
            Ok(ImageData::encode(&[], "image/png"))
        }
    }

    fn product(id: &str) -> Product {
        ProductCatalog::builtin().find(id).cloned().unwrap()
    }

    fn session_with(generator: Arc<FakeGenerator>) -> MockupSession {
        MockupSession::new(generator)
    }

    fn decoded(image: &ImageData) -> String {
        String::from_utf8(image.decode().unwrap()).unwrap()
    }

    async fn wait_for_calls(generator: &FakeGenerator, n: usize) {
        while generator.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_branching_edit_scenario() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());
        session.upload_logo(b"L", "image/png");

        let v1 = assert_ok!(session.select_product(&product("tshirt")).await);
        let snap = session.snapshot();
        assert_eq!(snap.history.iter().map(|h| h.id).collect::<Vec<_>>(), vec![v1.id]);
        assert_eq!(snap.current_version_id, Some(v1.id));
        assert_eq!(v1.instruction, "Initial Classic T-Shirt mockup");

        let v2 = assert_ok!(session.submit_edit("make it blue").await);
        let snap = session.snapshot();
        assert_eq!(snap.history.iter().map(|h| h.id).collect::<Vec<_>>(), vec![v2.id, v1.id]);
        assert_eq!(snap.current_version_id, Some(v2.id));
        assert_eq!(v2.instruction, "make it blue");

        assert_ok!(session.select_version(v1.id));
        let snap = session.snapshot();
        assert_eq!(snap.current_version_id, Some(v1.id));
        assert_eq!(snap.current_image, Some(v1.image.clone()));
        assert_eq!(snap.history.len(), 2);

        let v3 = assert_ok!(session.submit_edit("add stripes").await);
        let snap = session.snapshot();
        assert_eq!(
            snap.history.iter().map(|h| h.id).collect::<Vec<_>>(),
            vec![v3.id, v2.id, v1.id]
        );
        assert_eq!(snap.current_version_id, Some(v3.id));
        // Branches from V1, not V2
        assert_eq!(decoded(&v3.image), format!("{}+add stripes", decoded(&v1.image)));
    }

    #[tokio::test]
    async fn test_select_product_without_logo() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());

        let result = session.select_product(&product("mug")).await;
        assert_eq!(result, Err(SessionError::MissingLogo));

        let snap = session.snapshot();
        assert!(snap.history.is_empty());
        assert!(snap.selected_product.is_none());
        assert!(snap.current_version_id.is_none());
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_generation_preserves_history() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());
        session.upload_logo(b"L", "image/png");
        let v1 = assert_ok!(session.select_product(&product("cap")).await);

        generator.fail_next("quota exhausted");
        let err = assert_err!(session.submit_edit("make it red").await);
        assert!(matches!(err, SessionError::GenerationFailed(ref m) if m.contains("quota exhausted")));

        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.history.len(), 1);
        assert_eq!(snap.current_version_id, Some(v1.id));
        assert!(snap.last_error.as_deref().unwrap().contains("quota exhausted"));

        // A new attempt clears the previous error
        assert_ok!(session.submit_edit("make it green").await);
        assert!(session.snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn test_failed_initial_generation() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());
        session.upload_logo(b"L", "image/png");

        generator.fail_next("network down");
        assert_err!(session.select_product(&product("hoodie")).await);

        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.history.is_empty());
        assert!(snap.current_version_id.is_none());
        assert!(!snap.last_error.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_no_second_call_while_outstanding() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(FakeGenerator::gated(gate.clone()));
        let session = Arc::new(session_with(generator.clone()));
        session.upload_logo(b"L", "image/png");

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.select_product(&product("tshirt")).await })
        };
        wait_for_calls(&generator, 1).await;
        assert_eq!(session.snapshot().phase, Phase::Generating);

        assert_eq!(
            session.submit_edit("make it blue").await,
            Err(SessionError::Busy { phase: Phase::Generating })
        );
        assert_eq!(
            session.select_product(&product("mug")).await,
            Err(SessionError::Busy { phase: Phase::Generating })
        );
        assert_eq!(generator.calls(), 1);

        gate.notify_one();
        assert_ok!(pending.await.unwrap());
        assert_eq!(generator.calls(), 1);
        assert_eq!(session.snapshot().phase, Phase::Idle);
        assert_eq!(session.snapshot().selected_product.unwrap().id, "tshirt");
    }

    #[tokio::test]
    async fn test_logo_upload_during_call_is_isolated() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(FakeGenerator::gated(gate.clone()));
        let session = Arc::new(session_with(generator.clone()));
        session.upload_logo(b"first", "image/png");

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.select_product(&product("mug")).await })
        };
        wait_for_calls(&generator, 1).await;

        session.upload_logo(b"second", "image/png");
        assert_eq!(session.snapshot().phase, Phase::Generating);

        gate.notify_one();
        assert_ok!(pending.await.unwrap());

        let seen = generator.seen_logos.lock().clone();
        assert_eq!(decoded(seen[0].as_ref().unwrap()), "first");
        assert_eq!(decoded(session.snapshot().logo.as_ref().unwrap()), "second");
    }

    #[tokio::test]
    async fn test_dropped_caller_still_settles() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(FakeGenerator::gated(gate.clone()));
        let session = Arc::new(session_with(generator.clone()));
        session.upload_logo(b"L", "image/png");

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.select_product(&product("totebag")).await })
        };
        wait_for_calls(&generator, 1).await;
        pending.abort();
        let _ = pending.await;

        gate.notify_one();
        while session.snapshot().phase != Phase::Idle {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.snapshot().history.len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_backend_returns_to_idle() {
        let session = MockupSession::new(Arc::new(PanickingGenerator));
        session.upload_logo(b"L", "image/png");

        let err = assert_err!(session.select_product(&product("tshirt")).await);
        assert!(matches!(err, SessionError::GenerationFailed(_)));

        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.history.is_empty());
        assert!(snap.last_error.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_blank_image_counts_as_failure() {
        let session = MockupSession::new(Arc::new(BlankGenerator));
        session.upload_logo(b"L", "image/png");

        let err = assert_err!(session.select_product(&product("cap")).await);
        assert!(matches!(err, SessionError::GenerationFailed(_)));

        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.history.is_empty());
        assert!(snap.current_version_id.is_none());
        assert!(snap.last_error.unwrap().contains("No image returned"));
    }

    #[tokio::test]
    async fn test_edit_without_current_version() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());
        session.upload_logo(b"L", "image/png");

        assert_eq!(session.submit_edit("make it blue").await, Err(SessionError::NoCurrentVersion));
        assert_eq!(generator.calls(), 0);
        assert_eq!(session.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_edit_passes_reference_logo() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());
        session.upload_logo(b"L", "image/png");
        assert_ok!(session.select_product(&product("tshirt")).await);
        assert_ok!(session.submit_edit("make it blue").await);

        let seen = generator.seen_logos.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(decoded(seen[1].as_ref().unwrap()), "L");
    }

    #[tokio::test]
    async fn test_export_is_idempotent_and_pure() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());
        assert_eq!(session.export(), Err(SessionError::NoCurrentVersion));

        session.upload_logo(b"L", "image/png");
        let v1 = assert_ok!(session.select_product(&product("tshirt")).await);

        let before = session.snapshot().history;
        let first = assert_ok!(session.export());
        let second = assert_ok!(session.export());
        assert_eq!(first, second);
        assert_eq!(first, v1.image);

        let after = session.snapshot().history;
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].image, after[0].image);
        assert_eq!(before[0].label, after[0].label);
    }

    #[tokio::test]
    async fn test_history_entries_never_change() {
        let generator = Arc::new(FakeGenerator::default());
        let session = session_with(generator.clone());
        session.upload_logo(b"L", "image/png");
        assert_ok!(session.select_product(&product("tshirt")).await);
        let original = session.snapshot().history[0].clone();

        generator.fail_next("boom");
        let _ = session.submit_edit("x").await;
        assert_ok!(session.submit_edit("y").await);
        session.upload_logo(b"M", "image/jpeg");
        assert_ok!(session.select_product(&product("mug")).await);

        let history = session.snapshot().history;
        assert_eq!(history.len(), 3);
        let last = history.last().unwrap();
        assert_eq!(last.id, original.id);
        assert_eq!(last.image, original.image);
        assert_eq!(last.label, original.label);
        assert_eq!(last.created_at, original.created_at);
    }
}
