//! Application state for the ingress server.

use std::sync::Arc;

use catwatch_core::ExaminerEvent;
use catwatch_examiner::CategoryExaminer;
use tokio::sync::mpsc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Queue into the examiner's event dispatcher.
    pub events: mpsc::Sender<ExaminerEvent>,
    /// The examiner, for status and the feature switch.
    pub examiner: Arc<CategoryExaminer>,
}

impl AppState {
    /// Creates state feeding `events` and reporting on `examiner`.
    pub fn new(events: mpsc::Sender<ExaminerEvent>, examiner: Arc<CategoryExaminer>) -> Self {
        Self { events, examiner }
    }
}
