//! Student data store abstraction
//!
//! Persists profiles, progress logs and every learning path version.
//! The in-memory implementation backs tests and single-process use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::error::{PathwayError, Result};
use crate::path::LearningPath;
use crate::profile::{ProgressEvent, StudentProfile};
use crate::types::{PathId, StudentId};

/// Storage trait for student data (allows test mocks)
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Load a profile; `ProfileNotFound` if the student is unknown
    async fn load_profile(&self, student: &StudentId) -> Result<StudentProfile>;

    /// Insert or replace a profile
    async fn save_profile(&self, profile: &StudentProfile) -> Result<()>;

    /// Append one event to the student's progress log
    async fn append_progress_event(&self, student: &StudentId, event: &ProgressEvent) -> Result<()>;

    /// Full progress log, oldest first
    async fn progress_log(&self, student: &StudentId) -> Result<Vec<ProgressEvent>>;

    /// Store a path version.
    ///
    /// Saving a path id that already exists updates that version in place;
    /// a new id is appended to the history and becomes the latest version.
    async fn save_path(&self, path: &LearningPath) -> Result<()>;

    /// Latest path version, unless it is completed or abandoned
    async fn load_active_path(&self, student: &StudentId) -> Result<Option<LearningPath>>;

    /// Every stored path version, oldest first
    async fn path_history(&self, student: &StudentId) -> Result<Vec<LearningPath>>;
}

#[derive(Default)]
struct StudentRecord {
    profile: Option<StudentProfile>,
    events: Vec<ProgressEvent>,
    /// Insertion order is version order
    paths: IndexMap<PathId, LearningPath>,
}

/// In-memory storage for testing
pub struct InMemoryStudentStore {
    records: Arc<RwLock<HashMap<StudentId, StudentRecord>>>,
}

impl InMemoryStudentStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStudentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StudentStore for InMemoryStudentStore {
    async fn load_profile(&self, student: &StudentId) -> Result<StudentProfile> {
        let records = self.records.read().await;
        records
            .get(student)
            .and_then(|record| record.profile.clone())
            .ok_or_else(|| PathwayError::ProfileNotFound(student.clone()))
    }

    async fn save_profile(&self, profile: &StudentProfile) -> Result<()> {
        let mut records = self.records.write().await;
        records.entry(profile.student_id.clone()).or_default().profile = Some(profile.clone());
        Ok(())
    }

    async fn append_progress_event(&self, student: &StudentId, event: &ProgressEvent) -> Result<()> {
        let mut records = self.records.write().await;
        records.entry(student.clone()).or_default().events.push(event.clone());
        Ok(())
    }

    async fn progress_log(&self, student: &StudentId) -> Result<Vec<ProgressEvent>> {
        let records = self.records.read().await;
        Ok(records.get(student).map(|r| r.events.clone()).unwrap_or_default())
    }

    async fn save_path(&self, path: &LearningPath) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.entry(path.student_id.clone()).or_default();
        record.paths.insert(path.id, path.clone());
        Ok(())
    }

    async fn load_active_path(&self, student: &StudentId) -> Result<Option<LearningPath>> {
        let records = self.records.read().await;
        Ok(records
            .get(student)
            .and_then(|r| r.paths.last())
            .map(|(_, path)| path)
            .filter(|path| !path.state.is_closed())
            .cloned())
    }

    async fn path_history(&self, student: &StudentId) -> Result<Vec<LearningPath>> {
        let records = self.records.read().await;
        Ok(records
            .get(student)
            .map(|r| r.paths.values().cloned().collect())
            .unwrap_or_default())
    }
}
