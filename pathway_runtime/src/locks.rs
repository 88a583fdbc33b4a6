//! Per-student write locks
//!
//! Generation and re-planning for one student must not overlap. Each
//! student id gets its own `tokio::sync::Mutex`, created on first use, so
//! requests for different students never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use pathway_core::StudentId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed lock table, one mutex per student.
#[derive(Clone, Default)]
pub struct StudentLocks {
    table: Arc<Mutex<HashMap<StudentId, Arc<Mutex<()>>>>>,
}

impl StudentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `student`.
    ///
    /// The guard releases the student when dropped.
    pub async fn lock(&self, student: &StudentId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.table.lock().await;
            Arc::clone(table.entry(student.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub async fn prune(&self) -> usize {
        let mut table = self.table.lock().await;
        let before = table.len();
        table.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - table.len()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_student_serializes() {
        let locks = StudentLocks::new();
        let student = StudentId::new("s1");

        let guard = locks.lock(&student).await;
        let waiting = {
            let locks = locks.clone();
            let student = student.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&student).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("second lock should be granted")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_students_do_not_block() {
        let locks = StudentLocks::new();
        let _a = locks.lock(&StudentId::new("a")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&StudentId::new("b"))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = StudentLocks::new();
        let held = locks.lock(&StudentId::new("a")).await;
        drop(locks.lock(&StudentId::new("b")).await);

        assert_eq!(locks.prune().await, 1);
        assert_eq!(locks.len().await, 1);
        drop(held);
        assert_eq!(locks.prune().await, 1);
        assert!(locks.is_empty().await);
    }
}
