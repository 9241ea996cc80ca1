use crate::domain::model::{SectionId, StudentId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 閒置鎖超過這個數量時清理
const PRUNE_THRESHOLD: usize = 1024;

/// 可以被鎖定的共享資源。排序即是全域的取鎖順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKey {
    Student(StudentId),
    Section(SectionId),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Student(id) => write!(f, "student:{}", id),
            ResourceKey::Section(id) => write!(f, "section:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout {
    pub waited: Duration,
}

/// 已取得的一組鎖，drop 時一併釋放
#[derive(Debug)]
pub struct LockSet {
    keys: Vec<ResourceKey>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn keys(&self) -> &[ResourceKey] {
        &self.keys
    }
}

/// 每個學生、每個 section 各一把互斥鎖
#[derive(Debug, Default)]
pub struct LockManager {
    slots: Mutex<HashMap<ResourceKey, Arc<AsyncMutex<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: ResourceKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.len() > PRUNE_THRESHOLD {
            slots.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        slots.entry(key).or_default().clone()
    }

    /// 依全域順序取得所有鎖，整個過程受 timeout 限制
    ///
    /// 逾時的時候，已取得的鎖會隨 future 一起被釋放。
    pub async fn acquire(
        &self,
        keys: &[ResourceKey],
        timeout: Duration,
    ) -> Result<LockSet, LockTimeout> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let slots: Vec<_> = ordered.iter().map(|key| self.slot(*key)).collect();
        let acquire_all = async move {
            let mut guards = Vec::with_capacity(slots.len());
            for slot in slots {
                guards.push(slot.lock_owned().await);
            }
            guards
        };

        match tokio::time::timeout(timeout, acquire_all).await {
            Ok(guards) => Ok(LockSet {
                keys: ordered,
                _guards: guards,
            }),
            Err(_) => {
                tracing::warn!(
                    "⏱️ lock acquisition timed out after {:?} for {:?}",
                    timeout,
                    ordered
                );
                Err(LockTimeout { waited: timeout })
            }
        }
    }

    pub async fn acquire_pair(
        &self,
        student: StudentId,
        section: SectionId,
        timeout: Duration,
    ) -> Result<LockSet, LockTimeout> {
        self.acquire(
            &[ResourceKey::Section(section), ResourceKey::Student(student)],
            timeout,
        )
        .await
    }

    pub fn tracked_resources(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
