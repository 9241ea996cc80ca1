use crate::core::chain::EligibilityChain;
use crate::core::locks::LockManager;
use crate::domain::model::{SectionId, StudentId};
use crate::domain::outcome::{DenyReason, RegistrationOutcome};
use crate::domain::ports::{EnrollmentStore, SettingsProvider};
use crate::utils::error::EnrollError;
use std::sync::Arc;
use std::time::Duration;

/// 儲存層錯誤轉成拒絕原因，不會被吞掉
pub(crate) fn store_failure(error: EnrollError) -> DenyReason {
    tracing::error!("❌ enrollment store failure: {}", error);
    DenyReason::StoreFailure {
        message: error.to_string(),
    }
}

/// 在鎖保護下執行入學規則鏈
///
/// 同一個儲存層上的多個 service 應透過 `with_locks` 共用同一張鎖表。
pub struct RegistrationService<S: EnrollmentStore> {
    store: Arc<S>,
    locks: Arc<LockManager>,
    chain: EligibilityChain,
    lock_timeout: Duration,
}

impl<S: EnrollmentStore> Clone for RegistrationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            chain: self.chain.clone(),
            lock_timeout: self.lock_timeout,
        }
    }
}

impl<S: EnrollmentStore> RegistrationService<S> {
    pub fn new<C: SettingsProvider>(store: Arc<S>, settings: &C) -> Self {
        Self::with_locks(store, Arc::new(LockManager::new()), settings)
    }

    pub fn with_locks<C: SettingsProvider>(
        store: Arc<S>,
        locks: Arc<LockManager>,
        settings: &C,
    ) -> Self {
        Self {
            store,
            locks,
            chain: EligibilityChain::new(settings.student_course_limit()),
            lock_timeout: settings.lock_timeout(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// 鎖表的共享 handle，用來建立共用鎖的其他 service
    pub fn shared_locks(&self) -> Arc<LockManager> {
        Arc::clone(&self.locks)
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub async fn register(&self, student: StudentId, section: SectionId) -> RegistrationOutcome {
        self.register_with_timeout(student, section, self.lock_timeout)
            .await
    }

    /// 從取鎖到寫入都持有學生與 section 的鎖，檢查與寫入不可分割
    pub async fn register_with_timeout(
        &self,
        student: StudentId,
        section: SectionId,
        timeout: Duration,
    ) -> RegistrationOutcome {
        let _guard = match self.locks.acquire_pair(student, section, timeout).await {
            Ok(guard) => guard,
            Err(_) => return RegistrationOutcome::from(DenyReason::Timeout),
        };

        let outcome = match self.chain.evaluate(student, section, self.store.as_ref()).await {
            Ok(outcome) => outcome,
            Err(e) => RegistrationOutcome::from(store_failure(e)),
        };

        match &outcome {
            RegistrationOutcome::Admitted => {
                tracing::debug!("✅ student {} admitted to section {}", student, section);
            }
            RegistrationOutcome::Denied { reason } => {
                tracing::info!(
                    "🚫 student {} denied section {}: {}",
                    student,
                    section,
                    reason
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::catalog::CatalogBuilder;
    use crate::adapters::memory_store::MemoryStore;
    use crate::config::RegistrationSettings;
    use crate::core::locks::ResourceKey;
    use crate::domain::model::{CourseId, Quarter};

    async fn service() -> (RegistrationService<MemoryStore>, SectionId) {
        let store = MemoryStore::new();
        let built = CatalogBuilder::new(&store)
            .course(CourseId(1), "51210", "OOP")
            .await
            .offering(2020, Quarter::Winter)
            .await
            .section("Ryerson 271", 30)
            .await
            .finish()
            .unwrap();
        store.add_student_named(StudentId(1), "John", "Doe").await.unwrap();
        let section = built.sections[0];
        let settings = RegistrationSettings::default();
        (RegistrationService::new(Arc::new(store), &settings), section)
    }

    #[tokio::test]
    async fn test_register_admits_eligible_student() {
        let (service, section) = service().await;
        let outcome = service.register(StudentId(1), section).await;
        assert!(outcome.is_admitted());
    }

    #[tokio::test]
    async fn test_register_times_out_without_mutation() {
        let (service, section) = service().await;
        let _held = service
            .locks()
            .acquire(&[ResourceKey::Section(section)], Duration::from_millis(50))
            .await
            .unwrap();

        let outcome = service
            .register_with_timeout(StudentId(1), section, Duration::from_millis(10))
            .await;

        assert_eq!(outcome.deny_reason(), Some(&DenyReason::Timeout));
        assert_eq!(service.store().student_load(StudentId(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_section_surfaces_store_failure() {
        let (service, _) = service().await;
        let outcome = service.register(StudentId(1), SectionId(404)).await;
        match outcome.deny_reason() {
            Some(DenyReason::StoreFailure { message }) => {
                assert!(message.contains("404"));
            }
            other => panic!("expected store failure, got {:?}", other),
        }
    }
}
