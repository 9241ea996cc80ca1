use crate::core::registration::{store_failure, RegistrationService};
use crate::domain::model::{SectionId, StudentId};
use crate::domain::outcome::{DenyReason, DropOutcome, RegistrationOutcome, SwapOutcome};
use crate::domain::ports::EnrollmentStore;
use std::time::Duration;

/// 建立在 RegistrationService 之上的退選與換課
///
/// Swap 由三個各自加鎖的交易組成：drop、register、必要時補償性的 register。
/// 因此補償也可能失敗，這個結果會原樣回傳給呼叫端。
pub struct RegistrationModifier<S: EnrollmentStore> {
    service: RegistrationService<S>,
}

impl<S: EnrollmentStore> Clone for RegistrationModifier<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<S: EnrollmentStore> RegistrationModifier<S> {
    pub fn new(service: RegistrationService<S>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &RegistrationService<S> {
        &self.service
    }

    pub async fn drop_course(&self, student: StudentId, section: SectionId) -> DropOutcome {
        self.drop_with_timeout(student, section, self.service.lock_timeout())
            .await
    }

    pub async fn drop_with_timeout(
        &self,
        student: StudentId,
        section: SectionId,
        timeout: Duration,
    ) -> DropOutcome {
        let _guard = match self
            .service
            .locks()
            .acquire_pair(student, section, timeout)
            .await
        {
            Ok(guard) => guard,
            Err(_) => return DropOutcome::from(DenyReason::Timeout),
        };

        let store = self.service.store();
        let outcome = match store.is_enrolled(student, section).await {
            Ok(false) => DropOutcome::from(DenyReason::NotEnrolled),
            Ok(true) => match store.commit_unenroll(student, section).await {
                Ok(()) => DropOutcome::Dropped,
                Err(e) => DropOutcome::from(store_failure(e)),
            },
            Err(e) => DropOutcome::from(store_failure(e)),
        };

        match &outcome {
            DropOutcome::Dropped => {
                tracing::debug!("student {} dropped section {}", student, section);
            }
            DropOutcome::Denied { reason } => {
                tracing::info!(
                    "🚫 drop of section {} by student {} denied: {}",
                    section,
                    student,
                    reason
                );
            }
        }
        outcome
    }

    pub async fn swap_course(
        &self,
        student: StudentId,
        section_to_add: SectionId,
        section_to_drop: SectionId,
    ) -> SwapOutcome {
        self.swap_with_timeout(
            student,
            section_to_add,
            section_to_drop,
            self.service.lock_timeout(),
        )
        .await
    }

    pub async fn swap_with_timeout(
        &self,
        student: StudentId,
        section_to_add: SectionId,
        section_to_drop: SectionId,
        timeout: Duration,
    ) -> SwapOutcome {
        // 1. 先退選；學生本來就沒選這門課時照樣繼續
        let dropped = match self.drop_with_timeout(student, section_to_drop, timeout).await {
            DropOutcome::Dropped => true,
            DropOutcome::Denied {
                reason: DenyReason::NotEnrolled,
            } => false,
            DropOutcome::Denied { reason } => {
                debug_assert!(reason.aborts_swap());
                return SwapOutcome::Aborted { reason };
            }
        };

        // 2. 加選新 section
        let add_reason = match self
            .service
            .register_with_timeout(student, section_to_add, timeout)
            .await
        {
            RegistrationOutcome::Admitted => return SwapOutcome::Swapped,
            RegistrationOutcome::Denied { reason } => reason,
        };

        if !dropped {
            return SwapOutcome::SwapFailedRestored { reason: add_reason };
        }

        // 3. 補償：重新註冊剛剛退掉的 section
        match self
            .service
            .register_with_timeout(student, section_to_drop, timeout)
            .await
        {
            RegistrationOutcome::Admitted => {
                tracing::info!(
                    "↩️ swap for student {} failed ({}), section {} restored",
                    student,
                    add_reason,
                    section_to_drop
                );
                SwapOutcome::SwapFailedRestored { reason: add_reason }
            }
            RegistrationOutcome::Denied {
                reason: restore_reason,
            } => {
                tracing::error!(
                    "❌ swap for student {} lost section {}: add failed ({}), restore failed ({})",
                    student,
                    section_to_drop,
                    add_reason,
                    restore_reason
                );
                SwapOutcome::SwapFailedUnrestored {
                    add_reason,
                    restore_reason,
                }
            }
        }
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
    use std::sync::Arc;

    async fn modifier(sizes: &[usize]) -> (RegistrationModifier<MemoryStore>, Vec<SectionId>) {
        let store = MemoryStore::new();
        let mut builder = CatalogBuilder::new(&store)
            .course(CourseId(1), "51210", "OOP")
            .await
            .offering(2020, Quarter::Winter)
            .await;
        for (i, size) in sizes.iter().enumerate() {
            builder = builder.section(&format!("Ryerson {}", 270 + i), *size).await;
        }
        let sections = builder.finish().unwrap().sections;
        store.add_student_named(StudentId(1), "John", "Doe").await.unwrap();
        store.add_student_named(StudentId(2), "Mark", "Antony").await.unwrap();
        let service = RegistrationService::new(Arc::new(store), &RegistrationSettings::default());
        (RegistrationModifier::new(service), sections)
    }

    #[tokio::test]
    async fn test_drop_twice_is_dropped_then_not_enrolled() {
        let (modifier, sections) = modifier(&[30]).await;
        modifier.service().register(StudentId(1), sections[0]).await;

        assert_eq!(
            modifier.drop_course(StudentId(1), sections[0]).await,
            DropOutcome::Dropped
        );
        assert_eq!(
            modifier.drop_course(StudentId(1), sections[0]).await,
            DropOutcome::from(DenyReason::NotEnrolled)
        );
    }

    #[tokio::test]
    async fn test_swap_with_absent_drop_side_skips_compensation() {
        let (modifier, sections) = modifier(&[1, 30]).await;
        modifier.service().register(StudentId(2), sections[0]).await;

        // 學生 1 沒選 sections[1]，加選已滿的 sections[0]
        let outcome = modifier
            .swap_course(StudentId(1), sections[0], sections[1])
            .await;

        assert_eq!(
            outcome,
            SwapOutcome::SwapFailedRestored {
                reason: DenyReason::CapacityExceeded
            }
        );
        let held = modifier
            .service()
            .store()
            .enrolled_sections(StudentId(1))
            .await
            .unwrap();
        assert!(held.is_empty());
    }

    #[tokio::test]
    async fn test_swap_aborts_when_drop_times_out() {
        let (modifier, sections) = modifier(&[30, 30]).await;
        modifier.service().register(StudentId(1), sections[1]).await;
        let _held = modifier
            .service()
            .locks()
            .acquire(&[ResourceKey::Section(sections[1])], Duration::from_millis(50))
            .await
            .unwrap();

        let outcome = modifier
            .swap_with_timeout(StudentId(1), sections[0], sections[1], Duration::from_millis(10))
            .await;

        assert_eq!(
            outcome,
            SwapOutcome::Aborted {
                reason: DenyReason::Timeout
            }
        );
    }
}
