use crate::domain::model::{SectionId, StudentId};
use crate::domain::outcome::DenyReason;
use crate::domain::ports::EnrollmentStore;
use crate::utils::error::Result;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Deny(DenyReason),
}

/// 單一入學規則。只讀取狀態，不做任何變更
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCheck {
    StudentLoadLimit,
    SectionCapacity,
    Prerequisites,
    RestrictionHold,
}

/// 固定的評估順序：先做便宜的數量檢查，再查先修，最後才是行政限制
pub const POLICY_ORDER: [PolicyCheck; 4] = [
    PolicyCheck::StudentLoadLimit,
    PolicyCheck::SectionCapacity,
    PolicyCheck::Prerequisites,
    PolicyCheck::RestrictionHold,
];

/// 規則評估時需要的參數
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest {
    pub student: StudentId,
    pub section: SectionId,
    pub student_course_limit: usize,
}

impl PolicyCheck {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyCheck::StudentLoadLimit => "student_load_limit",
            PolicyCheck::SectionCapacity => "section_capacity",
            PolicyCheck::Prerequisites => "prerequisites",
            PolicyCheck::RestrictionHold => "restriction_hold",
        }
    }

    pub async fn evaluate<S: EnrollmentStore + ?Sized>(
        &self,
        request: &CheckRequest,
        store: &S,
    ) -> Result<Verdict> {
        let verdict = match self {
            PolicyCheck::StudentLoadLimit => {
                let load = store.student_load(request.student).await?;
                if load < request.student_course_limit {
                    Verdict::Continue
                } else {
                    Verdict::Deny(DenyReason::LoadLimitExceeded)
                }
            }
            PolicyCheck::SectionCapacity => {
                let seats = store.section_seats(request.section).await?;
                if seats.is_full() {
                    Verdict::Deny(DenyReason::CapacityExceeded)
                } else {
                    Verdict::Continue
                }
            }
            PolicyCheck::Prerequisites => {
                let course = store.section_course(request.section).await?;
                let prereqs = store.direct_prereqs(course).await?;
                if prereqs.is_empty() {
                    return Ok(Verdict::Continue);
                }
                let satisfied = store.satisfied_courses(request.student).await?;
                let missing: BTreeSet<_> = prereqs.difference(&satisfied).copied().collect();
                if missing.is_empty() {
                    Verdict::Continue
                } else {
                    Verdict::Deny(DenyReason::MissingPrerequisite { missing })
                }
            }
            PolicyCheck::RestrictionHold => {
                if store.is_restricted(request.student).await? {
                    Verdict::Deny(DenyReason::RestrictionHold)
                } else {
                    Verdict::Continue
                }
            }
        };
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::catalog::CatalogBuilder;
    use crate::adapters::memory_store::MemoryStore;
    use crate::domain::model::{CourseId, Quarter};

    async fn fixture() -> (MemoryStore, StudentId, SectionId, CourseId) {
        let store = MemoryStore::new();
        let prereq = CatalogBuilder::new(&store)
            .course(CourseId(1), "51100", "Intro")
            .await
            .course_id()
            .unwrap();
        let built = CatalogBuilder::new(&store)
            .course_with_prereqs(CourseId(2), "51210", "OOP", [prereq])
            .await
            .offering(2020, Quarter::Winter)
            .await
            .section("Ryerson 271", 1)
            .await
            .finish()
            .unwrap();
        let section = built.sections[0];
        let student = StudentId(10);
        store.add_student_named(student, "John", "Doe").await.unwrap();
        (store, student, section, prereq)
    }

    fn request(student: StudentId, section: SectionId) -> CheckRequest {
        CheckRequest {
            student,
            section,
            student_course_limit: 3,
        }
    }

    #[test]
    fn test_policy_order_is_fixed() {
        let names: Vec<_> = POLICY_ORDER.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "student_load_limit",
                "section_capacity",
                "prerequisites",
                "restriction_hold"
            ]
        );
    }

    #[tokio::test]
    async fn test_prerequisite_check_reports_missing_set() {
        let (store, student, section, prereq) = fixture().await;

        let verdict = PolicyCheck::Prerequisites
            .evaluate(&request(student, section), &store)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Deny(DenyReason::MissingPrerequisite {
                missing: [prereq].into_iter().collect()
            })
        );

        store.record_completion(student, prereq).await.unwrap();
        let verdict = PolicyCheck::Prerequisites
            .evaluate(&request(student, section), &store)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Continue);
    }

    #[tokio::test]
    async fn test_checks_do_not_mutate_state() {
        let (store, student, section, _) = fixture().await;
        store.set_restriction(student, true).await.unwrap();

        for check in POLICY_ORDER {
            let _ = check
                .evaluate(&request(student, section), &store)
                .await
                .unwrap();
        }

        assert_eq!(store.student_load(student).await.unwrap(), 0);
        assert_eq!(store.section_seats(section).await.unwrap().enrolled, 0);
    }

    #[tokio::test]
    async fn test_unknown_student_is_an_error_not_a_denial() {
        let (store, _, section, _) = fixture().await;
        let result = PolicyCheck::StudentLoadLimit
            .evaluate(&request(StudentId(999), section), &store)
            .await;
        assert!(result.is_err());
    }
}
