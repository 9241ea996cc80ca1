use crate::core::policy::{CheckRequest, PolicyCheck, Verdict, POLICY_ORDER};
use crate::domain::model::{SectionId, StudentId};
use crate::domain::outcome::{DenyReason, RegistrationOutcome};
use crate::domain::ports::EnrollmentStore;
use crate::utils::error::{EnrollError, Result};

/// 依序執行入學規則，遇到第一個拒絕就停止；全部通過才寫入
///
/// 呼叫端必須已經持有學生與 section 的鎖。
#[derive(Debug, Clone)]
pub struct EligibilityChain {
    checks: Vec<PolicyCheck>,
    student_course_limit: usize,
}

impl EligibilityChain {
    pub fn new(student_course_limit: usize) -> Self {
        Self {
            checks: POLICY_ORDER.to_vec(),
            student_course_limit,
        }
    }

    pub async fn evaluate<S: EnrollmentStore + ?Sized>(
        &self,
        student: StudentId,
        section: SectionId,
        store: &S,
    ) -> Result<RegistrationOutcome> {
        let request = CheckRequest {
            student,
            section,
            student_course_limit: self.student_course_limit,
        };

        for check in &self.checks {
            match check.evaluate(&request, store).await? {
                Verdict::Continue => {
                    tracing::trace!("check {} passed for student {}", check.name(), student);
                }
                Verdict::Deny(reason) => {
                    tracing::debug!(
                        "check {} denied student {} for section {}: {}",
                        check.name(),
                        student,
                        section,
                        reason
                    );
                    return Ok(RegistrationOutcome::Denied { reason });
                }
            }
        }

        // 儲存層的約束是最後一道防線，違反時轉成對應的拒絕原因
        let reason = match store.commit_enroll(student, section).await {
            Ok(()) => return Ok(RegistrationOutcome::Admitted),
            Err(EnrollError::DuplicateEnrollment { .. }) => DenyReason::AlreadyEnrolled,
            Err(EnrollError::LoadLimitViolation { .. }) => DenyReason::LoadLimitExceeded,
            Err(EnrollError::CapacityViolation { .. }) => DenyReason::CapacityExceeded,
            Err(e) => return Err(e),
        };
        tracing::debug!(
            "commit of student {} to section {} rejected by store: {}",
            student,
            section,
            reason
        );
        Ok(RegistrationOutcome::Denied { reason })
    }
}
