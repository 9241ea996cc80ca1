use crate::core::modification::RegistrationModifier;
use crate::domain::model::{SectionId, StudentId};
use crate::domain::outcome::{DropOutcome, RegistrationOutcome, SwapOutcome};
use crate::domain::ports::EnrollmentStore;
use crate::utils::error::{EnrollError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// 腳本中的一筆請求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EnrollmentRequest {
    Register {
        student: StudentId,
        section: SectionId,
    },
    Drop {
        student: StudentId,
        section: SectionId,
    },
    Swap {
        student: StudentId,
        add: SectionId,
        drop: SectionId,
    },
}

impl EnrollmentRequest {
    pub fn student(&self) -> StudentId {
        match self {
            EnrollmentRequest::Register { student, .. }
            | EnrollmentRequest::Drop { student, .. }
            | EnrollmentRequest::Swap { student, .. } => *student,
        }
    }

    pub fn sections(&self) -> Vec<SectionId> {
        match self {
            EnrollmentRequest::Register { section, .. } | EnrollmentRequest::Drop { section, .. } => {
                vec![*section]
            }
            EnrollmentRequest::Swap { add, drop, .. } => vec![*add, *drop],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestOutcome {
    Register(RegistrationOutcome),
    Drop(DropOutcome),
    Swap(SwapOutcome),
    /// 執行請求的任務本身失敗（例如 panic）
    Failed { error: String },
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            RequestOutcome::Register(outcome) => outcome.is_admitted(),
            RequestOutcome::Drop(outcome) => outcome.is_dropped(),
            RequestOutcome::Swap(outcome) => outcome.is_swapped(),
            RequestOutcome::Failed { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestResult {
    pub index: usize,
    pub request: EnrollmentRequest,
    pub outcome: RequestOutcome,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub concurrent: bool,
    pub results: Vec<RequestResult>,
    #[serde(skip)]
    pub duration: Duration,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn denied_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// 換課失敗且無法恢復的請求
    pub fn lost_enrollments(&self) -> Vec<&RequestResult> {
        self.results
            .iter()
            .filter(|r| matches!(&r.outcome, RequestOutcome::Swap(s) if s.lost_enrollment()))
            .collect()
    }
}

/// 依序或並行執行一批請求
pub struct BatchRunner<S: EnrollmentStore + 'static> {
    modifier: RegistrationModifier<S>,
    concurrent: bool,
}

impl<S: EnrollmentStore + 'static> BatchRunner<S> {
    pub fn new(modifier: RegistrationModifier<S>, concurrent: bool) -> Self {
        Self {
            modifier,
            concurrent,
        }
    }

    pub async fn run(&self, requests: Vec<EnrollmentRequest>) -> Result<BatchReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        tracing::info!(
            "🚀 Running {} enrollment requests ({})",
            requests.len(),
            if self.concurrent { "concurrent" } else { "sequential" }
        );

        let results = if self.concurrent {
            self.run_concurrent(requests).await
        } else {
            let mut results = Vec::with_capacity(requests.len());
            for (index, request) in requests.into_iter().enumerate() {
                results.push(execute(&self.modifier, index, request).await);
            }
            results
        };

        let report = BatchReport {
            started_at,
            concurrent: self.concurrent,
            results,
            duration: start_time.elapsed(),
        };

        tracing::info!(
            "✅ Batch finished in {:?}: {} succeeded, {} denied",
            report.duration,
            report.success_count(),
            report.denied_count()
        );
        tracing::debug!(
            "{} lock slots tracked after batch",
            self.modifier.service().locks().tracked_resources()
        );
        Ok(report)
    }

    /// 等待所有任務結束；單一任務失敗只記錄在它自己的結果裡
    async fn run_concurrent(&self, requests: Vec<EnrollmentRequest>) -> Vec<RequestResult> {
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            let modifier = self.modifier.clone();
            let task_request = request.clone();
            let handle = tasks.spawn(async move { execute(&modifier, index, task_request).await });
            pending.insert(handle.id(), (index, request));
        }

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    pending.remove(&id);
                    results.push(result);
                }
                Err(e) => {
                    let error = EnrollError::TaskError {
                        message: e.to_string(),
                    };
                    if let Some((index, request)) = pending.remove(&e.id()) {
                        tracing::error!("❌ request {} failed: {}", index, error);
                        results.push(RequestResult {
                            index,
                            request,
                            outcome: RequestOutcome::Failed {
                                error: error.to_string(),
                            },
                            duration_ms: 0,
                        });
                    }
                }
            }
        }
        results.sort_by_key(|r| r.index);
        results
    }
}

async fn execute<S: EnrollmentStore>(
    modifier: &RegistrationModifier<S>,
    index: usize,
    request: EnrollmentRequest,
) -> RequestResult {
    let start_time = Instant::now();
    let outcome = match &request {
        EnrollmentRequest::Register { student, section } => {
            RequestOutcome::Register(modifier.service().register(*student, *section).await)
        }
        EnrollmentRequest::Drop { student, section } => {
            RequestOutcome::Drop(modifier.drop_course(*student, *section).await)
        }
        EnrollmentRequest::Swap { student, add, drop } => {
            RequestOutcome::Swap(modifier.swap_course(*student, *add, *drop).await)
        }
    };

    RequestResult {
        index,
        request,
        outcome,
        duration_ms: start_time.elapsed().as_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_parse_from_tagged_toml() {
        #[derive(Deserialize)]
        struct Script {
            requests: Vec<EnrollmentRequest>,
        }

        let script: Script = toml::from_str(
            r#"
[[requests]]
op = "register"
student = 1
section = 2

[[requests]]
op = "swap"
student = 1
add = 3
drop = 2
"#,
        )
        .unwrap();

        assert_eq!(
            script.requests,
            vec![
                EnrollmentRequest::Register {
                    student: StudentId(1),
                    section: SectionId(2)
                },
                EnrollmentRequest::Swap {
                    student: StudentId(1),
                    add: SectionId(3),
                    drop: SectionId(2)
                },
            ]
        );
        assert_eq!(script.requests[1].sections(), vec![SectionId(3), SectionId(2)]);
    }
}
