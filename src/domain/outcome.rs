use crate::domain::model::CourseId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 拒絕原因，所有失敗都以資料值回傳給呼叫端
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    LoadLimitExceeded,
    CapacityExceeded,
    MissingPrerequisite { missing: BTreeSet<CourseId> },
    RestrictionHold,
    NotEnrolled,
    AlreadyEnrolled,
    Timeout,
    StoreFailure { message: String },
}

impl DenyReason {
    /// 沒有發生任何變更，呼叫端可以直接重試
    pub fn is_retryable(&self) -> bool {
        matches!(self, DenyReason::Timeout | DenyReason::StoreFailure { .. })
    }

    /// Drop 步驟遇到這些原因時，swap 不能繼續
    pub(crate) fn aborts_swap(&self) -> bool {
        self.is_retryable()
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::LoadLimitExceeded => write!(f, "student course limit reached"),
            DenyReason::CapacityExceeded => write!(f, "section is full"),
            DenyReason::MissingPrerequisite { missing } => {
                let ids: Vec<String> = missing.iter().map(|c| c.to_string()).collect();
                write!(f, "missing prerequisites: {}", ids.join(", "))
            }
            DenyReason::RestrictionHold => write!(f, "student has a restriction hold"),
            DenyReason::NotEnrolled => write!(f, "student is not enrolled in the section"),
            DenyReason::AlreadyEnrolled => write!(f, "student is already enrolled in the section"),
            DenyReason::Timeout => write!(f, "timed out waiting for enrollment locks"),
            DenyReason::StoreFailure { message } => write!(f, "store failure: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Admitted,
    Denied { reason: DenyReason },
}

impl RegistrationOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RegistrationOutcome::Admitted)
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            RegistrationOutcome::Admitted => None,
            RegistrationOutcome::Denied { reason } => Some(reason),
        }
    }
}

impl From<DenyReason> for RegistrationOutcome {
    fn from(reason: DenyReason) -> Self {
        RegistrationOutcome::Denied { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DropOutcome {
    Dropped,
    Denied { reason: DenyReason },
}

impl DropOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, DropOutcome::Dropped)
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            DropOutcome::Dropped => None,
            DropOutcome::Denied { reason } => Some(reason),
        }
    }
}

impl From<DenyReason> for DropOutcome {
    fn from(reason: DenyReason) -> Self {
        DropOutcome::Denied { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwapOutcome {
    Swapped,
    /// 新增失敗，原 section 已恢復
    SwapFailedRestored { reason: DenyReason },
    /// 新增失敗且無法恢復：學生兩個 section 都沒有
    SwapFailedUnrestored {
        add_reason: DenyReason,
        restore_reason: DenyReason,
    },
    /// Drop 步驟逾時或儲存失敗，未做任何變更
    Aborted { reason: DenyReason },
}

impl SwapOutcome {
    pub fn is_swapped(&self) -> bool {
        matches!(self, SwapOutcome::Swapped)
    }

    /// 學生失去了原本的註冊
    pub fn lost_enrollment(&self) -> bool {
        matches!(self, SwapOutcome::SwapFailedUnrestored { .. })
    }
}
