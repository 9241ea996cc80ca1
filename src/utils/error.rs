use crate::domain::model::{CourseId, OfferingId, SectionId, StudentId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("Student {0} not found")]
    StudentNotFound(StudentId),

    #[error("Section {0} not found")]
    SectionNotFound(SectionId),

    #[error("Course {0} not found")]
    CourseNotFound(CourseId),

    #[error("Course offering {0} not found")]
    OfferingNotFound(OfferingId),

    #[error("Student {student} is already enrolled in section {section}")]
    DuplicateEnrollment {
        student: StudentId,
        section: SectionId,
    },

    #[error("Student {student} is not enrolled in section {section}")]
    MembershipMissing {
        student: StudentId,
        section: SectionId,
    },

    #[error("Student {student} already holds {limit} sections")]
    LoadLimitViolation { student: StudentId, limit: usize },

    #[error("Section {section} is at its size limit of {size_limit}")]
    CapacityViolation { section: SectionId, size_limit: usize },

    #[error("Duplicate catalog entry: {message}")]
    DuplicateEntry { message: String },

    #[error("Store failure: {message}")]
    StoreError { message: String },

    #[error("Request task failed: {message}")]
    TaskError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Catalog,
    Constraint,
    Store,
    Io,
    Configuration,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EnrollError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EnrollError::StudentNotFound(_)
            | EnrollError::SectionNotFound(_)
            | EnrollError::CourseNotFound(_)
            | EnrollError::OfferingNotFound(_)
            | EnrollError::DuplicateEntry { .. } => ErrorCategory::Catalog,
            EnrollError::DuplicateEnrollment { .. }
            | EnrollError::MembershipMissing { .. }
            | EnrollError::LoadLimitViolation { .. }
            | EnrollError::CapacityViolation { .. } => ErrorCategory::Constraint,
            EnrollError::StoreError { .. } => ErrorCategory::Store,
            EnrollError::TaskError { .. } => ErrorCategory::Runtime,
            EnrollError::IoError(_)
            | EnrollError::CsvError(_)
            | EnrollError::SerializationError(_) => ErrorCategory::Io,
            EnrollError::ConfigValidationError { .. }
            | EnrollError::InvalidConfigValueError { .. }
            | EnrollError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Constraint => ErrorSeverity::Low,
            ErrorCategory::Catalog => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Io => ErrorSeverity::High,
            ErrorCategory::Store | ErrorCategory::Runtime => ErrorSeverity::Critical,
        }
    }

    /// 是否可以安全重試
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnrollError::StoreError { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Catalog => "Check that the student, section and course ids exist in the catalog",
            ErrorCategory::Constraint => "Refresh the roster and retry the request",
            ErrorCategory::Store => "Check the enrollment store connectivity and retry",
            ErrorCategory::Io => "Check file paths and permissions",
            ErrorCategory::Configuration => "Fix the configuration file and run again",
            ErrorCategory::Runtime => "Re-run the batch; requests already applied are reported in the roster",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Io => format!("File operation failed: {}", self),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EnrollError>;
