pub mod chain;
pub mod locks;
pub mod modification;
pub mod policy;
pub mod registration;

pub use crate::domain::model::{SectionId, StudentId, STUDENT_COURSE_LIMIT};
pub use crate::domain::outcome::{DenyReason, DropOutcome, RegistrationOutcome, SwapOutcome};
pub use crate::domain::ports::{EnrollmentStore, SettingsProvider};
pub use crate::utils::error::Result;
