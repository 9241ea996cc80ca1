pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use crate::adapters::memory_store::MemoryStore;
pub use crate::app::batch::{BatchReport, BatchRunner, EnrollmentRequest, RequestOutcome};
pub use crate::config::{RegistrationSettings, TomlConfig};
pub use crate::core::{modification::RegistrationModifier, registration::RegistrationService};
pub use crate::domain::outcome::{DenyReason, DropOutcome, RegistrationOutcome, SwapOutcome};
pub use crate::utils::error::{EnrollError, Result};
