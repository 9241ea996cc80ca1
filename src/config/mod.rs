pub mod toml_config;

use crate::domain::model::{DEFAULT_SECTION_SIZE, STUDENT_COURSE_LIMIT};
use crate::domain::ports::SettingsProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use toml_config::TomlConfig;

/// 鎖等待上限的允許範圍（毫秒）
pub const MAX_LOCK_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSettings {
    #[serde(default = "default_student_course_limit")]
    pub student_course_limit: usize,
    #[serde(default = "default_section_size")]
    pub default_section_size: usize,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_student_course_limit() -> usize {
    STUDENT_COURSE_LIMIT
}
fn default_section_size() -> usize {
    DEFAULT_SECTION_SIZE
}
fn default_lock_timeout_ms() -> u64 {
    5_000
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            student_course_limit: default_student_course_limit(),
            default_section_size: default_section_size(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl SettingsProvider for RegistrationSettings {
    fn student_course_limit(&self) -> usize {
        self.student_course_limit
    }

    fn default_section_size(&self) -> usize {
        self.default_section_size
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Validate for RegistrationSettings {
    fn validate(&self) -> Result<()> {
        validate_positive_number("settings.student_course_limit", self.student_course_limit, 1)?;
        validate_positive_number("settings.default_section_size", self.default_section_size, 1)?;
        validate_range(
            "settings.lock_timeout_ms",
            self.lock_timeout_ms,
            1,
            MAX_LOCK_TIMEOUT_MS,
        )
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "regie-enroll")]
#[command(about = "Course registration eligibility engine")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "regie.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the run.concurrent setting from config
    #[arg(long)]
    pub concurrent: Option<bool>,

    /// Override the roster CSV output path
    #[arg(long)]
    pub roster_output: Option<String>,

    /// Validate and show the request script without executing it
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_registration_policy() {
        let settings = RegistrationSettings::default();
        assert_eq!(settings.student_course_limit, 3);
        assert_eq!(settings.default_section_size, 30);
        assert_eq!(settings.lock_timeout(), Duration::from_secs(5));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let settings = RegistrationSettings {
            lock_timeout_ms: 0,
            ..RegistrationSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
