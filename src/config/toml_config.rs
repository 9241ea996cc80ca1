use crate::adapters::memory_store::MemoryStore;
use crate::app::batch::EnrollmentRequest;
use crate::config::RegistrationSettings;
use crate::domain::model::{
    Course, CourseId, CourseOffering, OfferingId, Section, SectionId, SectionKind, Student,
    StudentId,
};
use crate::domain::ports::{EnrollmentStore, SettingsProvider};
use crate::utils::error::{EnrollError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_reference,
    validate_unique_ids, Validate,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub settings: RegistrationSettings,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub offerings: Vec<CourseOffering>,
    #[serde(default)]
    pub sections: Vec<SectionEntry>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub requests: Vec<EnrollmentRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub concurrent: bool,
    pub roster_output: Option<String>,
}

/// 設定檔中的 section；`size_limit` 省略時使用 `settings.default_section_size`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionEntry {
    pub id: SectionId,
    pub offering: OfferingId,
    #[serde(default)]
    pub kind: SectionKind,
    #[serde(default)]
    pub location: String,
    pub meeting_time: Option<NaiveTime>,
    pub size_limit: Option<usize>,
}

impl SectionEntry {
    fn size_limit<C: SettingsProvider>(&self, settings: &C) -> usize {
        self.size_limit.unwrap_or_else(|| settings.default_section_size())
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnrollError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EnrollError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ROSTER_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EnrollError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        self.settings.validate()?;

        if let Some(path) = &self.run.roster_output {
            validate_path("run.roster_output", path)?;
            validate_file_extension("run.roster_output", path, &["csv"])?;
        }

        validate_unique_ids("courses.id", self.courses.iter().map(|c| c.id))?;
        validate_unique_ids("courses.code", self.courses.iter().map(|c| c.code.as_str()))?;
        validate_unique_ids("offerings.id", self.offerings.iter().map(|o| o.id))?;
        validate_unique_ids("sections.id", self.sections.iter().map(|s| s.id))?;
        validate_unique_ids("students.id", self.students.iter().map(|s| s.id))?;

        let course_ids: HashSet<CourseId> = self.courses.iter().map(|c| c.id).collect();
        let offering_ids: HashSet<OfferingId> = self.offerings.iter().map(|o| o.id).collect();
        let section_ids: HashSet<SectionId> = self.sections.iter().map(|s| s.id).collect();
        let student_ids: HashSet<StudentId> = self.students.iter().map(|s| s.id).collect();

        for course in &self.courses {
            validate_non_empty_string("courses.code", &course.code)?;
            for prereq in &course.prereqs {
                validate_reference("courses.prereqs", prereq, &course_ids)?;
            }
        }
        self.check_prereq_cycles()?;

        for offering in &self.offerings {
            validate_reference("offerings.course", &offering.course, &course_ids)?;
        }

        let mut seeded: BTreeMap<SectionId, usize> = BTreeMap::new();
        for section in &self.sections {
            validate_reference("sections.offering", &section.offering, &offering_ids)?;
            if section.size_limit == Some(0) {
                return Err(EnrollError::InvalidConfigValueError {
                    field: "sections.size_limit".to_string(),
                    value: "0".to_string(),
                    reason: format!("Section {} size limit must be positive", section.id),
                });
            }
        }

        for student in &self.students {
            for course in &student.completed_courses {
                validate_reference("students.completed_courses", course, &course_ids)?;
            }
            for section in &student.enrolled_sections {
                validate_reference("students.enrolled_sections", section, &section_ids)?;
                *seeded.entry(*section).or_default() += 1;
            }
            if student.enrolled_sections.len() > self.settings.student_course_limit {
                return Err(EnrollError::ConfigValidationError {
                    field: "students.enrolled_sections".to_string(),
                    message: format!(
                        "Student {} is seeded with {} sections, limit is {}",
                        student.id,
                        student.enrolled_sections.len(),
                        self.settings.student_course_limit
                    ),
                });
            }
        }

        for section in &self.sections {
            let count = seeded.get(&section.id).copied().unwrap_or(0);
            if count > section.size_limit(&self.settings) {
                return Err(EnrollError::ConfigValidationError {
                    field: "sections.size_limit".to_string(),
                    message: format!(
                        "Section {} is seeded with {} students over its limit",
                        section.id, count
                    ),
                });
            }
        }

        for request in &self.requests {
            validate_reference("requests.student", &request.student(), &student_ids)?;
            for section in request.sections() {
                validate_reference("requests.section", &section, &section_ids)?;
            }
        }

        Ok(())
    }

    /// 先修關係不能有循環
    fn check_prereq_cycles(&self) -> Result<()> {
        self.prereq_order().map(|_| ())
    }

    /// 依先修關係排序課程，先修課排在前面
    fn prereq_order(&self) -> Result<Vec<&Course>> {
        let mut placed: BTreeSet<CourseId> = BTreeSet::new();
        let mut remaining: Vec<&Course> = self.courses.iter().collect();
        let mut ordered = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<&Course>, Vec<&Course>) = remaining
                .into_iter()
                .partition(|c| c.prereqs.iter().all(|p| placed.contains(p)));
            if ready.is_empty() {
                let ids: Vec<String> = blocked.iter().map(|c| c.id.to_string()).collect();
                return Err(EnrollError::ConfigValidationError {
                    field: "courses.prereqs".to_string(),
                    message: format!("Prerequisite cycle among courses: {}", ids.join(", ")),
                });
            }
            placed.extend(ready.iter().map(|c| c.id));
            ordered.extend(ready);
            remaining = blocked;
        }
        Ok(ordered)
    }

    /// 建立並載入記憶體資料庫
    pub async fn build_store(&self) -> Result<MemoryStore> {
        let store = MemoryStore::with_course_limit(self.settings.student_course_limit());

        for course in self.prereq_order()? {
            store.insert_course(course.clone()).await?;
        }
        for offering in &self.offerings {
            store.insert_offering(offering.clone()).await?;
        }
        for entry in &self.sections {
            store
                .insert_section(Section {
                    id: entry.id,
                    offering: entry.offering,
                    kind: entry.kind,
                    location: entry.location.clone(),
                    meeting_time: entry.meeting_time,
                    size_limit: entry.size_limit(&self.settings),
                    enrolled_students: BTreeSet::new(),
                })
                .await?;
        }
        for student in &self.students {
            store.add_student(student.clone()).await?;
            for section in &student.enrolled_sections {
                store.commit_enroll(student.id, *section).await?;
            }
        }

        tracing::debug!(
            "Seeded store with {} courses, {} sections, {} students",
            self.courses.len(),
            self.sections.len(),
            self.students.len()
        );
        Ok(store)
    }

    pub fn roster_output(&self) -> Option<&str> {
        self.run.roster_output.as_deref()
    }

    pub fn is_concurrent(&self) -> bool {
        self.run.concurrent
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[settings]
student_course_limit = 3
lock_timeout_ms = 2000

[[courses]]
id = 1
code = "51100"
name = "Intro"

[[courses]]
id = 2
code = "51210"
name = "OOP"
department = "mpcs"
prereqs = [1]

[[offerings]]
id = 1
course = 2
year = 2020
quarter = "winter"

[[sections]]
id = 1
offering = 1
location = "Ryerson 271"
meeting_time = "17:30:00"

[[sections]]
id = 2
offering = 1
kind = "lab"
location = "Ryerson 272"
size_limit = 1

[[students]]
id = 1
first_name = "John"
last_name = "Doe"
completed_courses = [1]
enrolled_sections = [2]

[[requests]]
op = "register"
student = 1
section = 1
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.settings.lock_timeout_ms, 2000);
        assert_eq!(config.courses[1].prereqs, [CourseId(1)].into_iter().collect());
        assert_eq!(config.sections[1].kind, SectionKind::Lab);
        assert_eq!(config.sections[0].size_limit(&config.settings), 30);
        let narrow = RegistrationSettings {
            default_section_size: 12,
            ..RegistrationSettings::default()
        };
        assert_eq!(config.sections[0].size_limit(&narrow), 12);
        assert_eq!(config.sections[1].size_limit(&narrow), 1);
        assert!(!config.is_concurrent());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("REGIE_TEST_ROSTER", "/tmp/regie-roster.csv");

        let config = TomlConfig::from_toml_str(
            r#"
[run]
roster_output = "${REGIE_TEST_ROSTER}"
"#,
        )
        .unwrap();
        assert_eq!(config.roster_output(), Some("/tmp/regie-roster.csv"));

        std::env::remove_var("REGIE_TEST_ROSTER");
    }

    #[test]
    fn test_unknown_reference_fails_validation() {
        let content = BASIC.replace("enrolled_sections = [2]", "enrolled_sections = [9]");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prereq_cycle_fails_validation() {
        let content = BASIC.replace("name = \"Intro\"", "name = \"Intro\"\nprereqs = [2]");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_overfull_seed_fails_validation() {
        let content = BASIC.replace(
            "[[requests]]",
            "[[students]]\nid = 2\nfirst_name = \"Mark\"\nlast_name = \"Antony\"\nenrolled_sections = [2]\n\n[[requests]]",
        );
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_build_store_seeds_enrollments() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();
        let store = config.build_store().await.unwrap();

        assert_eq!(store.course_limit(), 3);
        assert_eq!(store.student_load(StudentId(1)).await.unwrap(), 1);
        assert!(store.section_seats(SectionId(2)).await.unwrap().is_full());
        assert_eq!(
            store.section(SectionId(1)).await.unwrap().meeting_time,
            NaiveTime::from_hms_opt(17, 30, 0)
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.students[0].first_name, "John");
    }
}
