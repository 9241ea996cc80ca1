use crate::domain::model::{CourseId, RosterEntry, SeatCount, SectionId, StudentId};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

/// 註冊資料的持久化介面，是學生與 section 關係的唯一真實來源
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// 學生目前註冊的 section 數
    async fn student_load(&self, student: StudentId) -> Result<usize>;

    /// Section 目前人數與上限
    async fn section_seats(&self, section: SectionId) -> Result<SeatCount>;

    async fn section_course(&self, section: SectionId) -> Result<CourseId>;

    async fn direct_prereqs(&self, course: CourseId) -> Result<BTreeSet<CourseId>>;

    /// 可以滿足先修條件的課程：已修畢加上目前正在修的
    async fn satisfied_courses(&self, student: StudentId) -> Result<BTreeSet<CourseId>>;

    async fn is_restricted(&self, student: StudentId) -> Result<bool>;

    async fn is_enrolled(&self, student: StudentId, section: SectionId) -> Result<bool>;

    /// 原子地新增雙向的註冊關係
    async fn commit_enroll(&self, student: StudentId, section: SectionId) -> Result<()>;

    /// 原子地移除雙向的註冊關係
    async fn commit_unenroll(&self, student: StudentId, section: SectionId) -> Result<()>;

    async fn enrolled_sections(&self, student: StudentId) -> Result<BTreeSet<SectionId>>;

    async fn section_roster(&self, section: SectionId) -> Result<BTreeSet<StudentId>>;

    async fn roster_entries(&self) -> Result<Vec<RosterEntry>>;
}

pub trait SettingsProvider: Send + Sync {
    fn student_course_limit(&self) -> usize;
    fn default_section_size(&self) -> usize;
    fn lock_timeout(&self) -> Duration;
}
