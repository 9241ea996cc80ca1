use crate::domain::model::{
    Course, CourseId, CourseOffering, OfferingId, RosterEntry, SeatCount, Section, SectionId,
    Student, StudentId, STUDENT_COURSE_LIMIT,
};
use crate::domain::ports::EnrollmentStore;
use crate::utils::error::{EnrollError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    courses: BTreeMap<CourseId, Course>,
    offerings: BTreeMap<OfferingId, CourseOffering>,
    sections: BTreeMap<SectionId, Section>,
    students: BTreeMap<StudentId, Student>,
}

impl Tables {
    fn student(&self, id: StudentId) -> Result<&Student> {
        self.students.get(&id).ok_or(EnrollError::StudentNotFound(id))
    }

    fn section(&self, id: SectionId) -> Result<&Section> {
        self.sections.get(&id).ok_or(EnrollError::SectionNotFound(id))
    }

    fn course_of(&self, section: SectionId) -> Result<CourseId> {
        let offering_id = self.section(section)?.offering;
        self.offerings
            .get(&offering_id)
            .map(|offering| offering.course)
            .ok_or(EnrollError::OfferingNotFound(offering_id))
    }
}

/// 記憶體內的註冊資料庫
///
/// 所有表格放在同一把讀寫鎖後面，寫入時同時更新學生與 section 兩邊，
/// 讀取端永遠看不到只寫了一半的狀態。寫入時會像資料庫約束一樣檢查
/// 重複註冊、學生選課數上限與座位上限。
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    course_limit: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_course_limit(STUDENT_COURSE_LIMIT)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course_limit(course_limit: usize) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            course_limit,
        }
    }

    pub fn course_limit(&self) -> usize {
        self.course_limit
    }

    pub async fn insert_course(&self, course: Course) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.courses.contains_key(&course.id) {
            return Err(EnrollError::DuplicateEntry {
                message: format!("course id {}", course.id),
            });
        }
        if tables.courses.values().any(|c| c.code == course.code) {
            return Err(EnrollError::DuplicateEntry {
                message: format!("course code {}", course.code),
            });
        }
        for prereq in &course.prereqs {
            if *prereq == course.id {
                return Err(EnrollError::ConfigValidationError {
                    field: "prereqs".to_string(),
                    message: format!("course {} cannot be its own prerequisite", course.id),
                });
            }
            if !tables.courses.contains_key(prereq) {
                return Err(EnrollError::CourseNotFound(*prereq));
            }
        }
        tables.courses.insert(course.id, course);
        Ok(())
    }

    pub async fn insert_offering(&self, offering: CourseOffering) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&offering.course) {
            return Err(EnrollError::CourseNotFound(offering.course));
        }
        let same_term = tables.offerings.values().any(|o| {
            o.course == offering.course && o.year == offering.year && o.quarter == offering.quarter
        });
        if same_term || tables.offerings.contains_key(&offering.id) {
            return Err(EnrollError::DuplicateEntry {
                message: format!(
                    "offering of course {} in {:?} {}",
                    offering.course, offering.quarter, offering.year
                ),
            });
        }
        tables.offerings.insert(offering.id, offering);
        Ok(())
    }

    pub async fn insert_section(&self, mut section: Section) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.offerings.contains_key(&section.offering) {
            return Err(EnrollError::OfferingNotFound(section.offering));
        }
        if tables.sections.contains_key(&section.id) {
            return Err(EnrollError::DuplicateEntry {
                message: format!("section id {}", section.id),
            });
        }
        // 名冊只能透過 commit_enroll 建立
        section.enrolled_students.clear();
        tables.sections.insert(section.id, section);
        Ok(())
    }

    pub async fn add_student(&self, mut student: Student) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.students.contains_key(&student.id) {
            return Err(EnrollError::DuplicateEntry {
                message: format!("student id {}", student.id),
            });
        }
        student.enrolled_sections.clear();
        tables.students.insert(student.id, student);
        Ok(())
    }

    pub async fn add_student_named(
        &self,
        id: StudentId,
        first_name: &str,
        last_name: &str,
    ) -> Result<()> {
        self.add_student(Student::new(id, first_name, last_name)).await
    }

    pub async fn set_restriction(&self, student: StudentId, hold: bool) -> Result<()> {
        let mut tables = self.tables.write().await;
        let record = tables
            .students
            .get_mut(&student)
            .ok_or(EnrollError::StudentNotFound(student))?;
        record.restriction_hold = hold;
        Ok(())
    }

    pub async fn record_completion(&self, student: StudentId, course: CourseId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&course) {
            return Err(EnrollError::CourseNotFound(course));
        }
        let record = tables
            .students
            .get_mut(&student)
            .ok_or(EnrollError::StudentNotFound(student))?;
        record.completed_courses.insert(course);
        Ok(())
    }

    pub async fn next_offering_id(&self) -> OfferingId {
        let tables = self.tables.read().await;
        OfferingId(tables.offerings.keys().next_back().map_or(1, |id| id.0 + 1))
    }

    pub async fn next_section_id(&self) -> SectionId {
        let tables = self.tables.read().await;
        SectionId(tables.sections.keys().next_back().map_or(1, |id| id.0 + 1))
    }

    pub async fn section(&self, id: SectionId) -> Result<Section> {
        let tables = self.tables.read().await;
        tables.section(id).cloned()
    }

    pub async fn student(&self, id: StudentId) -> Result<Student> {
        let tables = self.tables.read().await;
        tables.student(id).cloned()
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn student_load(&self, student: StudentId) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.student(student)?.enrolled_sections.len())
    }

    async fn section_seats(&self, section: SectionId) -> Result<SeatCount> {
        let tables = self.tables.read().await;
        let record = tables.section(section)?;
        Ok(SeatCount {
            enrolled: record.enrolled_students.len(),
            size_limit: record.size_limit,
        })
    }

    async fn section_course(&self, section: SectionId) -> Result<CourseId> {
        let tables = self.tables.read().await;
        tables.course_of(section)
    }

    async fn direct_prereqs(&self, course: CourseId) -> Result<BTreeSet<CourseId>> {
        let tables = self.tables.read().await;
        tables
            .courses
            .get(&course)
            .map(|c| c.prereqs.clone())
            .ok_or(EnrollError::CourseNotFound(course))
    }

    async fn satisfied_courses(&self, student: StudentId) -> Result<BTreeSet<CourseId>> {
        let tables = self.tables.read().await;
        let record = tables.student(student)?;
        let mut courses = record.completed_courses.clone();
        for section in &record.enrolled_sections {
            courses.insert(tables.course_of(*section)?);
        }
        Ok(courses)
    }

    async fn is_restricted(&self, student: StudentId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.student(student)?.restriction_hold)
    }

    async fn is_enrolled(&self, student: StudentId, section: SectionId) -> Result<bool> {
        let tables = self.tables.read().await;
        tables.section(section)?;
        Ok(tables.student(student)?.enrolled_sections.contains(&section))
    }

    async fn commit_enroll(&self, student: StudentId, section: SectionId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let held = tables.student(student)?.enrolled_sections.len();
        let record = tables.section(section)?;
        if record.enrolled_students.contains(&student) {
            return Err(EnrollError::DuplicateEnrollment { student, section });
        }
        if held >= self.course_limit {
            return Err(EnrollError::LoadLimitViolation {
                student,
                limit: self.course_limit,
            });
        }
        if !record.has_open_seat() {
            return Err(EnrollError::CapacityViolation {
                section,
                size_limit: record.size_limit,
            });
        }

        if let Some(record) = tables.sections.get_mut(&section) {
            record.enrolled_students.insert(student);
        }
        if let Some(record) = tables.students.get_mut(&student) {
            record.enrolled_sections.insert(section);
        }
        Ok(())
    }

    async fn commit_unenroll(&self, student: StudentId, section: SectionId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.student(student)?;
        if !tables.section(section)?.enrolled_students.contains(&student) {
            return Err(EnrollError::MembershipMissing { student, section });
        }

        if let Some(record) = tables.sections.get_mut(&section) {
            record.enrolled_students.remove(&student);
        }
        if let Some(record) = tables.students.get_mut(&student) {
            record.enrolled_sections.remove(&section);
        }
        Ok(())
    }

    async fn enrolled_sections(&self, student: StudentId) -> Result<BTreeSet<SectionId>> {
        let tables = self.tables.read().await;
        Ok(tables.student(student)?.enrolled_sections.clone())
    }

    async fn section_roster(&self, section: SectionId) -> Result<BTreeSet<StudentId>> {
        let tables = self.tables.read().await;
        Ok(tables.section(section)?.enrolled_students.clone())
    }

    async fn roster_entries(&self) -> Result<Vec<RosterEntry>> {
        let tables = self.tables.read().await;
        let mut entries = Vec::new();
        for student in tables.students.values() {
            for section_id in &student.enrolled_sections {
                let section = tables.section(*section_id)?;
                let course = tables.course_of(*section_id)?;
                let course_code = tables
                    .courses
                    .get(&course)
                    .map(|c| c.code.clone())
                    .ok_or(EnrollError::CourseNotFound(course))?;
                entries.push(RosterEntry {
                    student_id: student.id,
                    section_id: *section_id,
                    course_code,
                    location: section.location.clone(),
                });
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Quarter, SectionKind};

    async fn seeded(size_limit: usize) -> MemoryStore {
        seed_into(MemoryStore::new(), size_limit).await
    }

    async fn seed_into(store: MemoryStore, size_limit: usize) -> MemoryStore {
        store
            .insert_course(Course {
                id: CourseId(1),
                code: "51210".to_string(),
                name: "OOP".to_string(),
                department: None,
                description: String::new(),
                prereqs: BTreeSet::new(),
            })
            .await
            .unwrap();
        store
            .insert_offering(CourseOffering {
                id: OfferingId(1),
                course: CourseId(1),
                year: 2020,
                quarter: Quarter::Winter,
            })
            .await
            .unwrap();
        store
            .insert_section(Section {
                id: SectionId(1),
                offering: OfferingId(1),
                kind: SectionKind::Lab,
                location: "Ryerson 272".to_string(),
                meeting_time: None,
                size_limit,
                enrolled_students: BTreeSet::new(),
            })
            .await
            .unwrap();
        store.add_student_named(StudentId(1), "John", "Doe").await.unwrap();
        store.add_student_named(StudentId(2), "Mark", "Antony").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_commit_enroll_updates_both_sides() {
        let store = seeded(30).await;
        store.commit_enroll(StudentId(1), SectionId(1)).await.unwrap();

        assert!(store.student(StudentId(1)).await.unwrap().enrolled_sections.contains(&SectionId(1)));
        assert!(store.section(SectionId(1)).await.unwrap().enrolled_students.contains(&StudentId(1)));
        assert_eq!(
            store.satisfied_courses(StudentId(1)).await.unwrap(),
            [CourseId(1)].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_commit_enroll_enforces_constraints() {
        let store = seeded(1).await;
        store.commit_enroll(StudentId(1), SectionId(1)).await.unwrap();

        assert!(matches!(
            store.commit_enroll(StudentId(1), SectionId(1)).await,
            Err(EnrollError::DuplicateEnrollment { .. })
        ));
        assert!(matches!(
            store.commit_enroll(StudentId(2), SectionId(1)).await,
            Err(EnrollError::CapacityViolation { size_limit: 1, .. })
        ));
        assert_eq!(store.section_seats(SectionId(1)).await.unwrap().enrolled, 1);
    }

    #[tokio::test]
    async fn test_commit_enroll_enforces_course_limit() {
        let store = seed_into(MemoryStore::with_course_limit(1), 30).await;
        store
            .insert_section(Section {
                id: SectionId(2),
                offering: OfferingId(1),
                kind: SectionKind::Lecture,
                location: "Ryerson 277".to_string(),
                meeting_time: None,
                size_limit: 30,
                enrolled_students: BTreeSet::new(),
            })
            .await
            .unwrap();
        store.commit_enroll(StudentId(1), SectionId(1)).await.unwrap();

        assert!(matches!(
            store.commit_enroll(StudentId(1), SectionId(2)).await,
            Err(EnrollError::LoadLimitViolation { limit: 1, .. })
        ));
        assert_eq!(store.student_load(StudentId(1)).await.unwrap(), 1);
        assert!(store.section_roster(SectionId(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_unenroll_requires_membership() {
        let store = seeded(30).await;
        assert!(matches!(
            store.commit_unenroll(StudentId(1), SectionId(1)).await,
            Err(EnrollError::MembershipMissing { .. })
        ));

        store.commit_enroll(StudentId(1), SectionId(1)).await.unwrap();
        store.commit_unenroll(StudentId(1), SectionId(1)).await.unwrap();
        assert!(store.section_roster(SectionId(1)).await.unwrap().is_empty());
        assert_eq!(store.student_load(StudentId(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_course_code_is_rejected() {
        let store = seeded(30).await;
        let result = store
            .insert_course(Course {
                id: CourseId(2),
                code: "51210".to_string(),
                name: "OOP again".to_string(),
                department: None,
                description: String::new(),
                prereqs: BTreeSet::new(),
            })
            .await;
        assert!(matches!(result, Err(EnrollError::DuplicateEntry { .. })));
    }

    #[tokio::test]
    async fn test_roster_entries_list_course_codes() {
        let store = seeded(30).await;
        store.commit_enroll(StudentId(2), SectionId(1)).await.unwrap();

        let entries = store.roster_entries().await.unwrap();
        assert_eq!(
            entries,
            vec![RosterEntry {
                student_id: StudentId(2),
                section_id: SectionId(1),
                course_code: "51210".to_string(),
                location: "Ryerson 272".to_string(),
            }]
        );
    }
}
