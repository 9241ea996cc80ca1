use crate::adapters::memory_store::MemoryStore;
use crate::domain::model::{
    Course, CourseId, CourseOffering, OfferingId, Quarter, Section, SectionId,
    SectionKind,
};
use crate::utils::error::{EnrollError, Result};
use chrono::NaiveTime;
use std::collections::BTreeSet;

/// 新建 section 的欄位
#[derive(Debug, Clone, Default)]
pub struct SectionSpec {
    pub kind: SectionKind,
    pub location: String,
    pub meeting_time: Option<NaiveTime>,
    pub size_limit: usize,
}

/// 建好的目錄項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltEntries {
    pub course: CourseId,
    pub offering: Option<OfferingId>,
    pub sections: Vec<SectionId>,
}

/// 鏈式建立 course → offering → section
///
/// 只有在上一層建立成功時才會建立下一層；失敗會記錄下來，
/// 由 `finish` 回傳第一個錯誤，不會被默默吞掉。
pub struct CatalogBuilder<'a> {
    store: &'a MemoryStore,
    course_id: Option<CourseId>,
    offering_id: Option<OfferingId>,
    section_ids: Vec<SectionId>,
    errors: Vec<EnrollError>,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            course_id: None,
            offering_id: None,
            section_ids: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// 從既有的課程繼續建立 offering
    pub fn for_course(store: &'a MemoryStore, course: CourseId) -> Self {
        let mut builder = Self::new(store);
        builder.course_id = Some(course);
        builder
    }

    pub async fn course(self, id: CourseId, code: &str, name: &str) -> Self {
        self.course_with_prereqs(id, code, name, std::iter::empty::<CourseId>())
            .await
    }

    pub async fn course_with_prereqs(
        self,
        id: CourseId,
        code: &str,
        name: &str,
        prereqs: impl IntoIterator<Item = CourseId>,
    ) -> Self {
        let course = Course {
            id,
            code: code.to_string(),
            name: name.to_string(),
            department: None,
            description: String::new(),
            prereqs: prereqs.into_iter().collect::<BTreeSet<_>>(),
        };
        self.full_course(course).await
    }

    pub async fn full_course(mut self, course: Course) -> Self {
        let id = course.id;
        match self.store.insert_course(course).await {
            Ok(()) => self.course_id = Some(id),
            Err(e) => self.record(e),
        }
        self
    }

    pub async fn offering(mut self, year: i32, quarter: Quarter) -> Self {
        let Some(course) = self.course_id else {
            return self;
        };
        let id = self.store.next_offering_id().await;
        let offering = CourseOffering {
            id,
            course,
            year,
            quarter,
        };
        match self.store.insert_offering(offering).await {
            Ok(()) => self.offering_id = Some(id),
            Err(e) => self.record(e),
        }
        self
    }

    pub async fn section(self, location: &str, size_limit: usize) -> Self {
        self.section_with(SectionSpec {
            location: location.to_string(),
            size_limit,
            ..SectionSpec::default()
        })
        .await
    }

    pub async fn section_with(mut self, spec: SectionSpec) -> Self {
        let Some(offering) = self.offering_id else {
            return self;
        };
        if spec.size_limit == 0 {
            self.record(EnrollError::InvalidConfigValueError {
                field: "size_limit".to_string(),
                value: "0".to_string(),
                reason: "Section size limit must be positive".to_string(),
            });
            return self;
        }
        let id = self.store.next_section_id().await;
        let section = Section {
            id,
            offering,
            kind: spec.kind,
            location: spec.location,
            meeting_time: spec.meeting_time,
            size_limit: spec.size_limit,
            enrolled_students: BTreeSet::new(),
        };
        match self.store.insert_section(section).await {
            Ok(()) => self.section_ids.push(id),
            Err(e) => self.record(e),
        }
        self
    }

    fn record(&mut self, error: EnrollError) {
        tracing::error!("❌ catalog insertion failed: {}", error);
        self.errors.push(error);
    }

    pub fn course_id(&self) -> Option<CourseId> {
        self.course_id
    }

    pub fn offering_id(&self) -> Option<OfferingId> {
        self.offering_id
    }

    pub fn section_ids(&self) -> &[SectionId] {
        &self.section_ids
    }

    pub fn errors(&self) -> &[EnrollError] {
        &self.errors
    }

    pub fn finish(self) -> Result<BuiltEntries> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }
        let course = self.course_id.ok_or_else(|| EnrollError::MissingConfigError {
            field: "course".to_string(),
        })?;
        Ok(BuiltEntries {
            course,
            offering: self.offering_id,
            sections: self.section_ids,
        })
    }
}
