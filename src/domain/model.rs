use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 每位學生同時可註冊的 section 上限
pub const STUDENT_COURSE_LIMIT: usize = 3;

/// Section 預設座位數
pub const DEFAULT_SECTION_SIZE: usize = 30;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(StudentId);
entity_id!(SectionId);
entity_id!(CourseId);
entity_id!(OfferingId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quarter {
    Fall,
    Winter,
    Spring,
    Summer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Mpcs,
    Ppha,
    Cmsc,
    Busn,
    Ttic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    #[default]
    Lecture,
    Lab,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub department: Option<Department>,
    #[serde(default)]
    pub description: String,
    /// 直接先修課程，不計算遞移閉包
    #[serde(default)]
    pub prereqs: BTreeSet<CourseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseOffering {
    pub id: OfferingId,
    pub course: CourseId,
    pub year: i32,
    pub quarter: Quarter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub offering: OfferingId,
    #[serde(default)]
    pub kind: SectionKind,
    #[serde(default)]
    pub location: String,
    pub meeting_time: Option<NaiveTime>,
    pub size_limit: usize,
    #[serde(default)]
    pub enrolled_students: BTreeSet<StudentId>,
}

impl Section {
    pub fn has_open_seat(&self) -> bool {
        self.enrolled_students.len() < self.size_limit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub restriction_hold: bool,
    /// 已修畢課程紀錄
    #[serde(default)]
    pub completed_courses: BTreeSet<CourseId>,
    #[serde(default)]
    pub enrolled_sections: BTreeSet<SectionId>,
}

impl Student {
    pub fn new(id: StudentId, first_name: &str, last_name: &str) -> Self {
        Self {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            restriction_hold: false,
            completed_courses: BTreeSet::new(),
            enrolled_sections: BTreeSet::new(),
        }
    }
}

/// Section 的座位快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatCount {
    pub enrolled: usize,
    pub size_limit: usize,
}

impl SeatCount {
    pub fn is_full(&self) -> bool {
        self.enrolled >= self.size_limit
    }
}

/// 名冊中的一列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student_id: StudentId,
    pub section_id: SectionId,
    pub course_code: String,
    pub location: String,
}
