use crate::domain::model::RosterEntry;
use crate::domain::ports::EnrollmentStore;
use crate::utils::error::Result;
use std::fs;
use std::io::Write;
use std::path::Path;

/// 以 CSV 寫出名冊 (student_id,section_id,course_code,location)
pub fn write_roster<W: Write>(entries: &[RosterEntry], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for entry in entries {
        csv_writer.serialize(entry)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// 匯出目前的名冊到檔案，回傳寫出的列數
pub async fn export_roster<S: EnrollmentStore + ?Sized>(store: &S, path: &Path) -> Result<usize> {
    let entries = store.roster_entries().await?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = fs::File::create(path)?;
    write_roster(&entries, file)?;
    tracing::debug!("Wrote {} roster rows to {}", entries.len(), path.display());
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{SectionId, StudentId};
    use tempfile::TempDir;

    #[test]
    fn test_write_roster_has_header_and_rows() {
        let entries = vec![RosterEntry {
            student_id: StudentId(1),
            section_id: SectionId(2),
            course_code: "51210".to_string(),
            location: "Ryerson 271".to_string(),
        }];
        let mut buffer = Vec::new();
        write_roster(&entries, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "student_id,section_id,course_code,location\n1,2,51210,Ryerson 271\n"
        );
    }

    #[tokio::test]
    async fn test_export_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("roster.csv");
        let store = crate::adapters::memory_store::MemoryStore::new();

        let rows = export_roster(&store, &path).await.unwrap();

        assert_eq!(rows, 0);
        assert!(path.exists());
    }
}
