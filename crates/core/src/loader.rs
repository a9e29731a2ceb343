use crate::error::IngestError;
use crate::models::ContentUnit;
use calamine::Reader;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Recognized source formats, classified by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
    Text,
    Pdf,
    Word,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" | "xls" => Some(FileKind::Excel),
            "txt" => Some(FileKind::Text),
            "pdf" => Some(FileKind::Pdf),
            "doc" | "docx" => Some(FileKind::Word),
            _ => None,
        }
    }

    /// Tabular, row-oriented sources get the structured-data payload flag.
    pub fn is_structured(self) -> bool {
        matches!(self, FileKind::Csv | FileKind::Excel)
    }
}

pub struct LoadedFile {
    pub source_name: String,
    pub unit_count: usize,
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a best-effort directory load. A malformed file never aborts
/// the load; it lands in `skipped` with its failure reason.
pub struct DirectoryLoad {
    pub units: Vec<ContentUnit>,
    pub loaded: Vec<LoadedFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Enumerate the immediate files of `dir` (non-recursive) whose extension
/// maps to a recognized [`FileKind`]. Unrecognized extensions are dropped
/// silently. Results are sorted for deterministic load order.
pub fn discover_supported_files(dir: &Path) -> Result<Vec<(PathBuf, FileKind)>, IngestError> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(FileKind::from_extension);

        if let Some(kind) = kind {
            files.push((path, kind));
        }
    }

    files.sort_unstable_by(|left, right| left.0.cmp(&right.0));
    Ok(files)
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn source_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })
}

/// Load one file into content units according to its [`FileKind`].
pub fn load_file(path: &Path, kind: FileKind) -> Result<Vec<ContentUnit>, IngestError> {
    let name = source_name(path)?;
    let checksum = digest_file(path)?;

    let units = match kind {
        FileKind::Csv => load_csv(path, &name, &checksum)?,
        FileKind::Excel => load_excel(path, &name, &checksum)?,
        FileKind::Text => load_text(path, &name, &checksum)?,
        FileKind::Pdf => load_pdf(path, &name, &checksum)?,
        FileKind::Word => load_word(path, &name, &checksum)?,
    };

    Ok(units)
}

/// Best-effort load of every recognized file in `dir`.
pub fn load_directory(dir: &Path) -> Result<DirectoryLoad, IngestError> {
    let files = discover_supported_files(dir)?;

    let mut units = Vec::new();
    let mut loaded = Vec::new();
    let mut skipped = Vec::new();

    for (path, kind) in files {
        match load_file(&path, kind) {
            Ok(file_units) if !file_units.is_empty() => {
                loaded.push(LoadedFile {
                    source_name: file_units[0].source_name.clone(),
                    unit_count: file_units.len(),
                });
                units.extend(file_units);
            }
            Ok(_) => {}
            Err(error) => skipped.push(SkippedFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(DirectoryLoad {
        units,
        loaded,
        skipped,
    })
}

fn structured_unit(text: String, name: &str, checksum: &str, row_id: u64) -> ContentUnit {
    ContentUnit {
        text,
        source_name: name.to_string(),
        is_structured: true,
        row_id: Some(row_id),
        page: None,
        checksum: checksum.to_string(),
    }
}

fn load_csv(path: &Path, name: &str, checksum: &str) -> Result<Vec<ContentUnit>, IngestError> {
    let mut reader = csv::Reader::from_path(path).map_err(|error| IngestError::Unreadable {
        format: "csv".to_string(),
        details: error.to_string(),
    })?;

    let headers = reader
        .headers()
        .map_err(|error| IngestError::Unreadable {
            format: "csv".to_string(),
            details: error.to_string(),
        })?
        .clone();

    let mut units = Vec::new();
    for (row_id, record) in reader.records().enumerate() {
        let record = record.map_err(|error| IngestError::Unreadable {
            format: "csv".to_string(),
            details: error.to_string(),
        })?;

        let text = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{header}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");

        units.push(structured_unit(text, name, checksum, row_id as u64));
    }

    Ok(units)
}

fn load_excel(path: &Path, name: &str, checksum: &str) -> Result<Vec<ContentUnit>, IngestError> {
    let mut workbook =
        calamine::open_workbook_auto(path).map_err(|error| IngestError::Unreadable {
            format: "excel".to_string(),
            details: error.to_string(),
        })?;

    let mut units = Vec::new();
    let mut row_id = 0u64;

    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|error| IngestError::Unreadable {
                format: "excel".to_string(),
                details: error.to_string(),
            })?;

        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    calamine::Data::Empty => String::new(),
                    calamine::Data::String(value) => value.clone(),
                    calamine::Data::Float(value) => value.to_string(),
                    calamine::Data::Int(value) => value.to_string(),
                    calamine::Data::Bool(value) => value.to_string(),
                    calamine::Data::DateTime(value) => value.to_string(),
                    _ => String::new(),
                })
                .collect();

            if cells.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            units.push(structured_unit(cells.join(" | "), name, checksum, row_id));
            row_id += 1;
        }
    }

    Ok(units)
}

fn load_text(path: &Path, name: &str, checksum: &str) -> Result<Vec<ContentUnit>, IngestError> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![ContentUnit {
        text,
        source_name: name.to_string(),
        is_structured: false,
        row_id: None,
        page: None,
        checksum: checksum.to_string(),
    }])
}

fn load_pdf(path: &Path, name: &str, checksum: &str) -> Result<Vec<ContentUnit>, IngestError> {
    let document = lopdf::Document::load(path).map_err(|error| IngestError::Unreadable {
        format: "pdf".to_string(),
        details: error.to_string(),
    })?;

    let mut units = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::Unreadable {
                format: "pdf".to_string(),
                details: error.to_string(),
            })?;

        if text.trim().is_empty() {
            continue;
        }

        units.push(ContentUnit {
            text,
            source_name: name.to_string(),
            is_structured: false,
            row_id: None,
            page: Some(page_no),
            checksum: checksum.to_string(),
        });
    }

    if units.is_empty() {
        return Err(IngestError::Unreadable {
            format: "pdf".to_string(),
            details: format!("no readable page text: {}", path.display()),
        });
    }

    Ok(units)
}

fn load_word(path: &Path, name: &str, checksum: &str) -> Result<Vec<ContentUnit>, IngestError> {
    let bytes = fs::read(path)?;
    let document = docx_rs::read_docx(&bytes).map_err(|error| IngestError::Unreadable {
        format: "word".to_string(),
        details: error.to_string(),
    })?;

    let mut text = String::new();
    for child in document.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(fragment) = child {
                            text.push_str(&fragment.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }

    if text.trim().is_empty() {
        return Err(IngestError::Unreadable {
            format: "word".to_string(),
            details: format!("no readable text: {}", path.display()),
        });
    }

    Ok(vec![ContentUnit {
        text,
        source_name: name.to_string(),
        is_structured: false,
        row_id: None,
        page: None,
        checksum: checksum.to_string(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn extension_classification_matches_contract() {
        assert_eq!(FileKind::from_extension("CSV"), Some(FileKind::Csv));
        assert_eq!(FileKind::from_extension("xlsx"), Some(FileKind::Excel));
        assert_eq!(FileKind::from_extension("pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_extension("docx"), Some(FileKind::Word));
        assert_eq!(FileKind::from_extension("md"), None);
        assert!(FileKind::Csv.is_structured());
        assert!(!FileKind::Pdf.is_structured());
    }

    #[test]
    fn discovery_skips_unrecognized_and_sorts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.txt"), "beta")?;
        fs::write(dir.path().join("a.csv"), "h\nv")?;
        fs::write(dir.path().join("notes.md"), "ignored")?;

        let files = discover_supported_files(dir.path())?;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].1, FileKind::Csv);
        assert_eq!(files[1].1, FileKind::Text);
        Ok(())
    }

    #[test]
    fn discovery_is_not_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(nested.join("deep.txt"), "hidden")?;
        fs::write(dir.path().join("top.txt"), "visible")?;

        let files = discover_supported_files(dir.path())?;
        assert_eq!(files.len(), 1);
        Ok(())
    }

    #[test]
    fn csv_rows_become_structured_units() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("people.csv");
        fs::write(&path, "name,role\nada,engineer\ngrace,admiral\n")?;

        let units = load_file(&path, FileKind::Csv)?;
        assert_eq!(units.len(), 2);
        assert!(units[0].is_structured);
        assert_eq!(units[0].row_id, Some(0));
        assert_eq!(units[1].row_id, Some(1));
        assert_eq!(units[0].source_name, "people.csv");
        assert!(units[0].text.contains("name: ada"));
        assert!(units[0].text.contains("role: engineer"));
        Ok(())
    }

    #[test]
    fn text_file_becomes_single_generic_unit() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "plain text body")?;

        let units = load_file(&path, FileKind::Text)?;
        assert_eq!(units.len(), 1);
        assert!(!units[0].is_structured);
        assert_eq!(units[0].row_id, None);
        assert_eq!(units[0].text, "plain text body");
        Ok(())
    }

    #[test]
    fn malformed_file_is_skipped_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(dir.path().join("fine.txt"), "still loads")?;

        let report = load_directory(dir.path())?;
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].path.file_name().and_then(|n| n.to_str()),
            Some("broken.pdf")
        );
        Ok(())
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(load_directory(Path::new("/nonexistent/knowledge")).is_err());
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("a.txt");
        fs::write(&path, b"abc")?;
        assert_eq!(digest_file(&path)?, digest_file(&path)?);
        Ok(())
    }
}
