//! CSV reading and writing for uploads and exports.

use anyhow::{Context as _, Result};
use serde::Serialize;
use csv::StringRecord;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tagmap_core::{InputRow, MappedRecord, Upload};

use crate::error::{invalid_input, not_found};

pub const MAPPED_HEADERS: [&str; 5] = ["email", "email_original", "tag", "email_account_id", "tag_id"];
pub const RESULT_HEADERS: [&str; 7] = [
    "email_original",
    "email",
    "tag",
    "email_account_id",
    "tag_id",
    "status",
    "error",
];
pub const BATCH_LOG_HEADERS: [&str; 4] = ["tag_id", "batch_size", "status", "error"];

#[derive(Debug, Clone, Copy)]
pub struct UploadFormat<'a> {
    pub delimiter: u8,
    pub email_column: Option<&'a str>,
    pub tag_column: Option<&'a str>,
}

/// Accepts a single ASCII character, or `tab`/`\t`.
pub fn parse_delimiter(raw: &str) -> std::result::Result<u8, String> {
    match raw {
        "tab" | "\\t" | "\t" => return Ok(b'\t'),
        _ => {}
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii() && ch != '"' && ch != '\n' => Ok(ch as u8),
        _ => Err(format!("delimiter must be a single ASCII character, got {raw:?}")),
    }
}

pub fn read_upload(path: &Path, format: UploadFormat<'_>) -> Result<Upload> {
    ensure_exists(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open csv {}", path.display()))?;

    let headers: Vec<String> = clean_headers(
        reader
            .headers()
            .with_context(|| format!("read csv header {}", path.display()))?,
    )
    .iter()
    .map(str::to_string)
    .collect();
    if headers.iter().all(|name| name.is_empty()) {
        return Err(invalid_input(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let email_idx = resolve_column(&headers, format.email_column, 0)?;
    let tag_idx = resolve_column(&headers, format.tag_column, usize::from(headers.len() > 1))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("parse {} data row {}", path.display(), line + 1))?;
        rows.push(InputRow::new(
            record.get(email_idx).unwrap_or_default(),
            record.get(tag_idx).unwrap_or_default(),
        ));
    }
    Ok(Upload::new(rows))
}

/// Finds a column by exact header name, then case-insensitively; without
/// a name, falls back to the column at `default_idx`.
fn resolve_column(headers: &[String], wanted: Option<&str>, default_idx: usize) -> Result<usize> {
    let Some(wanted) = wanted else {
        return Ok(default_idx);
    };
    let wanted = wanted.trim();
    if let Some(idx) = headers.iter().position(|name| name == wanted) {
        return Ok(idx);
    }
    if let Some(idx) = headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(wanted))
    {
        return Ok(idx);
    }
    Err(invalid_input(format!(
        "column {wanted:?} not found; available: {}",
        headers.join(", ")
    )))
}

/// Header names without a leading byte-order mark or surrounding spaces.
fn clean_headers(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .map(|name| name.trim_start_matches('\u{feff}').trim())
        .collect()
}

pub fn read_mapped(path: &Path) -> Result<Vec<MappedRecord>> {
    ensure_exists(path)?;
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open mapped csv {}", path.display()))?;
    let headers = clean_headers(
        reader
            .headers()
            .with_context(|| format!("read csv header {}", path.display()))?,
    );
    reader.set_headers(headers);
    let mut records = Vec::new();
    for (line, record) in reader.deserialize().enumerate() {
        let record: MappedRecord = record
            .with_context(|| format!("parse {} data row {}", path.display(), line + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// An export file that already exists on disk with its header line, ready
/// for records.
pub struct CsvOutput {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvOutput {
    pub fn create(path: &Path, headers: &[&str]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create output directory {}", parent.display()))?;
            }
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| format!("create {}", path.display()))?;
        writer
            .write_record(headers)
            .with_context(|| format!("write {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("write {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn finish<T: Serialize>(mut self, records: &[T]) -> Result<()> {
        for record in records {
            self.writer
                .serialize(record)
                .with_context(|| format!("write {}", self.path.display()))?;
        }
        self.writer
            .flush()
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}

/// Writes `headers` followed by one line per record, even when there are
/// no records.
pub fn write_csv<T: Serialize>(path: &Path, headers: &[&str], records: &[T]) -> Result<()> {
    CsvOutput::create(path, headers)?.finish(records)
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(not_found(format!("input file {}", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        parse_delimiter, read_mapped, read_upload, write_csv, CsvOutput, UploadFormat,
        BATCH_LOG_HEADERS, MAPPED_HEADERS, RESULT_HEADERS,
    };
    use std::fs;
    use tagmap_core::{AccountId, MappedRecord, ResultRecord, TagId};
    use tempfile::TempDir;

    fn format() -> UploadFormat<'static> {
        UploadFormat {
            delimiter: b',',
            email_column: None,
            tag_column: None,
        }
    }

    #[test]
    fn reads_first_two_columns_by_default() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("upload.csv");
        fs::write(&path, "\u{feff}Email,Tag,Notes\n A@X.com ,VIP,x\nb@x.com,cold,y\n")
            .expect("write");

        let upload = read_upload(&path, format()).expect("read");
        assert_eq!(upload.len(), 2);
        assert_eq!(upload.rows[0].email_raw, " A@X.com ");
        assert_eq!(upload.rows[0].tag_raw, "VIP");
    }

    #[test]
    fn selects_columns_by_name() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("upload.csv");
        fs::write(&path, "tag;owner;email\nvip;me;a@x.com\ncold;me\n").expect("write");

        let upload = read_upload(
            &path,
            UploadFormat {
                delimiter: b';',
                email_column: Some("EMAIL"),
                tag_column: Some("tag"),
            },
        )
        .expect("read");
        assert_eq!(upload.rows[0].email_raw, "a@x.com");
        assert_eq!(upload.rows[0].tag_raw, "vip");
        assert_eq!(upload.rows[1].email_raw, "");
    }

    #[test]
    fn unknown_column_is_invalid_input() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("upload.csv");
        fs::write(&path, "email,tag\na@x.com,vip\n").expect("write");

        let err = read_upload(
            &path,
            UploadFormat {
                email_column: Some("mail"),
                ..format()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("column \"mail\" not found"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let err = read_upload(&temp.path().join("nope.csv"), format()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn mapped_file_reads_back() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("mapped.csv");
        let records = vec![MappedRecord {
            email: "a@x.com".to_string(),
            email_original: "A@x.com".to_string(),
            tag: "VIP, gold".to_string(),
            email_account_id: Some(AccountId(4)),
            tag_id: None,
        }];
        write_csv(&path, &MAPPED_HEADERS, &records).expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("email,email_original,tag,email_account_id,tag_id\n"));
        assert!(contents.contains("a@x.com,A@x.com,\"VIP, gold\",4,n/a"));
        assert_eq!(read_mapped(&path).expect("read mapped"), records);
    }

    #[test]
    fn mapped_file_with_bom_reads_back() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("mapped.csv");
        fs::write(
            &path,
            "\u{feff}email,email_original,tag,email_account_id,tag_id\r\na@x.com,A@x.com,VIP,4,9\r\n",
        )
        .expect("write");

        let records = read_mapped(&path).expect("read mapped");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].email, "a@x.com");
        assert_eq!(records[0].tag_id, Some(TagId(9)));
    }

    #[test]
    fn output_exists_before_records_are_written() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("results.csv");
        let output = CsvOutput::create(&path, &BATCH_LOG_HEADERS).expect("create");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "tag_id,batch_size,status,error\n"
        );
        output.finish::<ResultRecord>(&[]).expect("finish");
    }

    #[test]
    fn output_under_a_file_fails_to_open() {
        let temp = TempDir::new().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").expect("write");
        assert!(CsvOutput::create(&blocker.join("results.csv"), &RESULT_HEADERS).is_err());
    }

    #[test]
    fn empty_export_still_has_header() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("out/results.csv");
        write_csv::<ResultRecord>(&path, &RESULT_HEADERS, &[]).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(
            contents,
            "email_original,email,tag,email_account_id,tag_id,status,error\n"
        );
    }
}
