// 🧹 Spreadsheet Row Normalizer
// Raw CSV export -> ordered, validated student records

use crate::error::IngestError;
use crate::headers::{HeaderRules, SheetRow, StudentField};
use crate::student::{StudentRecord, PARENT_NAME_FALLBACK};
use crate::validation::non_blank;
use chrono::{NaiveDate, Utc};
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

// ============================================================================
// IMPORT REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SkipReason {
    MissingName,
    MissingMobile,
    MissingNameAndMobile,
    /// The CSV reader could not decode the row at all.
    Unreadable(String),
}

/// A row left out of the batch. Logged and reported, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowSkipped {
    /// 1-based data row position (the header row is not counted)
    pub row: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportBatch {
    pub students: Vec<StudentRecord>,
    pub skipped: Vec<RowSkipped>,
    pub headers: Vec<String>,
    /// SHA-256 of the raw payload, to tell whether the sheet changed
    pub fingerprint: String,
}

impl ImportBatch {
    fn empty(fingerprint: String) -> Self {
        ImportBatch {
            students: Vec::new(),
            skipped: Vec::new(),
            headers: Vec::new(),
            fingerprint,
        }
    }

    pub fn unreadable_rows(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::Unreadable(_)))
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} students imported, {} rows skipped ({} unreadable)",
            self.students.len(),
            self.skipped.len(),
            self.unreadable_rows()
        )
    }
}

/// Hex SHA-256 of a payload.
pub fn fingerprint(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct Normalizer {
    rules: HeaderRules,
}

impl Normalizer {
    pub fn new() -> Self {
        Normalizer {
            rules: HeaderRules::standard(),
        }
    }

    pub fn with_rules(rules: HeaderRules) -> Self {
        Normalizer { rules }
    }

    /// Normalize a payload, registering everyone as of today (UTC).
    pub fn normalize(&self, raw: &str) -> Result<Vec<StudentRecord>, IngestError> {
        self.normalize_at(raw, Utc::now().date_naive())
    }

    pub fn normalize_at(
        &self,
        raw: &str,
        today: NaiveDate,
    ) -> Result<Vec<StudentRecord>, IngestError> {
        Ok(self.normalize_report(raw, today)?.students)
    }

    /// Full pass over a payload, keeping track of every skipped row.
    ///
    /// Only an unreadable header row is fatal; anything wrong with a single
    /// data row drops that row and the batch carries on.
    pub fn normalize_report(&self, raw: &str, today: NaiveDate) -> Result<ImportBatch, IngestError> {
        let digest = fingerprint(raw);

        if raw.trim().is_empty() {
            warn!("empty sheet payload, nothing to import");
            return Ok(ImportBatch::empty(digest));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(raw.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        debug!(?headers, "sheet headers");

        let mut batch = ImportBatch::empty(digest);
        batch.headers = headers;

        for (index, result) in reader.records().enumerate() {
            let position = index + 1;

            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(row = position, error = %e, "unreadable sheet row");
                    batch.skipped.push(RowSkipped {
                        row: position,
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                    continue;
                }
            };

            // Short rows simply lack the trailing columns
            let row: SheetRow = batch
                .headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.as_str(), v))
                .collect();

            match self.build_student(&row, position, today) {
                Ok(student) => batch.students.push(student),
                Err(reason) => {
                    info!(row = position, ?reason, "skipping row: missing name or mobile");
                    batch.skipped.push(RowSkipped {
                        row: position,
                        reason,
                    });
                }
            }
        }

        if batch.students.is_empty() {
            warn!(headers = ?batch.headers, "no valid students found in sheet");
        }
        info!("{}", batch.summary());

        Ok(batch)
    }

    fn build_student(
        &self,
        row: &SheetRow,
        position: usize,
        today: NaiveDate,
    ) -> Result<StudentRecord, SkipReason> {
        let field = |f: StudentField| self.rules.value(row, f);

        let name = field(StudentField::Name);
        let mobile = field(StudentField::Mobile);

        match (name.is_empty(), mobile.is_empty()) {
            (true, true) => return Err(SkipReason::MissingNameAndMobile),
            (true, false) => return Err(SkipReason::MissingName),
            (false, true) => return Err(SkipReason::MissingMobile),
            (false, false) => {}
        }

        let mut student = StudentRecord::register(format!("csv-{}", position), name, mobile, today);
        student.email = non_blank(&field(StudentField::Email));
        student.parent_name = non_blank(&field(StudentField::ParentName))
            .unwrap_or_else(|| PARENT_NAME_FALLBACK.to_string());
        student.parent_mobile =
            non_blank(&field(StudentField::ParentMobile)).unwrap_or_else(|| student.mobile.clone());
        student.address = non_blank(&field(StudentField::Address));
        student.vehicle_number = non_blank(&field(StudentField::VehicleNumber));
        student.photo = non_blank(&field(StudentField::Photo));

        Ok(student)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize with the standard header rules.
pub fn normalize(raw: &str) -> Result<Vec<StudentRecord>, IngestError> {
    Normalizer::new().normalize(raw)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::{add_one_month, StudentStatus};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    }

    fn report(raw: &str) -> ImportBatch {
        Normalizer::new().normalize_report(raw, today()).unwrap()
    }

    #[test]
    fn test_basic_sheet() {
        let raw = "Name,email,mobile number,parents name,parent's mobile number\n\
                   Asha,asha@x.com,9876543210,Rita,9123456780";
        let batch = report(raw);

        assert_eq!(batch.students.len(), 1);
        let s = &batch.students[0];
        assert_eq!(s.id, "csv-1");
        assert_eq!(s.name, "Asha");
        assert_eq!(s.email.as_deref(), Some("asha@x.com"));
        assert_eq!(s.mobile, "9876543210");
        assert_eq!(s.parent_name, "Rita");
        assert_eq!(s.parent_mobile, "9123456780");
        assert_eq!(s.status, StudentStatus::Active);
        assert_eq!(s.total_fees_paid, 0.0);
        assert_eq!(s.registration_date, today());
        assert_eq!(s.fee_expiry_date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn test_missing_mobile_column_skips_row() {
        let batch = report("Name,email\nAsha,asha@x.com");

        assert!(batch.students.is_empty());
        assert_eq!(
            batch.skipped,
            vec![RowSkipped {
                row: 1,
                reason: SkipReason::MissingMobile
            }]
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_skipped_row_is_logged_at_info() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        let students = tracing::subscriber::with_default(subscriber, || {
            normalize("Name,email\nAsha,asha@x.com").unwrap()
        });
        assert!(students.is_empty());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("skipping row"))
            .expect("skip was not logged");
        assert!(line.contains("INFO"));
        assert!(line.contains("row=1"));
        assert!(line.contains("MissingMobile"));
    }

    #[test]
    fn test_empty_and_header_only_payloads() {
        for raw in ["", "   \n\t  ", "Name,mobile", "Name,mobile\n\n\n"] {
            let batch = report(raw);
            assert!(batch.students.is_empty(), "payload {:?}", raw);
            assert!(batch.skipped.is_empty(), "payload {:?}", raw);
        }
    }

    #[test]
    fn test_garbage_payload_is_not_fatal() {
        let students = Normalizer::new()
            .normalize_at(",,,\n,,,\n\"unterminated", today())
            .unwrap();
        assert!(students.is_empty());
    }

    #[test]
    fn test_blank_name_dropped_regardless_of_other_fields() {
        let raw = "Name,Mobile,Address,Photo\n\
                   ,9876543210,Pune,pic.jpg\n\
                   Ravi,9000000000,,";
        let batch = report(raw);

        assert_eq!(batch.students.len(), 1);
        assert_eq!(batch.students[0].name, "Ravi");
        assert_eq!(batch.students[0].id, "csv-2");
        assert_eq!(batch.skipped[0].reason, SkipReason::MissingName);
    }

    #[test]
    fn test_defaults_for_absent_parent_fields() {
        let batch = report("Student Name,Phone\nMeera,9988776655");
        let s = &batch.students[0];

        assert_eq!(s.parent_name, PARENT_NAME_FALLBACK);
        assert_eq!(s.parent_mobile, "9988776655");
        assert_eq!(s.email, None);
        assert_eq!(s.address, None);
        assert_eq!(s.vehicle_number, None);
        assert_eq!(s.photo, None);
    }

    #[test]
    fn test_email_address_header_not_used_as_address() {
        let raw = "Name,Email Address,Mobile\nAsha,asha@x.com,9876543210";
        let s = &report(raw).students[0];

        assert_eq!(s.email.as_deref(), Some("asha@x.com"));
        assert_eq!(s.address, None);
    }

    #[test]
    fn test_headers_are_trimmed_and_partial_matched() {
        let raw = "  Name  , Mobile Number ,Home address of student,Vehicle No (if any)\n\
                   Asha,9876543210,12 MG Road,MH12AB1234";
        let batch = report(raw);
        let s = &batch.students[0];

        assert_eq!(batch.headers[0], "Name");
        assert_eq!(s.mobile, "9876543210");
        assert_eq!(s.address.as_deref(), Some("12 MG Road"));
        assert_eq!(s.vehicle_number.as_deref(), Some("MH12AB1234"));
    }

    #[test]
    fn test_short_rows_and_order_preserved() {
        let raw = "Name,Mobile,Parent Name\n\
                   A,1111111111\n\
                   ,\n\
                   B,2222222222,Pb\n\
                   C,3333333333,Pc,extra";
        let batch = report(raw);
        let names: Vec<&str> = batch.students.iter().map(|s| s.name.as_str()).collect();
        let ids: Vec<&str> = batch.students.iter().map(|s| s.id.as_str()).collect();

        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(ids, vec!["csv-1", "csv-3", "csv-4"]);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].reason, SkipReason::MissingNameAndMobile);
    }

    #[test]
    fn test_expiry_is_one_month_after_registration_for_whole_batch() {
        let raw = "Name,Mobile\nA,1111111111\nB,2222222222\nC,3333333333";
        let students = Normalizer::new().normalize(raw).unwrap();

        assert_eq!(students.len(), 3);
        for s in &students {
            assert_eq!(s.fee_expiry_date, add_one_month(s.registration_date));
        }
    }

    #[test]
    fn test_fingerprint_tracks_payload() {
        let a = report("Name,Mobile\nA,1111111111");
        let b = report("Name,Mobile\nA,1111111111");
        let c = report("Name,Mobile\nA,1111111112");

        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let raw = "Name,Mobile,Address\n\"Verma, Asha\",9876543210,\"Flat 2, MG Road\"";
        let s = &report(raw).students[0];

        assert_eq!(s.name, "Verma, Asha");
        assert_eq!(s.address.as_deref(), Some("Flat 2, MG Road"));
    }
}
