// 🎓 Student model
// One registered student plus the fee-period arithmetic around it

use crate::validation::{non_blank, StudentForm};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Shown instead of a parent name when the sheet has none.
pub const PARENT_NAME_FALLBACK: &str = "Not Provided";

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudentStatus {
    Active,
    Expired,
    ExpiringSoon,
}

impl StudentStatus {
    pub fn name(&self) -> &str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Expired => "expired",
            StudentStatus::ExpiringSoon => "expiring-soon",
        }
    }

    /// Status of a fee period ending on `fee_expiry`, as seen on `today`.
    pub fn classify(fee_expiry: NaiveDate, today: NaiveDate, warning_days: u32) -> Self {
        if fee_expiry < today {
            return StudentStatus::Expired;
        }

        let days_left = (fee_expiry - today).num_days();
        if days_left <= i64::from(warning_days) {
            StudentStatus::ExpiringSoon
        } else {
            StudentStatus::Active
        }
    }
}

impl std::fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// FEE PERIOD
// ============================================================================

/// Advance a date by one calendar month, keeping the day of month.
///
/// Days that do not exist in the next month spill over into the month after
/// it: Jan 31 becomes Mar 3 (or Mar 2 in a leap year). The fee period has
/// always been computed this way, so the rollover is kept as-is.
pub fn add_one_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(date.day0()))))
        .unwrap_or(NaiveDate::MAX)
}

// ============================================================================
// STUDENT RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub mobile: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub parent_name: String,
    pub parent_mobile: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<u32>,

    pub registration_date: NaiveDate,
    pub fee_expiry_date: NaiveDate,
    pub status: StudentStatus,
    pub total_fees_paid: f64,
}

impl StudentRecord {
    /// Fresh registration: active, nothing paid, one fee month from `today`.
    pub fn register(
        id: impl Into<String>,
        name: impl Into<String>,
        mobile: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        let mobile = mobile.into();
        StudentRecord {
            id: id.into(),
            name: name.into(),
            parent_name: PARENT_NAME_FALLBACK.to_string(),
            parent_mobile: mobile.clone(),
            mobile,
            email: None,
            address: None,
            vehicle_number: None,
            photo: None,
            seat_number: None,
            registration_date: today,
            fee_expiry_date: add_one_month(today),
            status: StudentStatus::Active,
            total_fees_paid: 0.0,
        }
    }

    /// Build a registration from an already validated form.
    pub fn from_form(id: impl Into<String>, form: &StudentForm, today: NaiveDate) -> Self {
        let mut record = StudentRecord::register(id, form.name.trim(), form.mobile.trim(), today);
        record.apply_form(form);
        record
    }

    /// Overwrite the editable fields; dates, status, fees and seat stay.
    pub fn apply_form(&mut self, form: &StudentForm) {
        self.name = form.name.trim().to_string();
        self.mobile = form.mobile.trim().to_string();
        self.email = non_blank(&form.email);
        self.parent_name =
            non_blank(&form.parent_name).unwrap_or_else(|| PARENT_NAME_FALLBACK.to_string());
        self.parent_mobile = non_blank(&form.parent_mobile).unwrap_or_else(|| self.mobile.clone());
        self.address = non_blank(&form.address);
        self.vehicle_number = non_blank(&form.vehicle_number);
        self.photo = non_blank(&form.photo);
    }

    /// Case-insensitive name match, or substring of mobile / seat number.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() {
            return true;
        }

        self.name.to_lowercase().contains(&term.to_lowercase())
            || self.mobile.contains(term)
            || self
                .seat_number
                .map(|seat| seat.to_string().contains(term))
                .unwrap_or(false)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_add_one_month_keeps_day() {
        assert_eq!(add_one_month(date(2025, 3, 15)), date(2025, 4, 15));
        assert_eq!(add_one_month(date(2025, 12, 10)), date(2026, 1, 10));
    }

    #[test]
    fn test_add_one_month_rolls_over_month_end() {
        assert_eq!(add_one_month(date(2025, 1, 31)), date(2025, 3, 3));
        assert_eq!(add_one_month(date(2024, 1, 31)), date(2024, 3, 2));
        assert_eq!(add_one_month(date(2025, 3, 31)), date(2025, 5, 1));
        assert_eq!(add_one_month(date(2025, 1, 28)), date(2025, 2, 28));
    }

    #[test]
    fn test_classify_status() {
        let today = date(2025, 6, 10);

        assert_eq!(
            StudentStatus::classify(date(2025, 6, 9), today, 7),
            StudentStatus::Expired
        );
        assert_eq!(
            StudentStatus::classify(date(2025, 6, 10), today, 7),
            StudentStatus::ExpiringSoon
        );
        assert_eq!(
            StudentStatus::classify(date(2025, 6, 17), today, 7),
            StudentStatus::ExpiringSoon
        );
        assert_eq!(
            StudentStatus::classify(date(2025, 6, 18), today, 7),
            StudentStatus::Active
        );
    }

    #[test]
    fn test_register_defaults() {
        let record = StudentRecord::register("s1", "Asha", "9876543210", date(2025, 1, 31));

        assert_eq!(record.parent_name, PARENT_NAME_FALLBACK);
        assert_eq!(record.parent_mobile, "9876543210");
        assert_eq!(record.fee_expiry_date, date(2025, 3, 3));
        assert_eq!(record.status, StudentStatus::Active);
        assert_eq!(record.total_fees_paid, 0.0);
    }

    #[test]
    fn test_json_shape() {
        let record = StudentRecord::register("csv-1", "Asha", "9876543210", date(2025, 5, 2));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["parentMobile"], "9876543210");
        assert_eq!(json["registrationDate"], "2025-05-02");
        assert_eq!(json["feeExpiryDate"], "2025-06-02");
        assert_eq!(json["status"], "active");
        assert!(json.get("email").is_none());

        let status: StudentStatus = serde_json::from_str("\"expiring-soon\"").unwrap();
        assert_eq!(status, StudentStatus::ExpiringSoon);
    }

    #[test]
    fn test_matches_search() {
        let mut record = StudentRecord::register("s1", "Asha Verma", "9876543210", date(2025, 5, 2));
        record.seat_number = Some(42);

        assert!(record.matches_search("asha"));
        assert!(record.matches_search("VERMA"));
        assert!(record.matches_search("6543"));
        assert!(record.matches_search("42"));
        assert!(record.matches_search(""));
        assert!(!record.matches_search("rita"));
    }
}
