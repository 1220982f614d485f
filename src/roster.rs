// 📚 Student Book
// CRUD, search and wholesale import over the key-value store

use crate::error::RosterError;
use crate::normalizer::ImportBatch;
use crate::store::{get_json, set_json, KeyValueStore};
use crate::student::{StudentRecord, StudentStatus};
use crate::validation::StudentForm;
use chrono::NaiveDate;
use tracing::info;

const STUDENTS_KEY: &str = "students";
const FINGERPRINT_KEY: &str = "last_import_fingerprint";

pub struct StudentBook<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> StudentBook<S> {
    pub fn new(store: S) -> Self {
        StudentBook { store }
    }

    pub fn all(&self) -> Result<Vec<StudentRecord>, RosterError> {
        Ok(get_json(&self.store, STUDENTS_KEY)?.unwrap_or_default())
    }

    fn save(&self, students: &[StudentRecord]) -> Result<(), RosterError> {
        set_json(&self.store, STUDENTS_KEY, students)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<StudentRecord, RosterError> {
        self.all()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))
    }

    /// Blank term returns everyone.
    pub fn search(&self, term: &str) -> Result<Vec<StudentRecord>, RosterError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|s| s.matches_search(term))
            .collect())
    }

    pub fn add(&self, form: &StudentForm, today: NaiveDate) -> Result<StudentRecord, RosterError> {
        form.validate()?;

        let record = StudentRecord::from_form(uuid::Uuid::new_v4().to_string(), form, today);
        let mut students = self.all()?;
        students.push(record.clone());
        self.save(&students)?;

        info!(id = %record.id, name = %record.name, "student added");
        Ok(record)
    }

    pub fn update(&self, id: &str, form: &StudentForm) -> Result<StudentRecord, RosterError> {
        form.validate()?;

        let mut students = self.all()?;
        let record = students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;

        record.apply_form(form);
        let updated = record.clone();
        self.save(&students)?;

        info!(id = %id, "student updated");
        Ok(updated)
    }

    /// Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool, RosterError> {
        let mut students = self.all()?;
        let before = students.len();
        students.retain(|s| s.id != id);

        if students.len() == before {
            return Ok(false);
        }

        self.save(&students)?;
        info!(id = %id, "student deleted");
        Ok(true)
    }

    pub fn assign_seat(&self, id: &str, seat: Option<u32>) -> Result<StudentRecord, RosterError> {
        self.modify(id, |record| record.seat_number = seat)
    }

    pub fn record_payment(&self, id: &str, amount: f64) -> Result<StudentRecord, RosterError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(RosterError::InvalidPayment(amount));
        }

        self.modify(id, |record| record.total_fees_paid += amount)
    }

    fn modify<F>(&self, id: &str, change: F) -> Result<StudentRecord, RosterError>
    where
        F: FnOnce(&mut StudentRecord),
    {
        let mut students = self.all()?;
        let record = students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;

        change(record);
        let updated = record.clone();
        self.save(&students)?;
        Ok(updated)
    }

    /// Replace the whole roster with a fresh import.
    pub fn replace_with_import(&self, batch: &ImportBatch) -> Result<usize, RosterError> {
        self.save(&batch.students)?;
        self.store.set(FINGERPRINT_KEY, &batch.fingerprint)?;

        info!(count = batch.students.len(), "roster replaced from import");
        Ok(batch.students.len())
    }

    /// Whether this batch is byte-for-byte the last imported sheet.
    pub fn is_unchanged(&self, batch: &ImportBatch) -> Result<bool, RosterError> {
        let last = self.store.get(FINGERPRINT_KEY)?;
        Ok(last.as_deref() == Some(batch.fingerprint.as_str()))
    }

    /// Re-derive every status from its fee expiry; returns how many changed.
    pub fn refresh_statuses(&self, today: NaiveDate, warning_days: u32) -> Result<usize, RosterError> {
        let mut students = self.all()?;
        let mut changed = 0;

        for student in &mut students {
            let status = StudentStatus::classify(student.fee_expiry_date, today, warning_days);
            if status != student.status {
                student.status = status;
                changed += 1;
            }
        }

        if changed > 0 {
            self.save(&students)?;
        }
        Ok(changed)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Normalizer;
    use crate::store::MemoryStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn form(name: &str, mobile: &str) -> StudentForm {
        StudentForm {
            name: name.to_string(),
            mobile: mobile.to_string(),
            parent_name: "Rita".to_string(),
            parent_mobile: "9123456780".to_string(),
            ..Default::default()
        }
    }

    fn book() -> StudentBook<MemoryStore> {
        StudentBook::new(MemoryStore::new())
    }

    #[test]
    fn test_add_get_update_delete() {
        let book = book();
        let added = book.add(&form("Asha", "9876543210"), today()).unwrap();

        assert_eq!(book.get(&added.id).unwrap(), added);
        assert_eq!(added.fee_expiry_date, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());

        let mut edit = form("Asha Verma", "9876543210");
        edit.address = "Pune".to_string();
        let updated = book.update(&added.id, &edit).unwrap();

        assert_eq!(updated.name, "Asha Verma");
        assert_eq!(updated.address.as_deref(), Some("Pune"));
        assert_eq!(updated.registration_date, added.registration_date);

        assert!(book.delete(&added.id).unwrap());
        assert!(!book.delete(&added.id).unwrap());
        assert!(matches!(book.get(&added.id), Err(RosterError::NotFound(_))));
    }

    #[test]
    fn test_add_rejects_invalid_form() {
        let book = book();
        let err = book.add(&form("Asha", "12345"), today()).unwrap_err();

        match err {
            RosterError::Validation(v) => assert_eq!(v.field, "mobile"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(book.all().unwrap().is_empty());
    }

    #[test]
    fn test_update_unknown_id() {
        let book = book();
        let err = book.update("nope", &form("Asha", "9876543210")).unwrap_err();
        assert!(matches!(err, RosterError::NotFound(_)));
    }

    #[test]
    fn test_search() {
        let book = book();
        book.add(&form("Asha", "9876543210"), today()).unwrap();
        let ravi = book.add(&form("Ravi", "9000000001"), today()).unwrap();
        book.assign_seat(&ravi.id, Some(17)).unwrap();

        assert_eq!(book.search("").unwrap().len(), 2);
        assert_eq!(book.search("ASH").unwrap()[0].name, "Asha");
        assert_eq!(book.search("0001").unwrap()[0].name, "Ravi");
        assert_eq!(book.search("17").unwrap()[0].name, "Ravi");
        assert!(book.search("zzz").unwrap().is_empty());
    }

    #[test]
    fn test_import_replaces_roster() {
        let book = book();
        book.add(&form("Manual", "9876543210"), today()).unwrap();

        let batch = Normalizer::new()
            .normalize_report("Name,Mobile\nA,1111111111\nB,2222222222", today())
            .unwrap();

        assert!(!book.is_unchanged(&batch).unwrap());
        assert_eq!(book.replace_with_import(&batch).unwrap(), 2);
        assert!(book.is_unchanged(&batch).unwrap());

        let names: Vec<String> = book.all().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_reimport_of_same_sheet_restores_roster() {
        let book = book();
        let raw = "Name,Mobile\nA,1111111111\nB,2222222222";
        let normalizer = Normalizer::new();

        let first = normalizer.normalize_report(raw, today()).unwrap();
        book.replace_with_import(&first).unwrap();
        assert!(book.delete("csv-1").unwrap());
        book.add(&form("Walk-in", "9876543210"), today()).unwrap();

        let second = normalizer.normalize_report(raw, today()).unwrap();
        assert!(book.is_unchanged(&second).unwrap());
        assert_eq!(book.replace_with_import(&second).unwrap(), 2);

        let ids: Vec<String> = book.all().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["csv-1", "csv-2"]);
    }

    #[test]
    fn test_payments() {
        let book = book();
        let s = book.add(&form("Asha", "9876543210"), today()).unwrap();

        book.record_payment(&s.id, 500.0).unwrap();
        let s = book.record_payment(&s.id, 250.5).unwrap();
        assert_eq!(s.total_fees_paid, 750.5);

        assert!(matches!(
            book.record_payment(&s.id, -1.0),
            Err(RosterError::InvalidPayment(_))
        ));
        assert!(matches!(
            book.record_payment(&s.id, f64::NAN),
            Err(RosterError::InvalidPayment(_))
        ));
    }

    #[test]
    fn test_refresh_statuses() {
        let book = book();
        book.add(&form("Asha", "9876543210"), today()).unwrap();

        // Expiry is 2025-07-01
        let later = NaiveDate::from_ymd_opt(2025, 6, 26).unwrap();
        assert_eq!(book.refresh_statuses(later, 7).unwrap(), 1);
        assert_eq!(book.all().unwrap()[0].status, StudentStatus::ExpiringSoon);
        assert_eq!(book.refresh_statuses(later, 7).unwrap(), 0);

        let expired = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        book.refresh_statuses(expired, 7).unwrap();
        assert_eq!(book.all().unwrap()[0].status, StudentStatus::Expired);
    }
}
