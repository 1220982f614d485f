// 📝 Form validation
// Field-level checks for the add/edit student form

use serde::{Deserialize, Serialize};

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// STUDENT FORM
// ============================================================================

/// Raw values submitted through the add/edit form.
///
/// Optional fields are kept as plain strings here; blank means "not given".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentForm {
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub parent_name: String,
    pub parent_mobile: String,
    pub address: String,
    pub vehicle_number: String,
    pub photo: String,
}

impl StudentForm {
    /// Check the form and return the first failing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "Student name is required"));
        }

        if self.mobile.trim().is_empty() {
            return Err(ValidationError::new(
                "mobile",
                "Student mobile number is required",
            ));
        }

        if !is_mobile_number(&self.mobile) {
            return Err(ValidationError::new(
                "mobile",
                "Student mobile number must be exactly 10 digits",
            ));
        }

        if self.parent_name.trim().is_empty() {
            return Err(ValidationError::new("parentName", "Parent name is required"));
        }

        if self.parent_mobile.trim().is_empty() {
            return Err(ValidationError::new(
                "parentMobile",
                "Parent mobile number is required",
            ));
        }

        if !is_mobile_number(&self.parent_mobile) {
            return Err(ValidationError::new(
                "parentMobile",
                "Parent mobile number must be exactly 10 digits",
            ));
        }

        Ok(())
    }
}

/// Exactly ten ASCII digits, nothing else (no spaces, no country code).
pub fn is_mobile_number(value: &str) -> bool {
    value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Blank-to-`None` helper shared by the form and the importer.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> StudentForm {
        StudentForm {
            name: "Asha".to_string(),
            mobile: "9876543210".to_string(),
            parent_name: "Rita".to_string(),
            parent_mobile: "9123456780".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_form_passes() {
        assert!(valid_form().validate().is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        let form = StudentForm::default();
        let err = form.validate().unwrap_err();

        assert_eq!(err.field, "name");
        assert_eq!(err.message, "Student name is required");
    }

    #[test]
    fn test_mobile_must_be_ten_digits() {
        let mut form = valid_form();
        form.mobile = "98765 4321".to_string();

        let err = form.validate().unwrap_err();
        assert_eq!(err.message, "Student mobile number must be exactly 10 digits");

        form.mobile = "98765432101".to_string();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_parent_fields_required() {
        let mut form = valid_form();
        form.parent_name = "  ".to_string();
        assert_eq!(form.validate().unwrap_err().message, "Parent name is required");

        let mut form = valid_form();
        form.parent_mobile = String::new();
        assert_eq!(
            form.validate().unwrap_err().message,
            "Parent mobile number is required"
        );

        let mut form = valid_form();
        form.parent_mobile = "12345".to_string();
        assert_eq!(form.validate().unwrap_err().field, "parentMobile");
    }

    #[test]
    fn test_is_mobile_number() {
        assert!(is_mobile_number("0123456789"));
        assert!(!is_mobile_number("012345678a"));
        assert!(!is_mobile_number("+911234567"));
        assert!(!is_mobile_number(""));
    }
}
