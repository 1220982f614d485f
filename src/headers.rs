// 🏷️ Header Rules - Rules as Data
// Which spreadsheet columns feed which student field

use serde::{Deserialize, Serialize};

// ============================================================================
// SHEET ROW
// ============================================================================

/// One data row keyed by (trimmed) header, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRow {
    columns: Vec<(String, String)>,
}

impl SheetRow {
    pub fn new() -> Self {
        SheetRow { columns: Vec::new() }
    }

    /// Set a column value. A repeated header keeps its first position but
    /// takes the later value.
    pub fn insert(&mut self, header: impl Into<String>, value: impl Into<String>) {
        let header = header.into();
        let value = value.into();

        match self.columns.iter_mut().find(|(h, _)| *h == header) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((header, value)),
        }
    }

    fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }
}

impl<H: Into<String>, V: Into<String>> FromIterator<(H, V)> for SheetRow {
    fn from_iter<I: IntoIterator<Item = (H, V)>>(iter: I) -> Self {
        let mut row = SheetRow::new();
        for (header, value) in iter {
            row.insert(header, value);
        }
        row
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentField {
    Name,
    Email,
    Mobile,
    ParentName,
    ParentMobile,
    Address,
    VehicleNumber,
    Photo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Exact header names only.
    Exact,
    /// Exact first; substring matching only when no alias matched exactly.
    ExactThenPartial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: StudentField,

    /// Accepted header spellings, highest priority first
    pub aliases: Vec<String>,

    pub mode: MatchMode,
}

impl FieldRule {
    pub fn new(field: StudentField, aliases: &[&str], mode: MatchMode) -> Self {
        FieldRule {
            field,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            mode,
        }
    }
}

/// An alias that must never partial-match a header containing `header_fragment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialExclusion {
    pub alias: String,
    pub header_fragment: String,
}

/// Aliases shorter than this never take part in substring matching.
pub const MIN_PARTIAL_ALIAS_LEN: usize = 4;

// ============================================================================
// RESOLUTION
// ============================================================================

/// How a field value was found; useful when debugging odd sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exact { header: String },
    CaseInsensitive { header: String },
    Partial { header: String, alias: String },
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub via: Resolution,
}

impl Resolved {
    fn missing() -> Self {
        Resolved {
            value: String::new(),
            via: Resolution::Missing,
        }
    }
}

fn filled(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============================================================================
// RULE ENGINE
// ============================================================================

pub struct HeaderRules {
    rules: Vec<FieldRule>,
    exclusions: Vec<PartialExclusion>,
}

impl HeaderRules {
    /// Create an engine with no rules
    pub fn new() -> Self {
        HeaderRules {
            rules: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// The header spellings seen on the real roster sheet over time.
    pub fn standard() -> Self {
        use MatchMode::ExactThenPartial;
        use StudentField::*;

        let mut rules = HeaderRules::new();

        rules.add_rule(FieldRule::new(
            Name,
            &["Name", "name", "student name", "Student Name"],
            ExactThenPartial,
        ));
        rules.add_rule(FieldRule::new(
            Email,
            &["email", "Email", "E-mail", "e-mail", "Email Address"],
            ExactThenPartial,
        ));
        rules.add_rule(FieldRule::new(
            Mobile,
            &["mobile number", "Mobile Number", "mobile", "Mobile", "phone", "Phone"],
            ExactThenPartial,
        ));
        rules.add_rule(FieldRule::new(
            ParentName,
            &[
                "Parents name",
                "parents name",
                "Parents Name",
                "parent name",
                "Parent Name",
                "Guardian Name",
                "Parent's Name",
            ],
            ExactThenPartial,
        ));
        rules.add_rule(FieldRule::new(
            ParentMobile,
            &[
                "Parent's number",
                "parent's number",
                "Parent's Mobile Number",
                "Parent's mobile number",
                "parent mobile",
                "Parent Mobile",
                "guardian mobile",
            ],
            ExactThenPartial,
        ));
        rules.add_rule(FieldRule::new(
            Address,
            &[
                "address",
                "Address",
                "home address",
                "Home Address",
                "student address",
                "Student Address",
            ],
            ExactThenPartial,
        ));
        rules.add_rule(FieldRule::new(
            VehicleNumber,
            &[
                "Vehicle number",
                "vehicle number",
                "Vehicle Number",
                "vehicle no",
                "Vehicle No",
                "bike number",
                "car number",
            ],
            ExactThenPartial,
        ));
        rules.add_rule(FieldRule::new(
            Photo,
            &[
                "student photo",
                "Student photo",
                "Student Photo",
                "photo",
                "Photo",
                "image",
                "student image",
            ],
            ExactThenPartial,
        ));

        // "Email Address" is an email column, not an address column
        rules.add_exclusion(PartialExclusion {
            alias: "address".to_string(),
            header_fragment: "email".to_string(),
        });

        rules
    }

    /// Add a rule; a later rule for the same field replaces the earlier one
    pub fn add_rule(&mut self, rule: FieldRule) {
        self.rules.retain(|r| r.field != rule.field);
        self.rules.push(rule);
    }

    pub fn add_exclusion(&mut self, exclusion: PartialExclusion) {
        self.exclusions.push(exclusion);
    }

    pub fn rule_for(&self, field: StudentField) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Resolve a field's value in a row; an unknown field resolves to empty.
    pub fn value(&self, row: &SheetRow, field: StudentField) -> String {
        self.resolve(row, field).value
    }

    pub fn resolve(&self, row: &SheetRow, field: StudentField) -> Resolved {
        match self.rule_for(field) {
            Some(rule) => self.apply(row, rule),
            None => Resolved::missing(),
        }
    }

    /// Two passes: every alias exactly (case-sensitive, then ignoring case),
    /// then every alias as a substring of a header.
    pub fn apply(&self, row: &SheetRow, rule: &FieldRule) -> Resolved {
        for alias in &rule.aliases {
            if let Some(found) = exact_match(row, alias) {
                return found;
            }
        }

        if rule.mode == MatchMode::Exact {
            return Resolved::missing();
        }

        for alias in &rule.aliases {
            if let Some(found) = self.partial_match(row, alias) {
                return found;
            }
        }

        Resolved::missing()
    }

    fn partial_match(&self, row: &SheetRow, alias: &str) -> Option<Resolved> {
        if alias.chars().count() < MIN_PARTIAL_ALIAS_LEN {
            return None;
        }

        let alias_lower = alias.to_lowercase();

        row.columns()
            .filter(|(header, _)| {
                let header_lower = header.to_lowercase();
                header_lower.contains(&alias_lower) && !self.is_excluded(&alias_lower, &header_lower)
            })
            .find_map(|(header, value)| {
                filled(value).map(|value| Resolved {
                    value,
                    via: Resolution::Partial {
                        header: header.to_string(),
                        alias: alias.to_string(),
                    },
                })
            })
    }

    fn is_excluded(&self, alias_lower: &str, header_lower: &str) -> bool {
        self.exclusions.iter().any(|ex| {
            ex.alias.to_lowercase() == alias_lower
                && header_lower.contains(&ex.header_fragment.to_lowercase())
        })
    }
}

impl Default for HeaderRules {
    fn default() -> Self {
        Self::standard()
    }
}

fn exact_match(row: &SheetRow, alias: &str) -> Option<Resolved> {
    let exact = row
        .columns()
        .find(|(header, _)| *header == alias)
        .and_then(|(header, value)| filled(value).map(|v| (header, v)));

    if let Some((header, value)) = exact {
        return Some(Resolved {
            value,
            via: Resolution::Exact {
                header: header.to_string(),
            },
        });
    }

    row.columns()
        .filter(|(header, _)| header.to_lowercase() == alias.to_lowercase())
        .find_map(|(header, value)| {
            filled(value).map(|value| Resolved {
                value,
                via: Resolution::CaseInsensitive {
                    header: header.to_string(),
                },
            })
        })
}

// ============================================================================
// TESTS
// ============================================================================
