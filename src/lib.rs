// Library Roster - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod auth;
pub mod config;
pub mod error;
pub mod headers;
pub mod normalizer;
pub mod roster;
pub mod source;
pub mod store;
pub mod student;
pub mod validation;

// Re-export commonly used types
pub use auth::{AuthService, DefaultCredentials, OwnerProfile, RegisterData};
pub use config::{AppConfig, SeedAccount};
pub use error::{AuthError, ConfigError, IngestError, RosterError, StoreError};
pub use headers::{FieldRule, HeaderRules, MatchMode, PartialExclusion, SheetRow, StudentField};
pub use normalizer::{normalize, ImportBatch, Normalizer, RowSkipped, SkipReason};
pub use roster::StudentBook;
pub use source::{
    add_student_to_sheet, import_students, update_student_in_sheet, FileSheet, PublishedSheet,
    SheetSource,
};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use student::{add_one_month, StudentRecord, StudentStatus, PARENT_NAME_FALLBACK};
pub use validation::{StudentForm, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
