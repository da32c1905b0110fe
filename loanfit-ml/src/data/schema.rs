//! Schema definition and type inference for the applicant table.

use crate::data::source::RawTable;
use crate::error::MlError;
use serde::{Deserialize, Serialize};

pub const PERSON_AGE: &str = "person_age";
pub const PERSON_GENDER: &str = "person_gender";
pub const PERSON_EDUCATION: &str = "person_education";
pub const PERSON_EMP_EXP: &str = "person_emp_exp";
pub const PERSON_HOME_OWNERSHIP: &str = "person_home_ownership";
pub const LOAN_INTENT: &str = "loan_intent";
pub const PREVIOUS_LOAN_DEFAULTS: &str = "previous_loan_defaults_on_file";
pub const LOAN_STATUS: &str = "loan_status";

/// Columns every input table must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    PERSON_AGE,
    PERSON_GENDER,
    PERSON_EDUCATION,
    PERSON_EMP_EXP,
    PERSON_HOME_OWNERSHIP,
    LOAN_INTENT,
    PREVIOUS_LOAN_DEFAULTS,
    LOAN_STATUS,
];

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Null,
}

/// Schema definition for a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
    pub nullable: bool,
}

/// Infer column type from a sample of non-missing values.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> ColumnType {
    let mut seen_any = false;
    let mut has_float = false;

    for value in values.into_iter().flatten() {
        seen_any = true;
        if value.parse::<i64>().is_ok() {
            continue;
        }
        if value.parse::<f64>().is_ok() {
            has_float = true;
            continue;
        }
        return ColumnType::String;
    }

    match (seen_any, has_float) {
        (false, _) => ColumnType::Null,
        (true, true) => ColumnType::Float,
        (true, false) => ColumnType::Integer,
    }
}

/// Infer schema from a raw table.
pub fn infer_schema(table: &RawTable) -> SchemaDefinition {
    let columns = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnSchema {
            name: name.clone(),
            dtype: infer_column_type(table.column_values(i)),
            nullable: table.column_values(i).any(|v| v.is_none()),
        })
        .collect();

    SchemaDefinition { columns }
}

/// Check that every required column is present.
pub fn validate_required_columns(table: &RawTable, label_column: &str) -> Result<(), MlError> {
    for required in REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| *c != LOAN_STATUS)
        .chain(std::iter::once(label_column))
    {
        table.require_column(required)?;
    }

    let mut names: Vec<&str> = table.columns.iter().map(String::as_str).collect();
    names.sort_unstable();
    if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
        return Err(MlError::dataset(format!("duplicate column '{}'", dup[0])));
    }
    Ok(())
}
