//! Typed wrappers over the loaded export tables.
//!
//! The loader collaborator hands over raw `DataFrame`s; these wrappers
//! validate identity columns once, normalize patient identifiers, and
//! expose row-level views the engine consumes. A fresh load builds fresh
//! wrappers; nothing mutates in place.

use polars::prelude::DataFrame;
use tracing::debug;

use sdv_model::{FieldObservation, RawStatus, Result, SdvError, is_real_value};

use crate::header::{apply_header_row, locate_header_row};
use crate::polars_utils::{
    any_to_i64, clean_identifier, column_value_string, has_column, string_column,
};

/// Reserved identity columns of the wide subject-level export.
pub const WIDE_IDENTITY_COLUMNS: [&str; 3] = ["Screening #", "Site #", "Status"];

/// Required columns of the modular field-level export.
pub const MODULAR_REQUIRED_COLUMNS: [&str; 6] = [
    "Subject Screening #",
    "Variable name",
    "Variable Value",
    "CRA_CONTROL_STATUS",
    "Hidden",
    "Table row #",
];

/// Column names that identify the status-history header row.
pub const HISTORY_HEADER_HINTS: [&str; 6] = [
    "Scr #",
    "Subject",
    "Subject Screening #",
    "Activity",
    "Event",
    "Visit",
];

fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    for column in columns {
        if !has_column(df, column) {
            return Err(SdvError::missing_column(table, *column));
        }
    }
    Ok(())
}

/// Normalizes a repeat/table-row number: strips the `.0` float artifact
/// and maps blank/sentinel values to `"0"`.
pub fn normalize_repeat(raw: &str) -> String {
    let cleaned = clean_identifier(raw);
    let lower = cleaned.to_lowercase();
    if cleaned.is_empty() || lower == "nan" || lower == "none" {
        "0".to_string()
    } else {
        cleaned
    }
}

/// Wide export: one row per subject.
#[derive(Debug, Clone)]
pub struct WideTable {
    df: DataFrame,
}

impl WideTable {
    pub fn new(df: DataFrame) -> Result<Self> {
        require_columns(&df, "wide", &WIDE_IDENTITY_COLUMNS)?;
        Ok(Self { df })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Cleaned patient identifiers in row order, blanks skipped.
    pub fn patients(&self) -> Vec<String> {
        string_column(&self.df, "Screening #")
            .into_iter()
            .map(|id| clean_identifier(&id))
            .filter(|id| is_real_value(id))
            .collect()
    }

    /// Row index for a patient, matching on the cleaned identifier.
    pub fn row_for_patient(&self, patient_id: &str) -> Option<usize> {
        let wanted = clean_identifier(patient_id);
        (0..self.df.height())
            .find(|&idx| clean_identifier(&column_value_string(&self.df, "Screening #", idx)) == wanted)
    }

    pub fn value(&self, row: usize, column: &str) -> String {
        column_value_string(&self.df, column, row)
    }

    pub fn patient_status(&self, patient_id: &str) -> String {
        self.row_for_patient(patient_id)
            .map(|row| self.value(row, "Status").trim().to_string())
            .unwrap_or_default()
    }

    /// Screen failure: the enrollment status mentions both "screen" and
    /// "fail", case-insensitive.
    pub fn is_screen_failure(&self, patient_id: &str) -> bool {
        let status = self.patient_status(patient_id).to_lowercase();
        status.contains("screen") && status.contains("fail")
    }

    pub fn screen_failures(&self) -> Vec<String> {
        let statuses = string_column(&self.df, "Status");
        let ids = string_column(&self.df, "Screening #");
        ids.into_iter()
            .zip(statuses)
            .filter(|(_, status)| {
                let lower = status.to_lowercase();
                lower.contains("screen") && lower.contains("fail")
            })
            .map(|(id, _)| clean_identifier(&id))
            .collect()
    }
}

/// Modular export: one row per (patient, variable, value) triple.
#[derive(Debug, Clone)]
pub struct ModularTable {
    df: DataFrame,
}

impl ModularTable {
    pub fn new(df: DataFrame) -> Result<Self> {
        require_columns(&df, "modular", &MODULAR_REQUIRED_COLUMNS)?;
        Ok(Self { df })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Materializes every row as a [`FieldObservation`], skipping rows
    /// without a variable name.
    pub fn observations(&self) -> Vec<FieldObservation> {
        let df = &self.df;
        let height = df.height();
        let form_name_col = ["Form name", "Form Name"]
            .into_iter()
            .find(|name| has_column(df, name));
        let visit_name_col = ["Visit name", "Folder Name"]
            .into_iter()
            .find(|name| has_column(df, name));

        let mut out = Vec::with_capacity(height);
        for idx in 0..height {
            let variable_name = column_value_string(df, "Variable name", idx).trim().to_string();
            if variable_name.is_empty() {
                continue;
            }
            let value = column_value_string(df, "Variable Value", idx).trim().to_string();
            let has_value = is_real_value(&value);
            let form_code = column_value_string(df, "Form Code", idx).trim().to_string();
            let visit_code = column_value_string(df, "Visit Code", idx).trim().to_string();
            let form_name = form_name_col
                .map(|name| column_value_string(df, name, idx).trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| form_code.clone());
            let visit_name = visit_name_col
                .map(|name| column_value_string(df, name, idx).trim().to_string())
                .unwrap_or_default();
            let status_code = df
                .column("CRA_CONTROL_STATUS")
                .ok()
                .and_then(|column| column.get(idx).ok())
                .and_then(any_to_i64)
                .unwrap_or(0);
            let hidden = df
                .column("Hidden")
                .ok()
                .and_then(|column| column.get(idx).ok())
                .and_then(any_to_i64)
                .unwrap_or(0)
                == 1;
            let table_row = crate::polars_utils::parse_i64(&column_value_string(
                df,
                "Table row #",
                idx,
            ))
            .unwrap_or(0)
            .to_string();
            let repeat_number = normalize_repeat(&column_value_string(df, "Repeatable form #", idx));

            out.push(FieldObservation {
                patient_id: clean_identifier(&column_value_string(df, "Subject Screening #", idx)),
                variable_name,
                visit_code,
                form_code,
                form_name,
                visit_name,
                field_key: column_value_string(df, "Field Key", idx).trim().to_string(),
                value: if has_value { value } else { String::new() },
                has_value,
                hidden,
                raw_status: RawStatus::from_code(status_code),
                table_row,
                repeat_number,
            });
        }
        debug!(rows = out.len(), "materialized modular observations");
        out
    }

    /// Resolves the repeat number (or table row) of a repeating-form
    /// instance by the value of one of its fields, e.g. the AE term.
    ///
    /// `match_index` selects among multiple instances carrying the same
    /// value, in row order.
    pub fn find_repeat_number(
        &self,
        patient_id: &str,
        form_code: &str,
        variable_contains: &str,
        variable_excludes: Option<&str>,
        value: &str,
        match_index: usize,
        use_table_row: bool,
    ) -> Option<String> {
        let df = &self.df;
        let wanted_patient = clean_identifier(patient_id);
        let wanted_value = value.trim();
        let mut seen = 0usize;
        for idx in 0..df.height() {
            if clean_identifier(&column_value_string(df, "Subject Screening #", idx))
                != wanted_patient
            {
                continue;
            }
            if column_value_string(df, "Form Code", idx).trim() != form_code {
                continue;
            }
            let variable = column_value_string(df, "Variable name", idx);
            if !variable.contains(variable_contains) {
                continue;
            }
            if let Some(excluded) = variable_excludes {
                if variable.contains(excluded) {
                    continue;
                }
            }
            if column_value_string(df, "Variable Value", idx).trim() != wanted_value {
                continue;
            }
            if seen == match_index {
                let column = if use_table_row {
                    "Table row #"
                } else {
                    "Repeatable form #"
                };
                return Some(normalize_repeat(&column_value_string(df, column, idx)));
            }
            seen += 1;
        }
        None
    }
}

/// One row of the status-history (verification log) table.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub patient: String,
    pub activity: String,
    pub form: String,
    pub repeat: String,
    pub data_entry_status: String,
    pub verification_status: String,
    pub user: String,
    pub date: String,
    pub time: String,
    pub site: String,
}

/// Status-history export: one row per form-status event.
#[derive(Debug, Clone)]
pub struct StatusHistoryTable {
    df: DataFrame,
    patient_col: String,
    activity_col: String,
}

impl StatusHistoryTable {
    /// Wraps a frame whose header row is already in place.
    pub fn new(df: DataFrame) -> Result<Self> {
        let patient_col = ["Scr #", "Subject Screening #", "Subject"]
            .into_iter()
            .find(|name| has_column(&df, name))
            .ok_or_else(|| SdvError::missing_column("status history", "Scr #"))?
            .to_string();
        let activity_col = ["Activity", "Visit"]
            .into_iter()
            .find(|name| has_column(&df, name))
            .ok_or_else(|| SdvError::missing_column("status history", "Activity"))?
            .to_string();
        require_columns(&df, "status history", &["Form", "Date"])?;
        Ok(Self {
            df,
            patient_col,
            activity_col,
        })
    }

    /// Wraps a raw headerless sheet, locating the header row first.
    pub fn from_raw(raw: &DataFrame) -> Result<Self> {
        let header_idx = locate_header_row(raw, &HISTORY_HEADER_HINTS);
        let df = apply_header_row(raw, header_idx)
            .map_err(|err| SdvError::Message(format!("status history reframe: {err}")))?;
        Self::new(df)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn rows(&self) -> Vec<HistoryRow> {
        let df = &self.df;
        (0..df.height())
            .map(|idx| HistoryRow {
                patient: clean_identifier(&column_value_string(df, &self.patient_col, idx)),
                activity: column_value_string(df, &self.activity_col, idx).trim().to_string(),
                form: column_value_string(df, "Form", idx).trim().to_string(),
                repeat: normalize_repeat(&column_value_string(df, "Repeatable form #", idx)),
                data_entry_status: column_value_string(df, "Data Entry Status", idx)
                    .trim()
                    .to_string(),
                verification_status: column_value_string(df, "Verification Status", idx)
                    .trim()
                    .to_string(),
                user: column_value_string(df, "User", idx).trim().to_string(),
                date: column_value_string(df, "Date", idx).trim().to_string(),
                time: column_value_string(df, "Time", idx).trim().to_string(),
                site: column_value_string(df, "Site #", idx).trim().to_string(),
            })
            .collect()
    }
}
