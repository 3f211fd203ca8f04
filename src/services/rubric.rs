use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Allowed deviation of the summed row weightages from 1.
pub(crate) const WEIGHTAGE_EPSILON: f64 = 1e-6;

/// Criteria text used when a row is created without one.
pub(crate) const DEFAULT_CRITERIA: &str = "Untitled criterion";

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum SchemaError {
    #[error("column name must not be empty")]
    EmptyColumnName,
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("unknown rubric row: {0}")]
    UnknownRow(String),
    #[error("row '{row}' is missing a value for column '{column}'")]
    MissingColumnValue { row: String, column: String },
    #[error("row '{row}' has {found} grading values but the rubric has {expected} columns")]
    ColumnCountMismatch { row: String, expected: usize, found: usize },
    #[error("row '{0}' has empty criteria")]
    EmptyCriteria(String),
    #[error("invalid weightage: {0}")]
    InvalidWeightage(String),
    #[error("weightage {0} is outside the range 0..=1")]
    WeightageOutOfRange(f64),
    #[error("row weightages must sum to 100%, got {:.4}%", .total * 100.0)]
    WeightageSum { total: f64 },
}

/// Weightage as entered by a user: a fraction (`0.25`) or a percentage string (`"25%"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum WeightageInput {
    Number(f64),
    Text(String),
}

impl From<f64> for WeightageInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for WeightageInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Converts boundary input into the canonical fraction stored on a row.
pub(crate) fn normalize_weightage(raw: &WeightageInput) -> Result<f64, SchemaError> {
    let fraction = match raw {
        WeightageInput::Number(value) => *value,
        WeightageInput::Text(text) => {
            let trimmed = text.trim();
            match trimmed.strip_suffix('%') {
                Some(percent) => parse_number(percent.trim(), text)? / 100.0,
                None => parse_number(trimmed, text)?,
            }
        }
    };

    if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
        return Err(SchemaError::WeightageOutOfRange(fraction));
    }

    Ok(fraction)
}

fn parse_number(value: &str, original: &str) -> Result<f64, SchemaError> {
    value.parse::<f64>().map_err(|_| SchemaError::InvalidWeightage(original.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RubricRow {
    id: String,
    criteria: String,
    weightage: f64,
    values: Vec<String>,
}

impl RubricRow {
    /// Builds a row whose `values` are already ordered like the rubric's columns.
    pub(crate) fn new(
        id: impl Into<String>,
        criteria: Option<&str>,
        weightage: f64,
        values: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            criteria: criteria.map(|text| text.trim().to_string()).unwrap_or_else(default_criteria),
            weightage,
            values,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn criteria(&self) -> &str {
        &self.criteria
    }

    pub(crate) fn weightage(&self) -> f64 {
        self.weightage
    }

    /// Grading values in column order.
    pub(crate) fn values(&self) -> &[String] {
        &self.values
    }
}

fn default_criteria() -> String {
    DEFAULT_CRITERIA.to_string()
}

/// Input for [`Rubric::add_row`]; grading values keyed by column name.
#[derive(Debug, Clone)]
pub(crate) struct RowDraft {
    pub(crate) criteria: Option<String>,
    pub(crate) weightage: WeightageInput,
    pub(crate) values: HashMap<String, String>,
}

/// A weighted grading table: ordered column names plus rows whose values are
/// stored positionally against that order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Rubric {
    id: String,
    title: String,
    columns: Vec<String>,
    rows: Vec<RubricRow>,
}

impl Rubric {
    pub(crate) fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), columns: Vec::new(), rows: Vec::new() }
    }

    /// Reassembles a rubric from stored parts. Structural checks only; the
    /// weightage sum is left to [`Rubric::validate`].
    pub(crate) fn from_parts(
        id: impl Into<String>,
        title: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<RubricRow>,
    ) -> Result<Self, SchemaError> {
        let rubric = Self { id: id.into(), title: title.into(), columns, rows };
        rubric.check_columns()?;
        rubric.check_row_shapes()?;
        Ok(rubric)
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn rows(&self) -> &[RubricRow] {
        &self.rows
    }

    pub(crate) fn row(&self, row_id: &str) -> Option<&RubricRow> {
        self.rows.iter().find(|row| row.id == row_id)
    }

    #[cfg(test)]
    pub(crate) fn value(&self, row_id: &str, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.row(row_id).and_then(|row| row.values.get(index)).map(String::as_str)
    }

    pub(crate) fn weightage_total(&self) -> f64 {
        self.rows.iter().map(|row| row.weightage).sum()
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        self.check_columns()?;
        self.check_row_shapes()?;

        for row in &self.rows {
            if row.criteria.trim().is_empty() {
                return Err(SchemaError::EmptyCriteria(row.id.clone()));
            }
            if !row.weightage.is_finite() || !(0.0..=1.0).contains(&row.weightage) {
                return Err(SchemaError::WeightageOutOfRange(row.weightage));
            }
        }

        let total = self.weightage_total();
        if (total - 1.0).abs() > WEIGHTAGE_EPSILON {
            return Err(SchemaError::WeightageSum { total });
        }

        Ok(())
    }

    /// Appends a row; every column must be present in `draft.values`.
    pub(crate) fn add_row(&mut self, draft: RowDraft) -> Result<&RubricRow, SchemaError> {
        let weightage = normalize_weightage(&draft.weightage)?;
        let row_label = draft.criteria.clone().unwrap_or_else(default_criteria);

        if let Some(unknown) = draft.values.keys().find(|key| self.column_index(key).is_none()) {
            return Err(SchemaError::UnknownColumn(unknown.clone()));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = draft.values.get(column).ok_or_else(|| {
                SchemaError::MissingColumnValue { row: row_label.clone(), column: column.clone() }
            })?;
            values.push(value.clone());
        }

        self.rows.push(RubricRow::new(
            Uuid::new_v4().to_string(),
            draft.criteria.as_deref(),
            weightage,
            values,
        ));
        Ok(&self.rows[self.rows.len() - 1])
    }

    pub(crate) fn remove_row(&mut self, row_id: &str) -> Result<RubricRow, SchemaError> {
        let index = self
            .rows
            .iter()
            .position(|row| row.id == row_id)
            .ok_or_else(|| SchemaError::UnknownRow(row_id.to_string()))?;
        Ok(self.rows.remove(index))
    }

    /// Appends a column; existing rows get an empty value for it.
    pub(crate) fn add_column(&mut self, name: &str) -> Result<(), SchemaError> {
        let name = self.checked_new_column_name(name, None)?;
        self.columns.push(name);
        for row in &mut self.rows {
            row.values.push(String::new());
        }
        Ok(())
    }

    pub(crate) fn remove_column(&mut self, name: &str) -> Result<(), SchemaError> {
        let index =
            self.column_index(name).ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))?;
        self.columns.remove(index);
        for row in &mut self.rows {
            if index < row.values.len() {
                row.values.remove(index);
            }
        }
        Ok(())
    }

    /// Renames a column in place; values follow automatically because rows are
    /// indexed by column position.
    pub(crate) fn rename_column(&mut self, old_name: &str, new_name: &str) -> Result<(), SchemaError> {
        let index = self
            .column_index(old_name)
            .ok_or_else(|| SchemaError::UnknownColumn(old_name.to_string()))?;
        let new_name = self.checked_new_column_name(new_name, Some(index))?;
        self.columns[index] = new_name;
        Ok(())
    }

    pub(crate) fn set_value(
        &mut self,
        row_id: &str,
        column: &str,
        text: impl Into<String>,
    ) -> Result<(), SchemaError> {
        let index =
            self.column_index(column).ok_or_else(|| SchemaError::UnknownColumn(column.to_string()))?;
        let row = self.row_mut(row_id)?;
        row.values[index] = text.into();
        Ok(())
    }

    pub(crate) fn set_weightage(
        &mut self,
        row_id: &str,
        weightage: &WeightageInput,
    ) -> Result<(), SchemaError> {
        let fraction = normalize_weightage(weightage)?;
        self.row_mut(row_id)?.weightage = fraction;
        Ok(())
    }

    pub(crate) fn set_criteria(&mut self, row_id: &str, criteria: &str) -> Result<(), SchemaError> {
        self.row_mut(row_id)?.criteria = criteria.trim().to_string();
        Ok(())
    }

    fn row_mut(&mut self, row_id: &str) -> Result<&mut RubricRow, SchemaError> {
        self.rows
            .iter_mut()
            .find(|row| row.id == row_id)
            .ok_or_else(|| SchemaError::UnknownRow(row_id.to_string()))
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    fn checked_new_column_name(
        &self,
        name: &str,
        replacing: Option<usize>,
    ) -> Result<String, SchemaError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchemaError::EmptyColumnName);
        }
        match self.column_index(name) {
            Some(existing) if Some(existing) != replacing => {
                Err(SchemaError::DuplicateColumn(name.to_string()))
            }
            _ => Ok(name.to_string()),
        }
    }

    fn check_columns(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.trim().is_empty() {
                return Err(SchemaError::EmptyColumnName);
            }
            if !seen.insert(column.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.clone()));
            }
        }
        Ok(())
    }

    fn check_row_shapes(&self) -> Result<(), SchemaError> {
        let expected = self.columns.len();
        for row in &self.rows {
            let found = row.values.len();
            if found < expected {
                return Err(SchemaError::MissingColumnValue {
                    row: row.criteria.clone(),
                    column: self.columns[found].clone(),
                });
            }
            if found > expected {
                return Err(SchemaError::ColumnCountMismatch {
                    row: row.criteria.clone(),
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    fn two_column_rubric() -> Rubric {
        let mut rubric = Rubric::new("rubric-1", "Oral exam");
        rubric.add_column("Excellent").unwrap();
        rubric.add_column("Poor").unwrap();
        rubric
            .add_row(RowDraft {
                criteria: Some("Fluency".to_string()),
                weightage: "60%".into(),
                values: values(&[("Excellent", "speaks freely"), ("Poor", "halting")]),
            })
            .unwrap();
        rubric
            .add_row(RowDraft {
                criteria: Some("Accuracy".to_string()),
                weightage: 0.4.into(),
                values: values(&[("Excellent", "no errors"), ("Poor", "")]),
            })
            .unwrap();
        rubric
    }

    #[test]
    fn normalize_weightage_accepts_fraction_and_percent() {
        assert_eq!(normalize_weightage(&"25%".into()).unwrap(), 0.25);
        assert_eq!(normalize_weightage(&0.25.into()).unwrap(), 0.25);
        assert_eq!(normalize_weightage(&" 40 % ".into()).unwrap(), 0.4);
        assert_eq!(normalize_weightage(&"0.5".into()).unwrap(), 0.5);
    }

    #[test]
    fn normalize_weightage_rejects_garbage_and_out_of_range() {
        assert!(matches!(
            normalize_weightage(&"abc%".into()),
            Err(SchemaError::InvalidWeightage(_))
        ));
        assert!(matches!(
            normalize_weightage(&"150%".into()),
            Err(SchemaError::WeightageOutOfRange(_))
        ));
        assert!(matches!(
            normalize_weightage(&(-0.1).into()),
            Err(SchemaError::WeightageOutOfRange(_))
        ));
    }

    #[test]
    fn validate_accepts_weights_summing_to_one() {
        let rubric = two_column_rubric();
        rubric.validate().expect("valid rubric");
        assert!((rubric.weightage_total() - 1.0).abs() <= WEIGHTAGE_EPSILON);
    }

    #[test]
    fn validate_tolerates_float_artifacts() {
        let mut rubric = Rubric::new("r", "float");
        for weight in ["10%", "20%", "70%"] {
            rubric
                .add_row(RowDraft {
                    criteria: Some(format!("c{weight}")),
                    weightage: weight.into(),
                    values: HashMap::new(),
                })
                .unwrap();
        }
        rubric.validate().expect("0.1 + 0.2 + 0.7 is accepted");
    }

    #[test]
    fn validate_rejects_bad_sum() {
        let mut rubric = Rubric::new("r", "thirds");
        for _ in 0..3 {
            rubric
                .add_row(RowDraft {
                    criteria: None,
                    weightage: "33.33%".into(),
                    values: HashMap::new(),
                })
                .unwrap();
        }
        assert!(matches!(rubric.validate(), Err(SchemaError::WeightageSum { .. })));
    }

    #[test]
    fn validate_rejects_empty_rubric() {
        let rubric = Rubric::new("r", "empty");
        assert!(matches!(rubric.validate(), Err(SchemaError::WeightageSum { total }) if total == 0.0));
    }

    #[test]
    fn missing_criteria_is_defaulted_but_blank_is_rejected() {
        let mut rubric = Rubric::new("r", "criteria");
        let row_id = rubric
            .add_row(RowDraft { criteria: None, weightage: 1.0.into(), values: HashMap::new() })
            .unwrap()
            .id()
            .to_string();
        assert_eq!(rubric.row(&row_id).unwrap().criteria(), DEFAULT_CRITERIA);
        rubric.validate().expect("defaulted criteria is valid");

        rubric.set_criteria(&row_id, "   ").unwrap();
        assert!(matches!(rubric.validate(), Err(SchemaError::EmptyCriteria(_))));
    }

    #[test]
    fn add_row_requires_every_column() {
        let mut rubric = two_column_rubric();
        let err = rubric
            .add_row(RowDraft {
                criteria: Some("Pronunciation".to_string()),
                weightage: 0.0.into(),
                values: values(&[("Excellent", "clear")]),
            })
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumnValue {
                row: "Pronunciation".to_string(),
                column: "Poor".to_string()
            }
        );

        let err = rubric
            .add_row(RowDraft {
                criteria: None,
                weightage: 0.0.into(),
                values: values(&[("Excellent", ""), ("Poor", ""), ("Average", "")]),
            })
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownColumn("Average".to_string()));
    }

    #[test]
    fn rename_column_keeps_values_and_order() {
        let mut rubric = two_column_rubric();
        let fluency = rubric.rows()[0].id().to_string();

        rubric.rename_column("Excellent", "Outstanding").unwrap();

        assert_eq!(rubric.columns(), ["Outstanding".to_string(), "Poor".to_string()]);
        assert_eq!(rubric.value(&fluency, "Outstanding"), Some("speaks freely"));
        assert_eq!(rubric.value(&fluency, "Excellent"), None);
        rubric.validate().unwrap();
    }

    #[test]
    fn rename_column_rejects_duplicates_but_allows_same_name() {
        let mut rubric = two_column_rubric();
        assert_eq!(
            rubric.rename_column("Excellent", "Poor"),
            Err(SchemaError::DuplicateColumn("Poor".to_string()))
        );
        rubric.rename_column("Poor", " Poor ").unwrap();
        assert_eq!(rubric.columns()[1], "Poor");
    }

    #[test]
    fn add_and_remove_column_keep_rows_aligned() {
        let mut rubric = two_column_rubric();
        rubric.add_column("Average").unwrap();
        assert!(rubric.rows().iter().all(|row| row.values().len() == 3));
        let accuracy = rubric.rows()[1].id().to_string();
        assert_eq!(rubric.value(&accuracy, "Average"), Some(""));

        rubric.remove_column("Excellent").unwrap();
        assert_eq!(rubric.columns(), ["Poor".to_string(), "Average".to_string()]);
        assert!(rubric.rows().iter().all(|row| row.values().len() == 2));
        assert_eq!(rubric.value(&accuracy, "Poor"), Some(""));
        rubric.validate().unwrap();
    }

    #[test]
    fn remove_row_drops_it_entirely() {
        let mut rubric = two_column_rubric();
        let accuracy = rubric.rows()[1].id().to_string();
        let removed = rubric.remove_row(&accuracy).unwrap();
        assert_eq!(removed.criteria(), "Accuracy");
        assert_eq!(rubric.rows().len(), 1);
        assert!(matches!(rubric.validate(), Err(SchemaError::WeightageSum { .. })));
        assert_eq!(rubric.remove_row(&accuracy), Err(SchemaError::UnknownRow(accuracy.clone())));
    }

    #[test]
    fn from_parts_rejects_misaligned_rows() {
        let columns = vec!["A".to_string(), "B".to_string()];
        let rows = vec![RubricRow::new("row", Some("Only one"), 1.0, vec!["x".to_string()])];
        assert_eq!(
            Rubric::from_parts("r", "t", columns, rows),
            Err(SchemaError::MissingColumnValue {
                row: "Only one".to_string(),
                column: "B".to_string()
            })
        );

        let duplicate = vec!["A".to_string(), "A".to_string()];
        assert_eq!(
            Rubric::from_parts("r", "t", duplicate, Vec::new()),
            Err(SchemaError::DuplicateColumn("A".to_string()))
        );
    }
}
