use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::rubric::{RowDraft, Rubric, WeightageInput};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RubricRowInput {
    #[serde(default)]
    pub(crate) criteria: Option<String>,
    pub(crate) weightage: WeightageInput,
    #[serde(default)]
    #[serde(alias = "gradingValues")]
    pub(crate) values: HashMap<String, String>,
}

impl From<RubricRowInput> for RowDraft {
    fn from(input: RubricRowInput) -> Self {
        RowDraft { criteria: input.criteria, weightage: input.weightage, values: input.values }
    }
}

/// Body for both `POST /rubrics` and `PUT /rubrics/{id}`; PUT replaces everything.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RubricWrite {
    #[validate(length(min = 1, max = 255, message = "title must be 1..255 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    #[serde(alias = "columnOrder")]
    pub(crate) columns: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) rows: Vec<RubricRowInput>,
}

/// Partial edit of one row; absent fields are left untouched.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RubricRowPatch {
    #[validate(length(min = 1, message = "criteria must not be empty"))]
    pub(crate) criteria: Option<String>,
    pub(crate) weightage: Option<WeightageInput>,
    #[serde(default)]
    #[serde(alias = "gradingValues")]
    pub(crate) values: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ColumnCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ColumnRename {
    #[serde(alias = "newName")]
    #[validate(length(min = 1, message = "new_name must not be empty"))]
    pub(crate) new_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingValueResponse {
    pub(crate) column: String,
    pub(crate) value: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RubricRowResponse {
    pub(crate) id: String,
    pub(crate) criteria: String,
    pub(crate) weightage: f64,
    pub(crate) values: Vec<GradingValueResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RubricResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<RubricRowResponse>,
    pub(crate) weightage_total: f64,
}

impl From<&Rubric> for RubricResponse {
    fn from(rubric: &Rubric) -> Self {
        let rows = rubric
            .rows()
            .iter()
            .map(|row| RubricRowResponse {
                id: row.id().to_string(),
                criteria: row.criteria().to_string(),
                weightage: row.weightage(),
                values: rubric
                    .columns()
                    .iter()
                    .zip(row.values())
                    .map(|(column, value)| GradingValueResponse {
                        column: column.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            id: rubric.id().to_string(),
            title: rubric.title().to_string(),
            columns: rubric.columns().to_vec(),
            rows,
            weightage_total: rubric.weightage_total(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RubricValidationResponse {
    pub(crate) valid: bool,
    pub(crate) weightage_total: f64,
    pub(crate) error: Option<String>,
}
