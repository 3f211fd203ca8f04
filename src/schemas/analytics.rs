use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseTimeQuery {
    #[serde(default)]
    #[serde(alias = "userId")]
    pub(crate) user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseTimeResponse {
    pub(crate) class_id: String,
    pub(crate) user_id: Option<String>,
    pub(crate) average_seconds: Option<f64>,
}
