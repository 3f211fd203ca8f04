use std::collections::HashMap;

use serde::Serialize;

pub(crate) use crate::core::time::format_primitive;

pub(crate) mod analytics;
pub(crate) mod attempt;
pub(crate) mod class;
pub(crate) mod feedback;
pub(crate) mod grading;
pub(crate) mod rubric;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
}
