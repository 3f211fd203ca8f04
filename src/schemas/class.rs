use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Class;
use crate::schemas::format_primitive;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AiGradingToggle {
    pub(crate) enabled: bool,
    #[serde(alias = "actingUsername")]
    #[validate(length(min = 1, message = "acting_username must not be empty"))]
    pub(crate) acting_username: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) owner_username: String,
    pub(crate) ai_grading_enabled: bool,
    pub(crate) updated_at: String,
}

impl From<Class> for ClassResponse {
    fn from(class: Class) -> Self {
        Self {
            id: class.id,
            name: class.name,
            owner_username: class.owner_username,
            ai_grading_enabled: class.ai_grading_enabled,
            updated_at: format_primitive(class.updated_at),
        }
    }
}
