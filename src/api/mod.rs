pub(crate) mod attempts;
pub(crate) mod classes;
pub(crate) mod errors;
pub(crate) mod feedback;
pub(crate) mod grading;
pub(crate) mod handlers;
pub(crate) mod router;
pub(crate) mod rubrics;
pub(crate) mod users;
