pub(crate) mod attempts;
pub(crate) mod classes;
pub(crate) mod feedback;
pub(crate) mod health;
pub(crate) mod rubrics;
pub(crate) mod users;
