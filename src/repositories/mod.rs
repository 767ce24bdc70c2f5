pub(crate) mod attempts;
pub(crate) mod educator_students;
pub(crate) mod enrollments;
pub(crate) mod questions;
pub(crate) mod quizzes;
pub(crate) mod users;
