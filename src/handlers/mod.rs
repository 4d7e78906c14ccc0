pub mod auth;
pub mod content;
pub mod courses;
pub mod files;
pub mod payments;
pub mod quizzes;
pub mod users;
