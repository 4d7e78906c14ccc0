pub mod content;
pub mod course;
pub mod payment;
pub mod quiz;
pub mod user;
