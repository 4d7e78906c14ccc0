pub mod enrollment;
pub mod notification;
pub mod quiz;
pub mod storage;
