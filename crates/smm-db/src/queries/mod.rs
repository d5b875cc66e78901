//! Database query modules.

pub mod accounts;
pub mod course_data;
pub mod courses;
pub mod stars;
