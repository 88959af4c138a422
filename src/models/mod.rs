pub mod driver;
pub mod job;
pub mod proof;
pub mod rule;
