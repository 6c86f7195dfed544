pub mod poll;
pub mod report;
