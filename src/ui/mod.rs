pub mod folded;
pub mod report;
pub mod summary;
