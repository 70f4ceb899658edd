pub mod composition;
pub mod generation;
