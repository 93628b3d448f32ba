pub mod catalog;
pub mod field;
pub mod registry;
