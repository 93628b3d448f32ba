pub mod article;
pub mod autofill;
pub mod catalog;
pub mod db;
pub mod registries;
pub mod settings;
pub mod transfer;
