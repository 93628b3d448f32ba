pub mod catalog;
pub mod contact_autofill;
pub mod import;
pub mod pattern_autofill;
pub mod template_text;
