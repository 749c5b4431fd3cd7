//! The rule engine: JSON rule documents compiled once into an immutable
//! `Translator`, driven by `TranslatorsManager`.

pub mod doc;
pub mod translator;

pub use doc::RuleDoc;
pub use translator::{Translator, TranslatorsManager};
