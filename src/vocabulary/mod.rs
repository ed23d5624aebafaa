pub mod db;
pub mod file;
pub mod focus;
pub mod source;
pub mod store;

pub use db::PgVocabularySource;
pub use file::JsonlVocabularySource;
pub use source::{InMemoryVocabularySource, VocabularyRow, VocabularySource};
pub use store::{LoadOptions, VocabularyStore};
