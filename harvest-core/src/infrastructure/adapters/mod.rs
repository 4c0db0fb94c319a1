// harvest-core/src/infrastructure/adapters/mod.rs

pub mod duckdb;
pub mod html;

pub use self::duckdb::DuckDbStore;
pub use html::HtmlDocument;
