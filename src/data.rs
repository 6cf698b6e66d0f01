pub mod domain;
pub mod filter;
pub mod loader;
pub mod polars_ext;
pub mod schema;
pub mod table;
