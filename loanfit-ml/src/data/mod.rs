//! Data ingestion: loading, schema checks, quality validation and the numeric frame.

pub mod frame;
pub mod schema;
pub mod source;
pub mod validate;

pub use frame::{ClassDistribution, FeatureMatrix};
pub use schema::{ColumnType, SchemaDefinition};
pub use source::{CsvSource, DataSource, DataSourceInfo, RawTable};
pub use validate::DataQualityReport;
