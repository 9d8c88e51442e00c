pub mod annotate;
pub mod article;
pub mod entry_dates;
pub mod error;
pub mod pipeline;
pub mod reader;
pub mod row;
pub mod section;
pub mod sink;
pub mod table;
pub mod tags;
pub mod text;
pub mod transform;

pub use error::EtlError;
pub use pipeline::{Pipeline, RunConfig, RunSummary};
