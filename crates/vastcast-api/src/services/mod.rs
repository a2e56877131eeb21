//! Business logic services.

pub mod conversion;

pub use conversion::{ConversionOutput, ConversionPipeline, PreparedConversion};
