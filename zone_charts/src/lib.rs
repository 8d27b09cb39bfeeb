//! Chart generation over the market data in `zone_store`.
//!
//! [`chart`] assembles renderer-agnostic chart specifications, [`render`] turns
//! them into HTML documents (and optional PNG thumbnails), [`publish`] writes
//! them out, and [`generator::ChartGenerator`] ties fetching, assembly, rendering
//! and publishing together per chart kind.

#[cfg(feature = "cli")]
pub mod cli;
pub mod chart;
pub mod error;
pub mod generator;
pub mod naming;
pub mod publish;
pub mod render;
pub mod selector;
pub mod style;

pub use error::{ChartError, PublishError, RenderError};
pub use generator::{BatchReport, ChartGenerator, ChartOutput};
