//! Error types for rendering and publishing charts.
//!
//! Soft failures (unknown symbol, too few candles, a failed fetch on a
//! single-chart path) are not errors here; chart operations report them as
//! `Ok(None)`. What reaches these types is a render or publish failure.

use std::path::PathBuf;

use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

/// Errors produced while turning a chart specification into output bytes.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RenderError {
    /// A bundled template failed to parse.
    #[snafu(display("Failed to load template {name}: {source}"))]
    LoadTemplate {
        name: String,
        source: minijinja::Error,
        backtrace: Backtrace,
    },

    /// A template failed while rendering.
    #[snafu(display("Failed to render template {name}: {source}"))]
    RenderTemplate {
        name: String,
        source: minijinja::Error,
        backtrace: Backtrace,
    },

    /// The chart payload could not be serialized to JSON.
    #[snafu(display("Failed to serialize chart payload: {source}"))]
    Payload {
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// The thumbnail could not be encoded.
    #[snafu(display("Failed to rasterize thumbnail: {message}"))]
    Raster {
        message: String,
        backtrace: Backtrace,
    },
}

/// Errors produced while storing a rendered document.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PublishError {
    /// Local filesystem write failed.
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Remote credentials are not configured.
    #[snafu(display("Remote storage credentials unavailable: {source}"))]
    MissingCredentials {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// The configured container URL is unusable.
    #[snafu(display("Invalid container URL: {message}"))]
    InvalidContainerUrl {
        message: String,
        backtrace: Backtrace,
    },

    /// The HTTP client could not be built or the request did not complete.
    #[snafu(display("Upload request failed: {source}"))]
    Request {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The blob store answered with a non-success status.
    #[snafu(display("Upload of {name} rejected with HTTP {status}: {body}"))]
    Rejected {
        name: String,
        status: u16,
        body: String,
        backtrace: Backtrace,
    },
}

/// Failure of a chart operation after data was fetched.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ChartError {
    #[snafu(context(false), display("Chart rendering failed: {source}"))]
    Render {
        #[snafu(backtrace)]
        source: RenderError,
    },

    #[snafu(context(false), display("Chart publishing failed: {source}"))]
    Publish {
        #[snafu(backtrace)]
        source: PublishError,
    },
}
