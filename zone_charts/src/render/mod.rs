//! Turns a [`ChartSpec`] into a self-contained HTML document and, with the
//! `thumbnail` feature, a PNG preview.
//!
//! The templates are compiled into the binary. Each receives `symbol`,
//! `market_type`, `title`, `timestamp` and `dashboard_data` (the JSON payload).

#[cfg(feature = "thumbnail")]
mod thumbnail;

use chrono::{DateTime, Utc};
use minijinja::{Environment, context};
use serde::Serialize;
use snafu::ResultExt;
use zone_store::config::PublishCfg;

use crate::{
    chart::{ChartSpec, Flavor},
    error::{LoadTemplateSnafu, PayloadSnafu, RenderError, RenderTemplateSnafu},
};

pub const CHART_TEMPLATE: &str = "chart.html";
pub const DASHBOARD_TEMPLATE: &str = "dashboard.html";
const COMMON_TEMPLATE: &str = "chart_common.html";

/// `YYYY-mm-dd HH:MM:SS UTC`.
pub fn generated_at_label(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[derive(Serialize)]
struct Payload<'a> {
    #[serde(flatten)]
    spec: &'a ChartSpec,
    generated_at: String,
}

/// JSON embedded in the document. `</` is escaped so the payload cannot close its `<script>`.
pub fn payload_json(spec: &ChartSpec, generated_at: DateTime<Utc>) -> Result<String, RenderError> {
    let json = serde_json::to_string(&Payload {
        spec,
        generated_at: generated_at_label(generated_at),
    })
    .context(PayloadSnafu)?;
    Ok(json.replace("</", "<\\/"))
}

/// HTML and thumbnail renderer.
pub struct Renderer {
    env: Environment<'static>,
    thumbnail_width: u32,
    thumbnail_height: u32,
}

impl Renderer {
    pub fn new(publish: &PublishCfg) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        for (name, source) in [
            (COMMON_TEMPLATE, include_str!("../../templates/chart_common.html")),
            (CHART_TEMPLATE, include_str!("../../templates/chart.html")),
            (DASHBOARD_TEMPLATE, include_str!("../../templates/dashboard.html")),
        ] {
            env.add_template(name, source)
                .context(LoadTemplateSnafu { name })?;
        }
        Ok(Self {
            env,
            thumbnail_width: publish.thumbnail_width,
            thumbnail_height: publish.thumbnail_height,
        })
    }

    /// Render the interactive document.
    pub fn render(&self, spec: &ChartSpec, generated_at: DateTime<Utc>) -> Result<String, RenderError> {
        let name = match spec.flavor {
            Flavor::Dashboard => DASHBOARD_TEMPLATE,
            _ => CHART_TEMPLATE,
        };
        let payload = payload_json(spec, generated_at)?;
        let template = self
            .env
            .get_template(name)
            .context(RenderTemplateSnafu { name })?;
        template
            .render(context! {
                symbol => &spec.symbol,
                market_type => &spec.market_type,
                title => &spec.title,
                timestamp => generated_at_label(generated_at),
                dashboard_data => payload,
            })
            .context(RenderTemplateSnafu { name })
    }

    /// Static PNG preview of the first bucket. `Ok(None)` when built without a rasterizer.
    pub fn render_thumbnail(&self, spec: &ChartSpec) -> Result<Option<Vec<u8>>, RenderError> {
        #[cfg(feature = "thumbnail")]
        {
            thumbnail::rasterize(spec, self.thumbnail_width, self.thumbnail_height).map(Some)
        }
        #[cfg(not(feature = "thumbnail"))]
        {
            tracing::warn!(
                symbol = %spec.symbol,
                width = self.thumbnail_width,
                height = self.thumbnail_height,
                "thumbnail support not compiled in; skipping"
            );
            Ok(None)
        }
    }
}
