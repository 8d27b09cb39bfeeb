//! PNG preview drawn straight from the chart specification.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use image::{ImageFormat, Rgb, RgbImage};

use zone_store::models::Candle;

use crate::{
    chart::{ChartSpec, TimeframeBucket},
    error::{RasterSnafu, RenderError},
    style::{LineStyle, parse_color},
};

const MARGIN: f64 = 40.0;
const PRICE_SHARE: f64 = 0.78;
const GAP: f64 = 10.0;

fn rgb(css: &str) -> (Rgb<u8>, f32) {
    parse_color(css)
        .map(|(c, a)| (Rgb(c), a))
        .unwrap_or((Rgb([255, 255, 255]), 1.0))
}

fn blend_pixel(img: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>, alpha: f32) {
    if x >= img.width() || y >= img.height() {
        return;
    }
    let a = alpha.clamp(0.0, 1.0);
    let px = img.get_pixel_mut(x, y);
    for i in 0..3 {
        px.0[i] = (f32::from(px.0[i]) * (1.0 - a) + f32::from(color.0[i]) * a).round() as u8;
    }
}

fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>, alpha: f32) {
    for y in y0.min(y1)..=y0.max(y1) {
        for x in x0.min(x1)..=x0.max(x1) {
            blend_pixel(img, x, y, color, alpha);
        }
    }
}

fn vertical_line(img: &mut RgbImage, x: u32, y0: u32, y1: u32, color: Rgb<u8>) {
    fill_rect(img, x, y0, x, y1, color, 1.0);
}

/// Horizontal line with a dash pattern of `(on, off)` pixels.
fn horizontal_line(img: &mut RgbImage, y: u32, x0: u32, x1: u32, color: Rgb<u8>, style: LineStyle) {
    let (on, off) = match style {
        LineStyle::Solid => (1, 0),
        LineStyle::Dotted => (2, 4),
        LineStyle::Dashed => (8, 6),
    };
    for x in x0.min(x1)..=x0.max(x1) {
        if (x - x0.min(x1)) % (on + off) < on {
            blend_pixel(img, x, y, color, 1.0);
        }
    }
}

/// Plot geometry of the price and volume panels.
struct Frame {
    left: f64,
    width: f64,
    price_top: f64,
    price_height: f64,
    volume_bottom: f64,
    volume_height: f64,
    lo: f64,
    hi: f64,
    max_x: u32,
    max_y: u32,
}

impl Frame {
    fn new(img: &RgbImage, lo: f64, hi: f64) -> Self {
        let w = f64::from(img.width());
        let h = f64::from(img.height());
        let inner_h = (h - 2.0 * MARGIN).max(2.0);
        let price_height = inner_h * PRICE_SHARE;
        Self {
            left: MARGIN.min(w / 4.0),
            width: (w - 2.0 * MARGIN).max(1.0),
            price_top: MARGIN.min(h / 4.0),
            price_height,
            volume_bottom: h - MARGIN.min(h / 4.0),
            volume_height: (inner_h - price_height - GAP).max(1.0),
            lo,
            hi,
            max_x: img.width().saturating_sub(1),
            max_y: img.height().saturating_sub(1),
        }
    }

    fn clamp(v: f64, max: u32) -> u32 {
        if v.is_nan() {
            return 0;
        }
        v.round().clamp(0.0, f64::from(max)) as u32
    }

    fn y(&self, price: f64) -> u32 {
        let t = (self.hi - price) / (self.hi - self.lo);
        Self::clamp(self.price_top + t * self.price_height, self.max_y)
    }

    fn x(&self, v: f64) -> u32 {
        Self::clamp(v, self.max_x)
    }
}

fn price_range(spec: &ChartSpec, bucket: &TimeframeBucket) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for c in bucket.candles.iter().chain(&bucket.formation_candles) {
        lo = lo.min(c.low);
        hi = hi.max(c.high);
    }
    for z in &bucket.zones {
        lo = lo.min(z.bottom);
        hi = hi.max(z.top);
    }
    for l in &spec.lines {
        lo = lo.min(l.price);
        hi = hi.max(l.price);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi <= lo {
        hi = lo + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Fractional slot position of `ts` on the candle axis, interpolating between
/// neighbouring candles so off-grid times land between them.
fn slot_position(candles: &[Candle], ts: DateTime<Utc>) -> f64 {
    let i = candles.partition_point(|c| c.timestamp < ts);
    if i == 0 {
        return 0.0;
    }
    if i == candles.len() {
        return (candles.len() - 1) as f64;
    }
    let (prev, next) = (candles[i - 1].timestamp, candles[i].timestamp);
    let span = (next - prev).num_seconds() as f64;
    let into = (ts - prev).num_seconds() as f64;
    (i - 1) as f64 + if span > 0.0 { into / span } else { 0.0 }
}

fn draw_candle(
    img: &mut RgbImage,
    frame: &Frame,
    c: &Candle,
    center: f64,
    body: f64,
    body_color: Rgb<u8>,
    wick_color: Rgb<u8>,
) -> (u32, u32) {
    let x = frame.x(center);
    vertical_line(img, x, frame.y(c.high), frame.y(c.low), wick_color);
    let bx0 = frame.x(center - body / 2.0);
    let bx1 = frame.x(center + body / 2.0);
    fill_rect(img, bx0, frame.y(c.open.max(c.close)), bx1, frame.y(c.open.min(c.close)), body_color, 1.0);
    (bx0, bx1)
}

fn draw_bucket(img: &mut RgbImage, spec: &ChartSpec, bucket: &TimeframeBucket) {
    let candles = &bucket.candles;
    let (lo, hi) = price_range(spec, bucket);
    let frame = Frame::new(img, lo, hi);
    let slot = frame.width / candles.len() as f64;
    let body = (slot * 0.7).max(1.0);
    let index_at = |ts: DateTime<Utc>| candles.partition_point(|c| c.timestamp < ts);

    for zone in &bucket.zones {
        let start = index_at(zone.start_time);
        let end = zone.end_time.map(index_at).unwrap_or(candles.len());
        let x0 = frame.x(frame.left + slot * start as f64);
        let x1 = frame.x(frame.left + slot * end as f64).max(x0);
        let (fill, alpha) = rgb(zone.colors.fill);
        let (border, _) = rgb(zone.colors.border);
        let (top, bottom) = (frame.y(zone.top), frame.y(zone.bottom));
        fill_rect(img, x0, top, x1, bottom, fill, alpha);
        let edge = if zone.is_broken { LineStyle::Dashed } else { LineStyle::Solid };
        horizontal_line(img, top, x0, x1, border, edge);
        horizontal_line(img, bottom, x0, x1, border, edge);
    }

    let (up, _) = rgb(spec.palette.up);
    let (down, _) = rgb(spec.palette.down);
    let (gold, _) = rgb(spec.palette.formation);
    let (amber, _) = rgb(spec.palette.formation_border);
    let max_volume = candles.iter().map(|c| c.volume).fold(0.0_f64, f64::max);

    for (i, c) in candles.iter().enumerate() {
        let center = frame.left + slot * (i as f64 + 0.5);
        let color = if c.is_up() { up } else { down };
        let (bx0, bx1) = draw_candle(img, &frame, c, center, body, color, color);

        if max_volume > 0.0 {
            let bar = c.volume / max_volume * frame.volume_height;
            let vy0 = Frame::clamp(frame.volume_bottom - bar, frame.max_y);
            let vy1 = Frame::clamp(frame.volume_bottom, frame.max_y);
            fill_rect(img, bx0, vy0, bx1, vy1, if c.is_up() { up } else { down }, 0.5);
        }
    }

    // Formation candles are their own series, placed by time over the chart candles.
    for c in &bucket.formation_candles {
        let center = frame.left + slot * (slot_position(candles, c.timestamp) + 0.5);
        draw_candle(img, &frame, c, center, body, gold, amber);
    }

    let x_end = frame.x(frame.left + frame.width);
    let x_start = frame.x(frame.left);
    for line in &spec.lines {
        let (color, _) = rgb(line.color);
        let y = frame.y(line.price);
        for dy in 0..u32::from(line.width.max(1)) {
            horizontal_line(img, (y + dy).min(frame.max_y), x_start, x_end, color, line.style);
        }
    }
}

/// PNG bytes of the first bucket of `spec`.
pub(crate) fn rasterize(spec: &ChartSpec, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let (background, _) = rgb(spec.palette.background);
    let mut img = RgbImage::from_pixel(width.max(1), height.max(1), background);
    if let Some(bucket) = spec.primary().filter(|b| !b.candles.is_empty()) {
        draw_bucket(&mut img, spec, bucket);
    }
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).map_err(|e| {
        RasterSnafu {
            message: e.to_string(),
        }
        .build()
    })?;
    Ok(out.into_inner())
}
