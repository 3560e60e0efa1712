//! Rendering: rasterizes the scene and encodes it as JPEG.
//!
//! This module is the only place that touches `tiny_skia` and the JPEG
//! encoder. It receives a read-only scene and produces bytes; it never
//! mutates node state, so it can run on a blocking worker thread.
//!
//! Projector nodes expect bottom-up rows, so broadcast frames are mirrored
//! vertically before encoding. The debug snapshot is not.

use std::path::Path;

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont, point};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect as SkiaRect, Transform};

use crate::scene::{Item, ItemKind, Point, Rgba, Scene};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to allocate {width}x{height} pixmap")]
    PixmapCreationFailed { width: u32, height: u32 },

    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to read font {path}: {source}")]
    FontRead { path: String, source: std::io::Error },

    #[error("invalid font {path}")]
    InvalidFont { path: String },
}

/// Row order of the encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    TopDown,
    /// Rows reversed (vertical mirror).
    Mirrored,
}

// =============================================================================
// RENDERER
// =============================================================================

pub struct SceneRenderer {
    jpeg_quality: u8,
    font: Option<FontVec>,
}

impl SceneRenderer {
    #[must_use]
    pub fn new(jpeg_quality: u8, font: Option<FontVec>) -> Self {
        Self { jpeg_quality: jpeg_quality.clamp(1, 100), font }
    }

    #[must_use]
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Rasterize and encode the scene in one step.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the pixmap cannot be allocated or the
    /// encoder fails.
    pub fn render_jpeg(&self, scene: &Scene, orientation: Orientation) -> Result<Vec<u8>, RenderError> {
        let pixmap = self.rasterize(scene)?;
        let rgb = to_rgb(&pixmap, orientation);
        encode_jpeg(&rgb, pixmap.width(), pixmap.height(), self.jpeg_quality)
    }

    /// Draw the visible items over the scene background.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PixmapCreationFailed`] for sizes tiny-skia rejects.
    pub fn rasterize(&self, scene: &Scene) -> Result<Pixmap, RenderError> {
        let (width, height) = (scene.width_px(), scene.height_px());
        let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::PixmapCreationFailed { width, height })?;
        let bg = scene.background();
        pixmap.fill(tiny_skia::Color::from_rgba8(bg.r, bg.g, bg.b, bg.a));

        for item in scene.visible_items() {
            self.draw_item(&mut pixmap, item);
        }
        Ok(pixmap)
    }

    fn draw_item(&self, pixmap: &mut Pixmap, item: &Item) {
        match &item.kind {
            ItemKind::Rect { width, height } => {
                let Some(rect) = skia_rect(item.pos, *width, *height) else {
                    return;
                };
                pixmap.fill_rect(rect, &paint_for(item.color), Transform::identity(), None);
            }
            ItemKind::Ellipse { width, height } => {
                let Some(path) = skia_rect(item.pos, *width, *height).and_then(PathBuilder::from_oval) else {
                    return;
                };
                pixmap.fill_path(&path, &paint_for(item.color), FillRule::Winding, Transform::identity(), None);
            }
            ItemKind::Text { text, size_px } => {
                let Some(font) = &self.font else {
                    tracing::debug!(id = %item.id, "render: no font loaded, text item skipped");
                    return;
                };
                draw_text(pixmap, font, text, item.pos, *size_px, item.color);
            }
        }
    }
}

/// Load a TTF/OTF file for text items.
///
/// # Errors
///
/// Returns [`RenderError::FontRead`] or [`RenderError::InvalidFont`].
pub fn load_font(path: &Path) -> Result<FontVec, RenderError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| RenderError::FontRead { path: display.clone(), source })?;
    FontVec::try_from_vec(bytes).map_err(|_| RenderError::InvalidFont { path: display })
}

// =============================================================================
// HELPERS
// =============================================================================

#[allow(clippy::cast_possible_truncation)]
fn skia_rect(pos: Point, width: f64, height: f64) -> Option<SkiaRect> {
    SkiaRect::from_xywh(pos.x as f32, pos.y as f32, width as f32, height as f32)
}

fn paint_for(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn draw_text(pixmap: &mut Pixmap, font: &FontVec, text: &str, origin: Point, size_px: f64, color: Rgba) {
    let scale = PxScale::from(size_px as f32);
    let scaled = font.as_scaled(scale);
    let mut caret = point(origin.x as f32, origin.y as f32 + scaled.ascent());
    let mut prev: Option<GlyphId> = None;

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = prev {
            caret.x += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, caret);
        caret.x += scaled.h_advance(id);
        prev = Some(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i64 + i64::from(gx);
            let y = bounds.min.y as i64 + i64::from(gy);
            blend_pixel(pixmap, x, y, color, coverage);
        });
    }
}

/// Source-over blend of one coverage sample into a premultiplied pixmap.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_pixel(pixmap: &mut Pixmap, x: i64, y: i64, color: Rgba, coverage: f32) {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    if x >= pixmap.width() || y >= pixmap.height() {
        return;
    }
    let idx = (y * pixmap.width() + x) as usize;
    let dst = pixmap.pixels()[idx];

    let src_a = coverage.clamp(0.0, 1.0) * f32::from(color.a) / 255.0;
    let inv = 1.0 - src_a;
    let mix = |src: u8, dst: u8| (f32::from(src) * src_a + f32::from(dst) * inv).round().min(255.0) as u8;

    let a = (255.0 * src_a + f32::from(dst.alpha()) * inv).round().min(255.0) as u8;
    let r = mix(color.r, dst.red()).min(a);
    let g = mix(color.g, dst.green()).min(a);
    let b = mix(color.b, dst.blue()).min(a);
    if let Some(px) = PremultipliedColorU8::from_rgba(r, g, b, a) {
        pixmap.pixels_mut()[idx] = px;
    }
}

/// Flatten a premultiplied RGBA pixmap to packed RGB rows.
fn to_rgb(pixmap: &Pixmap, orientation: Orientation) -> Vec<u8> {
    let width = pixmap.width() as usize;
    let pixels = pixmap.pixels();
    let mut out = Vec::with_capacity(pixels.len() * 3);

    let mut push_row = |row: &[PremultipliedColorU8]| {
        for px in row {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue()]);
        }
    };
    match orientation {
        Orientation::TopDown => pixels.chunks_exact(width).for_each(&mut push_row),
        Orientation::Mirrored => pixels.chunks_exact(width).rev().for_each(&mut push_row),
    }
    out
}

fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode(rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(out)
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
