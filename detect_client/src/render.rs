//! Annotation of detections on the source image.
//!
//! Drawing goes through the [`Surface`] trait. [`RasterSurface`] draws into an [`RgbImage`] with
//! `imageproc`, other surfaces (e.g. for testing) may simply record what is drawn.
use common::protocol::{BBox, Detection};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use lazy_static::lazy_static;
use rusttype::{Font, Scale};

use crate::{error::RenderError, source::ImageSource};

pub const LINE_WIDTH: u32 = 3;
pub const FILL_ALPHA: f32 = 0.2;
pub const FONT_SIZE: f32 = 16.0;
pub const LABEL_HEIGHT: u32 = 24;
/// Horizontal padding of a label, split evenly on both sides of the text.
pub const LABEL_PADDING: u32 = 10;

/// Box colors by lowercase class name.
const CLASS_COLORS: &[(&str, [u8; 3])] = &[
    ("fire_extinguisher", [239, 68, 68]),
    ("oxygen_tank", [34, 197, 94]),
    ("toolkit", [59, 130, 246]),
];
const DEFAULT_COLOR: [u8; 3] = [168, 85, 247];
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];

/// Color used for boxes of the given class.
pub fn color_for_class(class_name: &str) -> Rgb<u8> {
    let key = class_name.to_lowercase();
    let rgb = CLASS_COLORS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, rgb)| *rgb)
        .unwrap_or(DEFAULT_COLOR);
    Rgb(rgb)
}

/// Coordinates and sizes of boxes are clamped to this magnitude, which leaves headroom for the
/// offsets applied while drawing.
const COORD_LIMIT: i32 = i32::MAX / 4;

/// Rectangle in surface pixels. May extend past the surface bounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip to a `width` x `height` surface grown by one pixel on every side, so that edges
    /// outside of the surface stay outside.
    fn clip(self, width: u32, height: u32) -> Option<PixelRect> {
        let x0 = (self.x as i64).max(-1);
        let y0 = (self.y as i64).max(-1);
        let x1 = (self.x as i64 + self.width as i64).min(width as i64 + 1);
        let y1 = (self.y as i64 + self.height as i64).min(height as i64 + 1);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelRect::new(
            x0 as i32,
            y0 as i32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }

    /// Convert to an `imageproc` rect, which cannot be empty.
    fn to_rect(self) -> Option<Rect> {
        match self.is_empty() {
            true => None,
            false => Some(Rect::at(self.x, self.y).of_size(self.width, self.height)),
        }
    }
}

impl From<BBox> for PixelRect {
    fn from(bbox: BBox) -> Self {
        let limit = COORD_LIMIT as f64;
        // NaN ends up as 0
        Self::new(
            bbox.x.round().clamp(-limit, limit) as i32,
            bbox.y.round().clamp(-limit, limit) as i32,
            bbox.width.round().clamp(0.0, limit) as u32,
            bbox.height.round().clamp(0.0, limit) as u32,
        )
    }
}

/// Something that annotations can be drawn onto.
pub trait Surface {
    /// Resize the surface to the image and draw it as base layer.
    fn draw_image(&mut self, image: &RgbImage);
    /// Outline `rect`, the line is centered on the rect's edges.
    fn stroke_rect(&mut self, rect: PixelRect, color: Rgb<u8>, line_width: u32);
    /// Fill `rect`, blending with what is already drawn by `alpha`.
    fn fill_rect(&mut self, rect: PixelRect, color: Rgb<u8>, alpha: f32);
    /// Width of `text` in pixels with the surface's font.
    fn measure_text(&self, text: &str) -> u32;
    /// Draw `text` with its top-left corner at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: i32, y: i32, color: Rgb<u8>);
}

/// Draw the image and all detections on the surface, in the order given.
///
/// Labels sit directly above their box. Boxes touching the top edge get labels which are partly
/// or entirely outside of the surface.
pub fn draw_annotations<S: Surface>(surface: &mut S, image: &RgbImage, detections: &[Detection]) {
    surface.draw_image(image);

    for detection in detections.iter() {
        let color = color_for_class(&detection.class_name);
        let rect = PixelRect::from(detection.bbox);

        surface.stroke_rect(rect, color, LINE_WIDTH);
        surface.fill_rect(rect, color, FILL_ALPHA);

        let label = detection.label();
        let label_rect = PixelRect::new(
            rect.x,
            rect.y.saturating_sub(LABEL_HEIGHT as i32),
            surface
                .measure_text(&label)
                .saturating_add(LABEL_PADDING)
                .min(COORD_LIMIT as u32),
            LABEL_HEIGHT,
        );
        surface.fill_rect(label_rect, color, 1.0);

        // Vertically center the text inside the label
        let text_x = label_rect.x.saturating_add((LABEL_PADDING / 2) as i32);
        let text_y = label_rect
            .y
            .saturating_add(((LABEL_HEIGHT as f32 - FONT_SIZE) / 2.0) as i32);
        surface.fill_text(&label, text_x, text_y, Rgb(LABEL_TEXT_COLOR));
    }
}

/// Decode the image source at native resolution and draw the detections onto it.
pub fn render(source: &ImageSource, detections: &[Detection]) -> Result<RgbImage, RenderError> {
    let image = image::load_from_memory(source.payload())?.to_rgb8();
    log::debug!(
        "Rendering {} detections on {}x{} image",
        detections.len(),
        image.width(),
        image.height()
    );

    let mut surface = RasterSurface::new(&DEJAVU_MONO);
    draw_annotations(&mut surface, &image, detections);

    Ok(surface.into_image())
}

/// Surface backed by an in-memory RGB image.
pub struct RasterSurface<'f> {
    canvas: RgbImage,
    font: &'f Font<'f>,
    scale: Scale,
}

impl<'f> RasterSurface<'f> {
    pub fn new(font: &'f Font<'f>) -> Self {
        Self {
            canvas: RgbImage::new(0, 0),
            font,
            scale: Scale::uniform(FONT_SIZE),
        }
    }

    pub fn into_image(self) -> RgbImage {
        self.canvas
    }
}

impl Surface for RasterSurface<'_> {
    fn draw_image(&mut self, image: &RgbImage) {
        self.canvas = image.clone();
    }

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgb<u8>, line_width: u32) {
        let (canvas_width, canvas_height) = self.canvas.dimensions();
        let half = (line_width.clamp(1, 64) as i64 - 1) / 2;
        for offset in -half..=half {
            let x = rect.x as i64 + offset;
            let y = rect.y as i64 + offset;
            let width = rect.width as i64 - 2 * offset;
            let height = rect.height as i64 - 2 * offset;
            if width <= 0 || height <= 0 {
                continue;
            }
            let outline = PixelRect::new(
                x.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
                y.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
                width.min(u32::MAX as i64) as u32,
                height.min(u32::MAX as i64) as u32,
            );
            // Only the visible part is handed on, imageproc walks every pixel of a line
            if let Some(outline) = outline
                .clip(canvas_width, canvas_height)
                .and_then(PixelRect::to_rect)
            {
                draw_hollow_rect_mut(&mut self.canvas, outline, color);
            }
        }
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgb<u8>, alpha: f32) {
        let (canvas_width, canvas_height) = self.canvas.dimensions();
        if alpha >= 1.0 {
            if let Some(rect) = rect
                .clip(canvas_width, canvas_height)
                .and_then(PixelRect::to_rect)
            {
                draw_filled_rect_mut(&mut self.canvas, rect, color);
            }
            return;
        }

        // Clip to the canvas
        let x0 = rect.x.max(0) as i64;
        let y0 = rect.y.max(0) as i64;
        let x1 = (rect.x as i64 + rect.width as i64).min(canvas_width as i64);
        let y1 = (rect.y as i64 + rect.height as i64).min(canvas_height as i64);

        for y in y0..y1 {
            for x in x0..x1 {
                let pixel = self.canvas.get_pixel_mut(x as u32, y as u32);
                for (channel, target) in pixel.0.iter_mut().zip(color.0.iter()) {
                    let blended = *channel as f32 * (1.0 - alpha) + *target as f32 * alpha;
                    *channel = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    fn measure_text(&self, text: &str) -> u32 {
        let (width, _height) = text_size(self.scale, self.font, text);
        width.max(0) as u32
    }

    fn fill_text(&mut self, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        let (canvas_width, canvas_height) = self.canvas.dimensions();
        // Text starting past the canvas or far before it cannot touch it
        if x > canvas_width as i32
            || y > canvas_height as i32
            || x < -COORD_LIMIT
            || y < -COORD_LIMIT
        {
            return;
        }
        draw_text_mut(&mut self.canvas, color, x, y, self.scale, self.font, text);
    }
}

lazy_static! {
    static ref DEJAVU_MONO: Font<'static> = {
        let font_data: &[u8] = include_bytes!("../../resources/DejaVuSansMono.ttf");
        let font: Font<'static> = Font::try_from_bytes(font_data).expect("failed to load font");
        font
    };
}
