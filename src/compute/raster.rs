//! Rasterizer: composites a genome's shapes onto a background canvas.
//!
//! Each shape is filled opaquely into a coverage mask with `imageproc`, then
//! every covered pixel is blended with the shape color at a fixed alpha
//! (`dst = dst * (1 - alpha) + color * alpha`), genes in genome order.
//! Positions and sizes are scaled to pixels and rounded; a shape whose
//! pixel size rounds to zero covers nothing.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

use super::Canvas;
use crate::schema::{Genome, Shape};

const COVERED: Luma<u8> = Luma([u8::MAX]);

/// Render `genome` onto a copy of `background`.
pub fn render(genome: &Genome, background: &Canvas, alpha: f64) -> Canvas {
    let mut canvas = background.clone();
    render_into(genome, &mut canvas, alpha);
    canvas
}

/// Render `genome` in place over whatever `canvas` already holds.
pub fn render_into(genome: &Genome, canvas: &mut Canvas, alpha: f64) {
    let mut mask = GrayImage::new(canvas.width() as u32, canvas.height() as u32);
    for shape in &genome.genes {
        draw_shape(canvas, &mut mask, shape, alpha);
    }
}

/// Draw a single shape. `mask` must match the canvas dimensions and be
/// clear on entry; it is left clear on return.
pub fn draw_shape(canvas: &mut Canvas, mask: &mut GrayImage, shape: &Shape, alpha: f64) {
    debug_assert_eq!(
        (mask.width() as usize, mask.height() as usize),
        canvas.dimensions()
    );

    if !mark_coverage(mask, shape, canvas.width() as f64, canvas.height() as f64) {
        return;
    }

    let color = shape.color();
    for (covered, px) in mask.iter_mut().zip(canvas.pixels_mut()) {
        if *covered != 0 {
            blend(px, color, alpha);
            *covered = 0;
        }
    }
}

/// Fill the shape's footprint into `mask`. Returns false when the shape
/// is too small to cover any pixel.
fn mark_coverage(mask: &mut GrayImage, shape: &Shape, w: f64, h: f64) -> bool {
    match *shape {
        Shape::Circle { x, y, radius, .. } => {
            let r = (radius * w).round() as i32;
            if r < 1 {
                return false;
            }
            draw_filled_circle_mut(mask, to_pixel(x * w, y * h), r, COVERED);
        }
        Shape::Rectangle {
            x,
            y,
            width,
            height,
            ..
        } => {
            let (pw, ph) = ((width * w).round(), (height * h).round());
            if pw < 1.0 || ph < 1.0 {
                return false;
            }
            let (left, top) = to_pixel(x * w - pw / 2.0, y * h - ph / 2.0);
            let rect = Rect::at(left, top).of_size(pw as u32, ph as u32);
            draw_filled_rect_mut(mask, rect, COVERED);
        }
        Shape::Ellipse {
            x,
            y,
            radius_x,
            radius_y,
            ..
        } => {
            let (rx, ry) = ((radius_x * w).round() as i32, (radius_y * h).round() as i32);
            if rx < 1 || ry < 1 {
                return false;
            }
            draw_filled_ellipse_mut(mask, to_pixel(x * w, y * h), rx, ry, COVERED);
        }
    }
    true
}

#[inline]
fn to_pixel(x: f64, y: f64) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

#[inline]
fn blend(dst: &mut [f64; 3], color: [f64; 3], alpha: f64) {
    for (d, c) in dst.iter_mut().zip(color) {
        *d = *d * (1.0 - alpha) + c * alpha;
    }
}
