//! Image-processing primitives shared by the heuristic detectors.
//!
//! Colour conventions follow the 8-bit OpenCV ones the detector thresholds were
//! tuned against:
//! - HSV: H in 0..=180 (degrees / 2), S and V in 0..=255
//! - Gray: BT.601 luma (0.299 R + 0.587 G + 0.114 B)

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::filter::laplacian_filter;
use imageproc::morphology::{close, open};
use imageproc::point::Point;

/// Three-channel image whose channels hold H, S, V instead of R, G, B.
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

const MASK_ON: u8 = 255;
const MASK_OFF: u8 = 0;

// ----------------------------------------------------------------------------
// Colour spaces
// ----------------------------------------------------------------------------

pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { delta * 255.0 / v } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        v as u8,
    ]
}

pub fn to_hsv(image: &RgbImage) -> HsvImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        Rgb(rgb_to_hsv(image.get_pixel(x, y).0))
    })
}

pub fn to_gray(image: &RgbImage) -> GrayImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(u32::from);
        let luma = (299 * r + 587 * g + 114 * b + 500) / 1000;
        Luma([luma.min(255) as u8])
    })
}

// ----------------------------------------------------------------------------
// Masks
// ----------------------------------------------------------------------------

/// Inclusive per-channel range test, like `cv2.inRange`.
pub fn in_range(hsv: &HsvImage, lower: [u8; 3], upper: [u8; 3]) -> GrayImage {
    ImageBuffer::from_fn(hsv.width(), hsv.height(), |x, y| {
        let px = hsv.get_pixel(x, y).0;
        let inside = (0..3).all(|c| px[c] >= lower[c] && px[c] <= upper[c]);
        Luma([if inside { MASK_ON } else { MASK_OFF }])
    })
}

pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    ImageBuffer::from_fn(a.width(), a.height(), |x, y| {
        let on = a.get_pixel(x, y)[0] > 0 || b.get_pixel(x, y)[0] > 0;
        Luma([if on { MASK_ON } else { MASK_OFF }])
    })
}

/// Binary threshold: strictly brighter than `level` becomes foreground.
pub fn threshold(gray: &GrayImage, level: u8) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y)[0] > level {
            MASK_ON
        } else {
            MASK_OFF
        }])
    })
}

/// Morphological close then open with an L1 (diamond) structuring element of
/// the given radius. Radius 1 is the 3x3 cross, radius 2 the 5x5 diamond.
pub fn close_then_open(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let closed = close(mask, Norm::L1, radius);
    open(&closed, Norm::L1, radius)
}

/// Population variance of the 3x3 Laplacian response.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let n = gray.width() as f64 * gray.height() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let response = laplacian_filter(gray);
    let (sum, sum_sq) = response.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
        let v = p[0] as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

// ----------------------------------------------------------------------------
// Contours
// ----------------------------------------------------------------------------

/// An external contour reduced to what the detectors score on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    /// Polygon area enclosed by the contour, in px².
    pub area: f64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Blob {
    /// Whether the bounding rectangle covers a whole `width` x `height` image.
    pub fn spans(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width >= width && self.height >= height
    }
}

/// Outermost contours of the foreground in `mask` (holes and nested shapes
/// are ignored). Foreground touching the image edge is traced like any other
/// region.
pub fn external_blobs(mask: &GrayImage) -> Vec<Blob> {
    // The tracer needs a background ring around every region.
    let padded = pad_with_background(mask);
    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|c| {
            let points: Vec<Point<i32>> = c
                .points
                .iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            blob_from_points(&points)
        })
        .collect()
}

fn pad_with_background(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);
    for (x, y, px) in mask.enumerate_pixels() {
        padded.put_pixel(x + 1, y + 1, *px);
    }
    padded
}

fn blob_from_points(points: &[Point<i32>]) -> Option<Blob> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(Blob {
        area: polygon_area(points),
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}
