//! Locating a template image on a screenshot.
//!
//! Normalized cross-correlation over grayscale images. Large templates are
//! searched on a downscaled copy of both images, so the reported centre is
//! accurate to the scale factor.

use crate::types::Point;
use image::imageops::{self, FilterType};
use image::GrayImage;
use tracing::debug;

/// Smallest template side kept after downscaling.
const MIN_SEARCH_SIDE: u32 = 16;
const MAX_SCALE: u32 = 8;

/// The best match for a template, in screen pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub top_left: Point,
    pub center: Point,
    /// Normalized correlation in [-1, 1]; 1 is a perfect match.
    pub score: f64,
}

/// Find the centre of `template` in `screen` if the best match scores at
/// least `confidence`.
pub fn locate_center(screen: &GrayImage, template: &GrayImage, confidence: f64) -> Option<Point> {
    best_match(screen, template)
        .filter(|m| m.score >= confidence)
        .map(|m| m.center)
}

/// Best-scoring placement of `template` inside `screen`.
pub fn best_match(screen: &GrayImage, template: &GrayImage) -> Option<Match> {
    let (tw, th) = template.dimensions();
    let (sw, sh) = screen.dimensions();
    if tw == 0 || th == 0 || tw > sw || th > sh {
        return None;
    }

    let scale = (tw.min(th) / MIN_SEARCH_SIDE).clamp(1, MAX_SCALE);
    let (screen_s, template_s) = if scale > 1 {
        (
            imageops::resize(screen, sw / scale, sh / scale, FilterType::Triangle),
            imageops::resize(template, tw / scale, th / scale, FilterType::Triangle),
        )
    } else {
        (screen.clone(), template.clone())
    };

    let (x, y, score) = search(&screen_s, &template_s)?;
    let top_left = Point::new((x * scale) as i32, (y * scale) as i32);
    let center = Point::new(top_left.x + (tw / 2) as i32, top_left.y + (th / 2) as i32);
    debug!(scale, score, %center, "Template search finished");

    Some(Match {
        top_left,
        center,
        score,
    })
}

fn search(screen: &GrayImage, template: &GrayImage) -> Option<(u32, u32, f64)> {
    let (tw, th) = template.dimensions();
    let (sw, sh) = screen.dimensions();
    if tw == 0 || th == 0 || tw > sw || th > sh {
        return None;
    }

    let n = f64::from(tw * th);
    let t_mean = template.pixels().map(|p| f64::from(p[0])).sum::<f64>() / n;
    let t_centered: Vec<f64> = template.pixels().map(|p| f64::from(p[0]) - t_mean).collect();
    let t_norm = t_centered.iter().map(|v| v * v).sum::<f64>();

    let integral = Integral::new(screen);
    let pixels: Vec<f64> = screen.pixels().map(|p| f64::from(p[0])).collect();
    let stride = sw as usize;

    let mut best: Option<(u32, u32, f64)> = None;
    for y in 0..=(sh - th) {
        for x in 0..=(sw - tw) {
            let (sum, sum_sq) = integral.window(x, y, tw, th);
            let w_mean = sum / n;
            let w_norm = (sum_sq - n * w_mean * w_mean).max(0.0);

            let score = if t_norm <= f64::EPSILON || w_norm <= f64::EPSILON {
                // flat template or window: compare brightness only
                if t_norm <= f64::EPSILON && w_norm <= f64::EPSILON {
                    1.0 - (t_mean - w_mean).abs() / 255.0
                } else {
                    0.0
                }
            } else {
                let mut cross = 0.0;
                for ty in 0..th as usize {
                    let row = (y as usize + ty) * stride + x as usize;
                    let t_row = ty * tw as usize;
                    for tx in 0..tw as usize {
                        cross += t_centered[t_row + tx] * pixels[row + tx];
                    }
                }
                cross / (t_norm * w_norm).sqrt()
            };

            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((x, y, score));
            }
        }
    }
    best
}

/// Summed-area tables of pixel values and squared values.
struct Integral {
    width: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Integral {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = image.dimensions();
        let width = w as usize + 1;
        let mut sum = vec![0.0; width * (h as usize + 1)];
        let mut sum_sq = sum.clone();
        for y in 0..h as usize {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w as usize {
                let v = f64::from(image.get_pixel(x as u32, y as u32)[0]);
                row += v;
                row_sq += v * v;
                let i = (y + 1) * width + x + 1;
                sum[i] = sum[i - width] + row;
                sum_sq[i] = sum_sq[i - width] + row_sq;
            }
        }
        Self { width, sum, sum_sq }
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |table: &[f64], x: usize, y: usize| table[y * self.width + x];
        let area = |table: &[f64]| {
            at(table, x1, y1) - at(table, x0, y1) - at(table, x1, y0) + at(table, x0, y0)
        };
        (area(&self.sum), area(&self.sum_sq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
        let mut state = seed;
        GrayImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            Luma([(state >> 16) as u8])
        })
    }

    #[test]
    fn test_finds_template_cut_from_screen() {
        let screen = noise(200, 150, 7);
        let template = imageops::crop_imm(&screen, 120, 40, 32, 24).to_image();

        let found = best_match(&screen, &template).unwrap();
        assert_eq!(found.top_left, Point::new(120, 40));
        assert!(found.score > 0.99);
        assert_eq!(
            locate_center(&screen, &template, 0.9),
            Some(Point::new(136, 52))
        );
    }

    #[test]
    fn test_large_template_is_found_on_downscaled_images() {
        let screen = GrayImage::from_fn(320, 240, |x, y| {
            if (100..164).contains(&x) && (80..144).contains(&y) {
                Luma([((x * 7 + y * 3) % 200) as u8 + 40])
            } else {
                Luma([10])
            }
        });
        let template = imageops::crop_imm(&screen, 100, 80, 64, 64).to_image();

        let center = locate_center(&screen, &template, 0.8).unwrap();
        assert!((center.x - 132).abs() <= 4, "{center}");
        assert!((center.y - 112).abs() <= 4, "{center}");
    }

    #[test]
    fn test_unrelated_template_is_rejected() {
        let screen = noise(120, 90, 1);
        let template = noise(20, 20, 99);
        assert_eq!(locate_center(&screen, &template, 0.99), None);
    }

    #[test]
    fn test_template_larger_than_screen() {
        let screen = noise(10, 10, 3);
        let template = noise(20, 5, 4);
        assert!(best_match(&screen, &template).is_none());
    }
}
