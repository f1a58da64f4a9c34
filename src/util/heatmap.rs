// External imports
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use log::info;
use std::path::Path;

// Internal imports
use crate::gesture::step_7_evaluation::ConfusionMatrix;

const CELL: u32 = 96;
const MARGIN_LEFT: u32 = 72;
const MARGIN_TOP: u32 = 88;
const PAD: u32 = 16;
const FONT_SCALE: u32 = 4;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_DARK: Rgb<u8> = Rgb([20, 20, 20]);
const TEXT_LIGHT: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([200, 200, 200]);

// Ends of the blue color ramp
const LOW: [f64; 3] = [247.0, 251.0, 255.0];
const HIGH: [f64; 3] = [8.0, 48.0, 107.0];

/// 3x5 glyphs, one row per byte, bits 2..0 left to right
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        _ => return None,
    };
    Some(rows)
}

/// Pixel width of `text` at the heatmap font scale
fn text_width(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        0
    } else {
        chars * 4 * FONT_SCALE - FONT_SCALE
    }
}

fn put_pixel_checked(img: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, color);
    }
}

/// Draw `text` with its top-left corner at (x, y); unknown characters render as blanks
fn draw_text(img: &mut RgbImage, text: &str, x: u32, y: u32, color: Rgb<u8>) {
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let origin_x = x + i as u32 * 4 * FONT_SCALE;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for dy in 0..FONT_SCALE {
                    for dx in 0..FONT_SCALE {
                        put_pixel_checked(
                            img,
                            origin_x + col * FONT_SCALE + dx,
                            y + row as u32 * FONT_SCALE + dy,
                            color,
                        );
                    }
                }
            }
        }
    }
}

fn draw_text_centered(img: &mut RgbImage, text: &str, center_x: u32, center_y: u32, color: Rgb<u8>) {
    let x = center_x.saturating_sub(text_width(text) / 2);
    let y = center_y.saturating_sub(5 * FONT_SCALE / 2);
    draw_text(img, text, x, y, color);
}

/// Color of a cell holding `fraction` of the largest count
pub fn cell_color(fraction: f64) -> Rgb<u8> {
    let t = fraction.clamp(0.0, 1.0);
    let mix = |i: usize| (LOW[i] + (HIGH[i] - LOW[i]) * t).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

/// Render the confusion matrix as an annotated heatmap
///
/// Rows are true classes, columns predicted classes. Darker cells hold
/// larger counts; counts are written in each cell.
pub fn render_confusion_heatmap(matrix: &ConfusionMatrix) -> RgbImage {
    let n = matrix.num_classes() as u32;
    let width = MARGIN_LEFT + n * CELL + PAD;
    let height = MARGIN_TOP + n * CELL + PAD;
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    let max_count = matrix.max_count().max(1) as f64;

    draw_text_centered(&mut img, "PREDICTED", MARGIN_LEFT + n * CELL / 2, PAD + 10, TEXT_DARK);
    draw_text(&mut img, "TRUE", 4, PAD, TEXT_DARK);

    for (col, name) in matrix.class_names.iter().enumerate() {
        let cx = MARGIN_LEFT + col as u32 * CELL + CELL / 2;
        draw_text_centered(&mut img, name, cx, MARGIN_TOP - 20, TEXT_DARK);
    }

    for (row, counts) in matrix.counts.iter().enumerate() {
        let top = MARGIN_TOP + row as u32 * CELL;
        draw_text_centered(&mut img, &matrix.class_names[row], MARGIN_LEFT / 2, top + CELL / 2, TEXT_DARK);

        for (col, &count) in counts.iter().enumerate() {
            let left = MARGIN_LEFT + col as u32 * CELL;
            let fraction = count as f64 / max_count;
            let fill = cell_color(fraction);
            for y in top..top + CELL {
                for x in left..left + CELL {
                    let on_border = y == top || x == left || y == top + CELL - 1 || x == left + CELL - 1;
                    img.put_pixel(x, y, if on_border { GRID } else { fill });
                }
            }
            let text_color = if fraction > 0.5 { TEXT_LIGHT } else { TEXT_DARK };
            draw_text_centered(
                &mut img,
                &count.to_string(),
                left + CELL / 2,
                top + CELL / 2,
                text_color,
            );
        }
    }

    img
}

/// Render the heatmap and write it as a PNG
pub fn save_confusion_heatmap(matrix: &ConfusionMatrix, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create heatmap directory")?;
        }
    }
    render_confusion_heatmap(matrix)
        .save(path)
        .with_context(|| format!("Failed to write heatmap to {}", path.display()))?;
    info!("Confusion matrix heatmap saved to {}", path.display());
    Ok(())
}
