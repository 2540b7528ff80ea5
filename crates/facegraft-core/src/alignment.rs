//! Face alignment via 4-DOF similarity transform.
//!
//! Aligns detected faces to a canonical square crop using the five
//! InsightFace reference landmarks and least-squares estimation, and warps
//! rendered crops back into the original frame.

use crate::types::FaceBox;
use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Fraction of the crop size over which paste-back fades in from the crop edge.
const CROP_FEATHER_FRACTION: f32 = 0.1;

/// Fraction of the smaller box side over which paste-back fades in from the
/// adjusted box edge.
const BOX_FEATHER_FRACTION: f32 = 0.1;

/// Reference landmarks scaled for a `size`×`size` crop.
///
/// Multiples of 112 scale the ArcFace template directly. Other sizes use the
/// 128-pixel layout, which is the 112 template shifted right by 8 pixels.
pub fn reference_landmarks(size: usize) -> [(f32, f32); 5] {
    let (ratio, diff_x) = if size % 112 == 0 {
        (size as f32 / 112.0, 0.0)
    } else {
        let ratio = size as f32 / 128.0;
        (ratio, 8.0 * ratio)
    };
    REFERENCE_LANDMARKS_112.map(|(x, y)| (x * ratio + diff_x, y * ratio))
}

/// Estimate a 2×3 similarity transform (4-DOF: scale, rotation, translation)
/// from `src` landmarks to `dst` landmarks using least-squares.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
pub fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Normal equations of A * [a, b, tx, ty]^T = B, where each point pair gives
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16];
    let mut atb = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];

        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let x = solve_4x4(&ata, &atb);
    let (a, b, tx, ty) = (x[0], x[1], x[2], x[3]);

    [a, -b, tx, b, a, ty]
}

/// Solve a 4×4 linear system via Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = ata[i * 4 + j];
        }
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut max_row = col;
        let mut max_val = m[col][col].abs();
        for row in (col + 1)..4 {
            if m[row][col].abs() > max_val {
                max_val = m[row][col].abs();
                max_row = row;
            }
        }
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }

    x
}

/// Bilinear RGB sample at a sub-pixel position. Out-of-bounds taps read black.
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let (w, h) = (image.width() as i64, image.height() as i64);

    let tap = |px: i64, py: i64| -> [f32; 3] {
        if px >= 0 && px < w && py >= 0 && py < h {
            let Rgb(c) = *image.get_pixel(px as u32, py as u32);
            [c[0] as f32, c[1] as f32, c[2] as f32]
        } else {
            [0.0; 3]
        }
    };

    let (tl, tr) = (tap(x0, y0), tap(x0 + 1, y0));
    let (bl, br) = (tap(x0, y0 + 1), tap(x0 + 1, y0 + 1));

    std::array::from_fn(|c| {
        tl[c] * (1.0 - fx) * (1.0 - fy)
            + tr[c] * fx * (1.0 - fy)
            + bl[c] * (1.0 - fx) * fy
            + br[c] * fx * fy
    })
}

fn to_rgb(values: [f32; 3]) -> Rgb<u8> {
    Rgb(values.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

/// Apply a 2×3 similarity warp (frame → crop) to produce an `out_size` crop.
///
/// Each output pixel is mapped back into the frame through the inverse.
pub fn warp_affine(frame: &RgbImage, matrix: &[f32; 6], out_size: u32) -> RgbImage {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);

    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return RgbImage::new(out_size, out_size);
    }
    let ia = a / det;
    let ib = b / det;

    RgbImage::from_fn(out_size, out_size, |ox, oy| {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;
        to_rgb(sample_bilinear(frame, sx, sy))
    })
}

/// Align a face to a canonical `size`×`size` crop.
///
/// Returns the crop and the frame → crop matrix used to produce it.
pub fn norm_crop(frame: &RgbImage, landmarks: &[(f32, f32); 5], size: u32) -> (RgbImage, [f32; 6]) {
    let matrix = estimate_similarity_transform(landmarks, &reference_landmarks(size as usize));
    (warp_affine(frame, &matrix, size), matrix)
}

/// Composite a rendered crop back into a copy of `frame`.
///
/// `matrix` is the frame → crop transform the crop was aligned with. Only
/// pixels inside `region` change, and the blend weight ramps up from both
/// the crop border and the region border so no hard seam is left.
pub fn paste_back(frame: &RgbImage, crop: &RgbImage, matrix: &[f32; 6], region: &FaceBox) -> RgbImage {
    let mut out = frame.clone();
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);

    let crop_max = crop.width().min(crop.height()) as f32 - 1.0;
    if crop_max <= 0.0 {
        return out;
    }
    let crop_feather = (crop_max + 1.0) * CROP_FEATHER_FRACTION;
    let box_feather = (region.width().min(region.height()) * BOX_FEATHER_FRACTION).max(1.0);

    let x_start = region.x1.max(0.0).floor() as u32;
    let y_start = region.y1.max(0.0).floor() as u32;
    let x_end = (region.x2.ceil().max(0.0) as u32).min(frame.width());
    let y_end = (region.y2.ceil().max(0.0) as u32).min(frame.height());

    for y in y_start..y_end {
        for x in x_start..x_end {
            let (fx, fy) = (x as f32, y as f32);
            if !region.contains(fx, fy) {
                continue;
            }

            let cx = a * fx - b * fy + tx;
            let cy = b * fx + a * fy + ty;
            if cx < 0.0 || cy < 0.0 || cx > crop_max || cy > crop_max {
                continue;
            }

            let crop_edge = cx.min(cy).min(crop_max - cx).min(crop_max - cy);
            let box_edge = (fx - region.x1)
                .min(fy - region.y1)
                .min(region.x2 - 1.0 - fx)
                .min(region.y2 - 1.0 - fy);
            let weight = ((crop_edge / crop_feather).clamp(0.0, 1.0)
                * (box_edge / box_feather).clamp(0.0, 1.0))
            .clamp(0.0, 1.0);
            if weight <= 0.0 {
                continue;
            }

            let swapped = sample_bilinear(crop, cx, cy);
            let Rgb(orig) = *frame.get_pixel(x, y);
            let blended: [f32; 3] =
                std::array::from_fn(|c| orig[c] as f32 * (1.0 - weight) + swapped[c] * weight);
            out.put_pixel(x, y, to_rgb(blended));
        }
    }

    out
}
