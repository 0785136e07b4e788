//! Edge maps (Canny, Sobel, Laplacian) on 8-bit grayscale images.
//!
//! Sobel and Laplacian use separable kernels of any odd size from 3 to 15:
//! a binomial smoothing row convolved with a first or second difference.
//! Borders are mirrored without repeating the edge pixel. Every method ends
//! in the same min-max rescale to `[0, 255]`.

use crate::error::{Result, VisionError};
use crate::models::EdgeParameters;
use image::{GrayImage, Luma};
use imageproc::edges::canny;
use tracing::{debug, error};

/// Run the filter selected by `params` and return an 8-bit edge map with
/// the same dimensions as `gray`.
pub fn detect_edges(params: &EdgeParameters, gray: &GrayImage) -> Result<GrayImage> {
    if let Err(msg) = params.validate() {
        error!(operation = "detect_edges", method = %params.method(), "Edge detection failed: {}", msg);
        return Err(VisionError::Processing(format!("Edge detection failed: {}", msg)));
    }

    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        error!(operation = "detect_edges", "Edge detection failed: empty image");
        return Err(VisionError::Processing(
            "Edge detection failed: image has no pixels".to_string(),
        ));
    }

    let response = match *params {
        EdgeParameters::Canny {
            threshold1,
            threshold2,
        } => {
            let (low, high) = if threshold1 <= threshold2 {
                (threshold1, threshold2)
            } else {
                debug!(threshold1, threshold2, "Swapping descending Canny thresholds");
                (threshold2, threshold1)
            };
            canny(gray, low, high)
                .into_raw()
                .into_iter()
                .map(f32::from)
                .collect()
        }
        EdgeParameters::Sobel { kernel_size } => sobel_magnitude(gray, kernel_size as usize),
        EdgeParameters::Laplacian { kernel_size } => laplacian(gray, kernel_size as usize),
    };

    Ok(normalize_to_u8(width, height, &response))
}

fn to_f32(gray: &GrayImage) -> Vec<f32> {
    gray.as_raw().iter().map(|&v| f32::from(v)).collect()
}

fn sobel_magnitude(gray: &GrayImage, ksize: usize) -> Vec<f32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let src = to_f32(gray);
    let smooth = smoothing_kernel(ksize);
    let deriv = derivative_kernel(ksize, 1);

    let dx = convolve_separable(&src, w, h, &deriv, &smooth);
    let dy = convolve_separable(&src, w, h, &smooth, &deriv);
    dx.iter()
        .zip(&dy)
        .map(|(gx, gy)| (gx * gx + gy * gy).sqrt())
        .collect()
}

fn laplacian(gray: &GrayImage, ksize: usize) -> Vec<f32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let src = to_f32(gray);
    let smooth = smoothing_kernel(ksize);
    let second = derivative_kernel(ksize, 2);

    let dxx = convolve_separable(&src, w, h, &second, &smooth);
    let dyy = convolve_separable(&src, w, h, &smooth, &second);
    dxx.iter().zip(&dyy).map(|(a, b)| a + b).collect()
}

/// Row `n` of Pascal's triangle, e.g. `binomial(2) = [1, 2, 1]`.
fn binomial(n: usize) -> Vec<f32> {
    let mut row = vec![1.0f32];
    for _ in 0..n {
        let mut next = vec![1.0f32; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

fn smoothing_kernel(ksize: usize) -> Vec<f32> {
    binomial(ksize - 1)
}

/// `ksize`-tap difference kernel of the given order (1 or 2).
fn derivative_kernel(ksize: usize, order: usize) -> Vec<f32> {
    let base: &[f32] = if order == 1 {
        &[-1.0, 0.0, 1.0]
    } else {
        &[1.0, -2.0, 1.0]
    };
    convolve_1d(base, &binomial(ksize - 3))
}

fn convolve_1d(a: &[f32], b: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Mirror `i` into `[0, n)` without repeating the border sample.
fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let mut i = i.rem_euclid(period);
    if i >= n as isize {
        i = period - i;
    }
    i as usize
}

/// Apply `kx` along rows and then `ky` along columns.
fn convolve_separable(src: &[f32], w: usize, h: usize, kx: &[f32], ky: &[f32]) -> Vec<f32> {
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;

    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &weight) in kx.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - rx, w);
                acc += row[sx] * weight;
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for (k, &weight) in ky.iter().enumerate() {
            let sy = reflect_101(y as isize + k as isize - ry, h);
            let src_row = &tmp[sy * w..(sy + 1) * w];
            let dst_row = &mut out[y * w..(y + 1) * w];
            for (d, s) in dst_row.iter_mut().zip(src_row) {
                *d += s * weight;
            }
        }
    }
    out
}

/// Min-max rescale to `[0, 255]`. A flat response maps to all zeros.
pub fn normalize_to_u8(width: u32, height: u32, values: &[f32]) -> GrayImage {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    GrayImage::from_fn(width, height, |x, y| {
        let v = values[(y * width + x) as usize];
        if range > f32::EPSILON {
            Luma([((v - min) * 255.0 / range).round().clamp(0.0, 255.0) as u8])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels_match_classic_sobel() {
        assert_eq!(smoothing_kernel(3), vec![1.0, 2.0, 1.0]);
        assert_eq!(derivative_kernel(3, 1), vec![-1.0, 0.0, 1.0]);
        assert_eq!(derivative_kernel(5, 1), vec![-1.0, -2.0, 0.0, 2.0, 1.0]);
        assert_eq!(derivative_kernel(3, 2), vec![1.0, -2.0, 1.0]);
        assert_eq!(derivative_kernel(15, 1).len(), 15);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(-7, 3), 1);
        assert_eq!(reflect_101(4, 1), 0);
    }

    #[test]
    fn test_normalize_flat_is_zero() {
        let img = normalize_to_u8(2, 2, &[3.0, 3.0, 3.0, 3.0]);
        assert!(img.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_normalize_stretches_range() {
        let img = normalize_to_u8(3, 1, &[-1.0, 0.0, 1.0]);
        assert_eq!(img.as_raw(), &vec![0, 128, 255]);
    }
}
