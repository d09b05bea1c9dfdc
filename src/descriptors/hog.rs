use ndarray::{Array1, Array3, ArrayView2};

/// Pixels per cell side.
const CELL_SIZE: usize = 8;
/// Unsigned orientation bins over `[0, pi)`.
const ORIENTATION_BINS: usize = 9;
/// Cells per block side; blocks overlap with stride one cell.
const BLOCK_SIZE: usize = 2;

/// Histogram-of-oriented-gradients descriptor.
///
/// Gradients come from central differences, orientations are binned
/// unsigned into [`ORIENTATION_BINS`] magnitude-weighted bins per
/// [`CELL_SIZE`] cell, and overlapping [`BLOCK_SIZE`] blocks are
/// L2-normalised before flattening. The flattened descriptor is truncated
/// to its leading `max_components` entries, which is how the shared
/// hog/fft component budget is enforced.
pub fn hog(image: ArrayView2<f32>, max_components: usize) -> Array1<f32> {
    let (h, w) = image.dim();
    let cells_y = h / CELL_SIZE;
    let cells_x = w / CELL_SIZE;
    if cells_y == 0 || cells_x == 0 || max_components == 0 {
        return Array1::zeros(0);
    }

    let histograms = cell_histograms(image, cells_y, cells_x);
    let descriptor = normalised_blocks(&histograms, cells_y, cells_x);

    let keep = descriptor.len().min(max_components);
    descriptor.slice(ndarray::s![..keep]).to_owned()
}

/// Magnitude-weighted orientation histogram per cell.
fn cell_histograms(image: ArrayView2<f32>, cells_y: usize, cells_x: usize) -> Array3<f32> {
    let (h, w) = image.dim();
    let mut histograms = Array3::zeros((cells_y, cells_x, ORIENTATION_BINS));

    for y in 0..cells_y * CELL_SIZE {
        for x in 0..cells_x * CELL_SIZE {
            // Central differences with clamped borders.
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w - 1);
            let y0 = y.saturating_sub(1);
            let y1 = (y + 1).min(h - 1);
            let gx = image[[y, x1]] - image[[y, x0]];
            let gy = image[[y1, x]] - image[[y0, x]];

            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }
            // Unsigned orientation folded into [0, pi).
            let mut angle = gy.atan2(gx);
            if angle < 0.0 {
                angle += std::f32::consts::PI;
            }
            if angle >= std::f32::consts::PI {
                angle -= std::f32::consts::PI;
            }
            let bin = ((angle / std::f32::consts::PI) * ORIENTATION_BINS as f32) as usize;
            let bin = bin.min(ORIENTATION_BINS - 1);

            histograms[[y / CELL_SIZE, x / CELL_SIZE, bin]] += magnitude;
        }
    }
    histograms
}

/// Flattens overlapping blocks of cells, L2-normalising each block.
fn normalised_blocks(histograms: &Array3<f32>, cells_y: usize, cells_x: usize) -> Array1<f32> {
    let blocks_y = cells_y.saturating_sub(BLOCK_SIZE - 1);
    let blocks_x = cells_x.saturating_sub(BLOCK_SIZE - 1);
    let block_len = BLOCK_SIZE * BLOCK_SIZE * ORIENTATION_BINS;

    // A single row or column of cells still yields the bare histograms.
    if blocks_y == 0 || blocks_x == 0 {
        let mut out = Array1::zeros(cells_y * cells_x * ORIENTATION_BINS);
        for (i, &v) in histograms.iter().enumerate() {
            out[i] = v;
        }
        return out;
    }

    let mut out = Array1::zeros(blocks_y * blocks_x * block_len);
    let mut offset = 0;
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let mut norm_sq = 0.0_f32;
            for cy in 0..BLOCK_SIZE {
                for cx in 0..BLOCK_SIZE {
                    for b in 0..ORIENTATION_BINS {
                        let v = histograms[[by + cy, bx + cx, b]];
                        norm_sq += v * v;
                    }
                }
            }
            let norm = (norm_sq + 1e-12).sqrt();
            for cy in 0..BLOCK_SIZE {
                for cx in 0..BLOCK_SIZE {
                    for b in 0..ORIENTATION_BINS {
                        out[offset] = histograms[[by + cy, bx + cx, b]] / norm;
                        offset += 1;
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn budget_truncates_the_descriptor() {
        let img = Array2::from_shape_fn((64, 64), |(y, x)| (x as f32) + (y as f32) * 0.5);
        let full = hog(img.view(), usize::MAX);
        // 8x8 cells make 7x7 overlapping blocks of 2x2 cells and 9 bins.
        assert_eq!(full.len(), 7 * 7 * 2 * 2 * 9);

        let truncated = hog(img.view(), 100);
        assert_eq!(truncated.len(), 100);
        assert_eq!(truncated, full.slice(ndarray::s![..100]).to_owned());
    }

    #[test]
    fn vertical_edges_activate_the_horizontal_gradient_bin() {
        // Left half dark, right half bright: gradients point along x,
        // which is orientation bin 0.
        let img = Array2::from_shape_fn((16, 16), |(_, x)| if x < 8 { 0.0 } else { 100.0 });
        let descriptor = hog(img.view(), usize::MAX);

        let by_bin: Vec<f32> = (0..ORIENTATION_BINS)
            .map(|b| descriptor.iter().skip(b).step_by(ORIENTATION_BINS).sum())
            .collect();
        let strongest = by_bin
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(strongest, 0);
    }

    #[test]
    fn flat_images_produce_a_zero_descriptor() {
        let img = Array2::from_elem((32, 32), 7.0_f32);
        let descriptor = hog(img.view(), usize::MAX);
        assert!(descriptor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn tiny_images_yield_an_empty_descriptor() {
        let img = Array2::zeros((4, 4));
        assert_eq!(hog(img.view(), usize::MAX).len(), 0);
    }
}
