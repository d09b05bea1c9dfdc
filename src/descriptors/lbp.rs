use ndarray::{Array1, ArrayView2};

/// One bin per 8-bit neighbourhood code.
pub const LBP_BINS: usize = 256;

/// Local binary pattern histogram.
///
/// Each interior pixel is compared against its eight neighbours, clockwise
/// from the top-left, producing an 8-bit code; the descriptor is the
/// code histogram normalised to sum to one. Images with no interior
/// pixels produce an all-zero histogram.
pub fn lbp(image: ArrayView2<f32>) -> Array1<f32> {
    let (h, w) = image.dim();
    let mut histogram = Array1::zeros(LBP_BINS);
    if h < 3 || w < 3 {
        return histogram;
    }

    // Clockwise neighbour offsets starting at the top-left corner.
    const NEIGHBOURS: [(isize, isize); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
        (1, 0),
        (1, -1),
        (0, -1),
    ];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let centre = image[[y, x]];
            let mut code = 0_usize;
            for (bit, (dy, dx)) in NEIGHBOURS.iter().enumerate() {
                let ny = (y as isize + dy) as usize;
                let nx = (x as isize + dx) as usize;
                if image[[ny, nx]] >= centre {
                    code |= 1 << bit;
                }
            }
            histogram[code] += 1.0;
        }
    }

    let total = ((h - 2) * (w - 2)) as f32;
    histogram.mapv_inplace(|v| v / total);
    histogram
}
