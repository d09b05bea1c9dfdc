use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex;
use rustfft::FftPlanner;

/// Low-frequency log-magnitude spectrum descriptor.
///
/// Computes a 2-D FFT (rows then columns), shifts the DC component to the
/// centre, takes `ln(1 + |z|)` and keeps a centred square of at most
/// `max_components` coefficients, flattened row-major and truncated to the
/// budget exactly.
pub fn fft(image: ArrayView2<f32>, max_components: usize) -> Array1<f32> {
    let (h, w) = image.dim();
    if h == 0 || w == 0 || max_components == 0 {
        return Array1::zeros(0);
    }

    let spectrum = magnitude_spectrum(image);

    // Smallest centred square that covers the budget, clipped to the
    // spectrum bounds.
    let side = (max_components as f64).sqrt().ceil() as usize;
    let side_y = side.min(h);
    let side_x = side.min(w);
    let top = (h - side_y) / 2;
    let left = (w - side_x) / 2;

    let mut out = Vec::with_capacity(side_y * side_x);
    'rows: for y in top..top + side_y {
        for x in left..left + side_x {
            if out.len() == max_components {
                break 'rows;
            }
            out.push((1.0 + spectrum[[y, x]]).ln());
        }
    }
    Array1::from_vec(out)
}

/// The centred magnitude spectrum of a real image.
fn magnitude_spectrum(image: ArrayView2<f32>) -> Array2<f32> {
    let (h, w) = image.dim();
    let mut planner = FftPlanner::<f32>::new();
    let row_fft = planner.plan_fft_forward(w);
    let col_fft = planner.plan_fft_forward(h);

    let mut data: Array2<Complex<f32>> = image.mapv(|v| Complex::new(v, 0.0));

    let mut buffer = vec![Complex::new(0.0_f32, 0.0); w];
    for mut row in data.rows_mut() {
        buffer.clear();
        buffer.extend(row.iter().copied());
        row_fft.process(&mut buffer);
        for (dst, src) in row.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }

    let mut buffer = vec![Complex::new(0.0_f32, 0.0); h];
    for mut col in data.columns_mut() {
        buffer.clear();
        buffer.extend(col.iter().copied());
        col_fft.process(&mut buffer);
        for (dst, src) in col.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }

    // fftshift: move the zero-frequency bin to the centre.
    let mut spectrum = Array2::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let sy = (y + h / 2) % h;
            let sx = (x + w / 2) % w;
            spectrum[[sy, sx]] = data[[y, x]].norm();
        }
    }
    spectrum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn budget_caps_the_output_length() {
        let img = Array2::from_shape_fn((32, 32), |(y, x)| ((x * y) % 7) as f32);
        assert_eq!(fft(img.view(), 100).len(), 100);
        assert_eq!(fft(img.view(), 5000).len(), 32 * 32);
        assert_eq!(fft(img.view(), 0).len(), 0);
    }

    #[test]
    fn constant_image_concentrates_at_dc() {
        let img = Array2::from_elem((16, 16), 2.0_f32);
        let descriptor = fft(img.view(), 16 * 16);

        // After the shift, DC sits at the centre of the 16x16 block.
        let spectrum = Array2::from_shape_vec((16, 16), descriptor.to_vec()).unwrap();
        let dc = spectrum[[8, 8]];
        assert_abs_diff_eq!(dc, (1.0_f32 + 2.0 * 256.0).ln(), epsilon = 1e-3);
        for ((y, x), &v) in spectrum.indexed_iter() {
            if (y, x) != (8, 8) {
                assert_abs_diff_eq!(v, 0.0, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn magnitudes_are_shift_symmetric_for_real_input() {
        // Real input spectra obey |F(u, v)| = |F(-u, -v)|.
        let img = Array2::from_shape_fn((8, 8), |(y, x)| (x as f32).sin() + (y as f32) * 0.3);
        let spectrum = magnitude_spectrum(img.view());
        for y in 1..8 {
            for x in 1..8 {
                let mirrored = spectrum[[8 - y, 8 - x]];
                assert_abs_diff_eq!(spectrum[[y, x]], mirrored, epsilon = 1e-2);
            }
        }
    }
}
