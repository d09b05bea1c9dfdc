//! Classical image descriptors. Each is a pure function of one
//! single-channel image returning a flat feature vector; the feature
//! extractor concatenates them in a fixed order.

mod fft;
mod hog;
mod lbp;

pub use fft::fft;
pub use hog::hog;
pub use lbp::{lbp, LBP_BINS};
