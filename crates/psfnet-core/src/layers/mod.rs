pub mod conv;
pub mod correlation;

pub use conv::{same_padding, Conv2d, ConvTranspose2d, ConvWeights, Padding};
pub use correlation::{CrossCorrelation, ShiftWindow};
