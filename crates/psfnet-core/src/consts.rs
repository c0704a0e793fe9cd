/// Minimum pixel count (h*w) to use row-level Rayon parallelism in the FFT.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum number of channel pairs to correlate in parallel.
pub const PARALLEL_PAIR_THRESHOLD: usize = 8;

/// Small epsilon added to the standard deviation when standardizing.
pub const STANDARDIZE_EPSILON: f32 = 1e-7;

/// Kernel sums at or below this are treated as an empty response.
pub const KERNEL_SUM_EPSILON: f32 = 1e-10;

/// Luminance weight of the red channel. The three weights are the BT.601
/// coefficients as rounded by TensorFlow's `rgb_to_grayscale`
/// (0.2989, 0.5870, 0.1140), which the trained weights were fitted with.
pub const LUMINANCE_R: f32 = 0.2989;

/// Luminance weight of the green channel.
pub const LUMINANCE_G: f32 = 0.5870;

/// Luminance weight of the blue channel.
pub const LUMINANCE_B: f32 = 0.1140;

/// Number of channels expected in prediction inputs (R, G, B).
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Filter size of the final single-channel convolution of the kernel head.
pub const HEAD_OUTPUT_FILTER_SIZE: usize = 5;

/// Stride shared by the pyramid downsampling and the decoder upsampling.
pub const PYRAMID_STRIDE: usize = 2;

/// Upper bound on complex elements held by one correlation call
/// (all channel spectra plus the per-pair products). 2^28 elements of
/// `Complex<f64>` is 4 GiB.
pub const MAX_CORRELATION_WORKSPACE: usize = 1 << 28;

/// FFT planes reserved in the correlation budget for pair products in
/// flight, independent of the host's thread count.
pub const CORRELATION_PAIR_PLANES: usize = 16;

/// Seed used for weight initialisation when none is configured.
pub const DEFAULT_INIT_SEED: u64 = 0;

/// Magic bytes at the start of a weight container.
pub const WEIGHTS_MAGIC: &[u8; 8] = b"PSFNETW1";
