//! Fixed-size real FFT transforms shared by all convolution filters.

use std::sync::Arc;

use realfft::{num_complex::Complex, ComplexToReal, RealFftPlanner, RealToComplex};

use crate::common::next_pow_two;

/// Manager of forward and inverse real FFTs of a fixed size, with the
/// frequency domain multiply-accumulate used by fast convolution.
///
/// The transform size is `max(32, 2 * next_pow_two(frames_per_buffer))`,
/// which leaves room for the overlap of block convolution. Spectra are in
/// half-complex layout: `fft_size / 2 + 1` bins with DC in bin 0 and
/// Nyquist in the last bin, both purely real.
///
/// A single manager is shared sequentially by many filters within one
/// processing call. It is not re-entrant.
pub struct FftManager {
    fft_size: usize,
    frames_per_buffer: usize,
    /// Applied in the frequency domain MAC so callers receive
    /// convolution-scaled results straight from the inverse transform.
    inverse_fft_scale: f32,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    forward_scratch: Vec<Complex<f32>>,
    inverse_scratch: Vec<Complex<f32>>,
    /// Zero padding workspace for forward transforms of short inputs.
    time_scratch: Vec<f32>,
    /// Full length output workspace for inverse transforms when the
    /// caller only wants `frames_per_buffer` samples.
    inverse_time_scratch: Vec<f32>,
}

impl FftManager {
    /// Minimum supported transform size.
    pub const MIN_FFT_SIZE: usize = 32;

    /// Creates a manager for blocks of `frames_per_buffer` frames.
    pub fn new(frames_per_buffer: usize) -> Self {
        assert!(frames_per_buffer > 0);
        let fft_size = (next_pow_two(frames_per_buffer) * 2).max(Self::MIN_FFT_SIZE);
        debug_assert!(fft_size.is_power_of_two());

        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let forward_scratch = forward.make_scratch_vec();
        let inverse_scratch = inverse.make_scratch_vec();

        Self {
            fft_size,
            frames_per_buffer,
            inverse_fft_scale: 1.0 / fft_size as f32,
            forward,
            inverse,
            forward_scratch,
            inverse_scratch,
            time_scratch: vec![0.0; fft_size],
            inverse_time_scratch: vec![0.0; fft_size],
        }
    }

    /// Returns the transform size in samples.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Returns the number of frequency bins of a spectrum.
    pub fn spectrum_len(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Returns a zeroed spectrum of the right length.
    pub fn make_spectrum(&self) -> Vec<Complex<f32>> {
        vec![Complex::default(); self.spectrum_len()]
    }

    /// Forward transforms `time_channel` into `freq_channel`, zero padding
    /// inputs shorter than the transform size.
    pub fn freq_from_time_domain(&mut self, time_channel: &[f32], freq_channel: &mut [Complex<f32>]) {
        assert!(time_channel.len() <= self.fft_size);
        assert_eq!(freq_channel.len(), self.spectrum_len());

        self.time_scratch[..time_channel.len()].copy_from_slice(time_channel);
        self.time_scratch[time_channel.len()..].fill(0.0);
        self.forward
            .process_with_scratch(&mut self.time_scratch, freq_channel, &mut self.forward_scratch)
            .unwrap();
    }

    /// Inverse transforms `freq_channel` into `time_channel`, which must
    /// hold either `frames_per_buffer` or `fft_size` samples. The spectrum
    /// is consumed as scratch space by the transform.
    pub fn time_from_freq_domain(&mut self, freq_channel: &mut [Complex<f32>], time_channel: &mut [f32]) {
        assert_eq!(freq_channel.len(), self.spectrum_len());

        if time_channel.len() == self.fft_size {
            self.inverse
                .process_with_scratch(freq_channel, time_channel, &mut self.inverse_scratch)
                .unwrap();
        } else {
            assert_eq!(time_channel.len(), self.frames_per_buffer);
            self.inverse
                .process_with_scratch(
                    freq_channel,
                    &mut self.inverse_time_scratch,
                    &mut self.inverse_scratch,
                )
                .unwrap();
            time_channel.copy_from_slice(&self.inverse_time_scratch[..self.frames_per_buffer]);
        }
    }

    /// Scales `time_channel` by `1 / fft_size`. Only needed when a
    /// spectrum reaches the inverse transform without having passed
    /// through [`FftManager::freq_domain_convolution`].
    pub fn apply_reverse_fft_scaling(&self, time_channel: &mut [f32]) {
        for sample in time_channel.iter_mut() {
            *sample *= self.inverse_fft_scale;
        }
    }

    /// Pointwise multiply-accumulates `input_a * input_b` into
    /// `scaled_output`, scaled by `1 / fft_size` so that a subsequent
    /// inverse transform yields convolution results directly.
    pub fn freq_domain_convolution(
        &self,
        input_a: &[Complex<f32>],
        input_b: &[Complex<f32>],
        scaled_output: &mut [Complex<f32>],
    ) {
        assert_eq!(input_a.len(), self.spectrum_len());
        assert_eq!(input_b.len(), self.spectrum_len());
        assert_eq!(scaled_output.len(), self.spectrum_len());
        let scale = self.inverse_fft_scale;
        for ((out, a), b) in scaled_output.iter_mut().zip(input_a).zip(input_b) {
            *out += a * b * scale;
        }
    }
}
