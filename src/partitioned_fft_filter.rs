//! Uniformly partitioned fast convolution for streaming block input.

use realfft::num_complex::Complex;

use crate::fft_manager::FftManager;

/// FIR filter of arbitrary kernel length, convolved against a stream of
/// fixed-size input blocks by uniformly partitioned FFT convolution.
///
/// The kernel is split into `ceil(kernel_len / frames_per_buffer)`
/// partitions which are forward transformed once at setup. Streaming
/// state is a ring of the most recent input block spectra plus a carry
/// buffer holding the convolution tail that belongs to the next block.
/// Output is a valid streaming convolution from block 0: until the ring
/// has filled, the missing older spectra are zero.
///
/// Per block, a caller first hands the spectrum of the zero padded input
/// block to [`PartitionedFftFilter::filter`], then collects
/// `frames_per_buffer` output samples from
/// [`PartitionedFftFilter::filtered_signal`].
pub struct PartitionedFftFilter {
    frames_per_buffer: usize,
    /// Frequency domain kernel, one spectrum per partition.
    kernel_partitions: Vec<Vec<Complex<f32>>>,
    /// Ring of the last `num_partitions` input spectra; `ring_head` is
    /// the slot holding the newest block.
    input_spectra: Vec<Vec<Complex<f32>>>,
    ring_head: usize,
    /// Frequency domain accumulator for the current block.
    accumulator: Vec<Complex<f32>>,
    /// Inverse transform workspace, `fft_size` samples.
    time_scratch: Vec<f32>,
    /// Tail of the previous inverse transform, added to the next block.
    carry: Vec<f32>,
}

impl PartitionedFftFilter {
    /// Creates a filter for kernels of up to `filter_size` samples,
    /// processing blocks of `frames_per_buffer` frames. The kernel itself
    /// is supplied via [`PartitionedFftFilter::set_time_domain_kernel`].
    pub fn new(filter_size: usize, frames_per_buffer: usize, fft_manager: &FftManager) -> Self {
        assert!(filter_size > 0);
        assert!(frames_per_buffer > 0);
        let num_partitions = filter_size.div_ceil(frames_per_buffer);
        let spectrum_len = fft_manager.spectrum_len();

        Self {
            frames_per_buffer,
            kernel_partitions: Vec::with_capacity(num_partitions),
            input_spectra: vec![vec![Complex::default(); spectrum_len]; num_partitions],
            ring_head: 0,
            accumulator: vec![Complex::default(); spectrum_len],
            time_scratch: vec![0.0; fft_manager.fft_size()],
            carry: vec![0.0; frames_per_buffer],
        }
    }

    /// Returns the number of kernel partitions.
    pub fn num_partitions(&self) -> usize {
        self.input_spectra.len()
    }

    /// Replaces the kernel with `kernel`, splitting it into partitions of
    /// `frames_per_buffer` samples and forward transforming each. Resets
    /// all streaming state.
    pub fn set_time_domain_kernel(&mut self, kernel: &[f32], fft_manager: &mut FftManager) {
        assert!(!kernel.is_empty());
        let num_partitions = kernel.len().div_ceil(self.frames_per_buffer);
        let spectrum_len = fft_manager.spectrum_len();

        self.kernel_partitions.clear();
        for chunk in kernel.chunks(self.frames_per_buffer) {
            let mut spectrum = vec![Complex::default(); spectrum_len];
            fft_manager.freq_from_time_domain(chunk, &mut spectrum);
            self.kernel_partitions.push(spectrum);
        }
        debug_assert_eq!(self.kernel_partitions.len(), num_partitions);

        // A longer or shorter kernel changes the ring depth.
        self.input_spectra
            .resize(num_partitions, vec![Complex::default(); spectrum_len]);
        self.reset();
    }

    /// Clears the input spectra ring and the carry buffer.
    pub fn reset(&mut self) {
        for spectrum in self.input_spectra.iter_mut() {
            spectrum.fill(Complex::default());
        }
        self.carry.fill(0.0);
        self.ring_head = 0;
    }

    /// Accepts the spectrum of the current zero padded input block and
    /// accumulates the frequency domain convolution against all kernel
    /// partitions.
    pub fn filter(&mut self, input_spectrum: &[Complex<f32>], fft_manager: &FftManager) {
        assert!(
            !self.kernel_partitions.is_empty(),
            "filter called before a kernel was set"
        );
        assert_eq!(input_spectrum.len(), self.accumulator.len());

        self.input_spectra[self.ring_head].copy_from_slice(input_spectrum);

        self.accumulator.fill(Complex::default());
        let num_partitions = self.num_partitions();
        for partition in 0..num_partitions {
            let slot = (self.ring_head + num_partitions - partition) % num_partitions;
            fft_manager.freq_domain_convolution(
                &self.input_spectra[slot],
                &self.kernel_partitions[partition],
                &mut self.accumulator,
            );
        }
    }

    /// Inverse transforms the accumulated spectrum and writes
    /// `frames_per_buffer` convolution output samples into `output`,
    /// folding in the carried tail of the previous block.
    pub fn filtered_signal(&mut self, output: &mut [f32], fft_manager: &mut FftManager) {
        assert_eq!(output.len(), self.frames_per_buffer);

        fft_manager.time_from_freq_domain(&mut self.accumulator, &mut self.time_scratch);

        let b = self.frames_per_buffer;
        for (i, out) in output.iter_mut().enumerate() {
            *out = self.time_scratch[i] + self.carry[i];
        }
        self.carry.copy_from_slice(&self.time_scratch[b..2 * b]);

        // Advance the ring; the oldest slot becomes the next head.
        self.ring_head = (self.ring_head + 1) % self.num_partitions();
    }
}
