//! Binaural decoding of an Ambisonic sound field against SH-HRIR banks.

use realfft::num_complex::Complex;

use crate::audio_buffer::AudioBuffer;
use crate::common::NUM_BINAURAL_CHANNELS;
use crate::fft_manager::FftManager;
use crate::partitioned_fft_filter::PartitionedFftFilter;

/// Convolves each ACN channel of an Ambisonic sound field with the
/// corresponding spherical harmonic HRIR of each ear and sums the results
/// into a two channel binaural output.
///
/// The left and right filter banks are independent, so asymmetric HRIR
/// sets are supported. One frequency domain scratch and one time domain
/// scratch are reused sequentially across all channels within a process
/// call; nothing here is shared across threads.
pub struct AmbisonicBinauralDecoder {
    sh_hrir_filters_left: Vec<PartitionedFftFilter>,
    sh_hrir_filters_right: Vec<PartitionedFftFilter>,
    /// Spectrum of the current input channel, shared by both ear paths.
    freq_input: Vec<Complex<f32>>,
    /// Filtered block of the current channel before accumulation.
    filtered_input: Vec<f32>,
}

impl AmbisonicBinauralDecoder {
    /// Creates a decoder from left and right SH-HRIR sets. Both must hold
    /// one channel per ACN channel of the sound field, and equally many
    /// frames.
    pub fn new(
        sh_hrirs_left: &AudioBuffer,
        sh_hrirs_right: &AudioBuffer,
        frames_per_buffer: usize,
        fft_manager: &mut FftManager,
    ) -> Self {
        assert!(frames_per_buffer > 0);
        let num_channels = sh_hrirs_left.num_channels();
        let filter_size = sh_hrirs_left.num_frames();
        assert!(num_channels > 0);
        assert!(filter_size > 0);
        assert_eq!(sh_hrirs_right.num_channels(), num_channels);
        assert_eq!(sh_hrirs_right.num_frames(), filter_size);

        let mut sh_hrir_filters_left = Vec::with_capacity(num_channels);
        for channel in 0..num_channels {
            let mut filter = PartitionedFftFilter::new(filter_size, frames_per_buffer, fft_manager);
            filter.set_time_domain_kernel(sh_hrirs_left.channel(channel), fft_manager);
            sh_hrir_filters_left.push(filter);
        }

        let mut sh_hrir_filters_right = Vec::with_capacity(num_channels);
        for channel in 0..num_channels {
            let mut filter = PartitionedFftFilter::new(filter_size, frames_per_buffer, fft_manager);
            filter.set_time_domain_kernel(sh_hrirs_right.channel(channel), fft_manager);
            sh_hrir_filters_right.push(filter);
        }

        Self {
            sh_hrir_filters_left,
            sh_hrir_filters_right,
            freq_input: fft_manager.make_spectrum(),
            filtered_input: vec![0.0; frames_per_buffer],
        }
    }

    /// Decodes `input` into the two channel `output`. The output buffer
    /// is cleared before accumulation.
    pub fn process(
        &mut self,
        input: &AudioBuffer,
        output: &mut AudioBuffer,
        fft_manager: &mut FftManager,
    ) {
        assert_eq!(input.num_channels(), self.sh_hrir_filters_left.len());
        assert_eq!(output.num_channels(), NUM_BINAURAL_CHANNELS);
        assert_eq!(input.num_frames(), output.num_frames());

        output.clear();

        for channel in 0..input.num_channels() {
            // One forward transform serves both ear paths.
            fft_manager.freq_from_time_domain(input.channel(channel), &mut self.freq_input);

            self.sh_hrir_filters_left[channel].filter(&self.freq_input, fft_manager);
            self.sh_hrir_filters_left[channel].filtered_signal(&mut self.filtered_input, fft_manager);
            output.accumulate_channel(0, &self.filtered_input);

            self.sh_hrir_filters_right[channel].filter(&self.freq_input, fft_manager);
            self.sh_hrir_filters_right[channel]
                .filtered_signal(&mut self.filtered_input, fft_manager);
            output.accumulate_channel(1, &self.filtered_input);
        }
    }
}
