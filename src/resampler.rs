//! Rational sample rate conversion for HRIR assets.

use crate::audio_buffer::AudioBuffer;
use crate::common::{find_gcd, generate_hann_window};

/// Sample rate pairs the resampler has been validated against. Streaming
/// audio is never resampled; this only covers bringing HRIR assets to the
/// engine rate at load time.
const SUPPORTED_RATE_PAIRS: &[(u32, u32)] = &[
    (44100, 44100),
    (44100, 48000),
    (48000, 44100),
    (48000, 48000),
];

/// Number of filter coefficients per polyphase phase.
const COEFFS_PER_PHASE: usize = 32;

/// Polyphase rational resampler with a Hann windowed sinc prototype.
///
/// Used once per HRIR load to convert assets to the engine sample rate;
/// it is not part of the streaming path.
pub struct Resampler {
    /// Interpolation rate of the rational converter.
    up_rate: usize,
    /// Decimation rate of the rational converter.
    down_rate: usize,
    /// Time variable of the polyphase filter, in `[0, up_rate)`.
    time_modulo_up_rate: usize,
    /// Index of the next unconsumed input frame.
    last_processed_sample: usize,
    num_channels: usize,
    /// Filter coefficients per phase; the prototype length is
    /// `up_rate * coeffs_per_phase`.
    coeffs_per_phase: usize,
    /// Coefficients arranged as `up_rate` phases of `coeffs_per_phase`
    /// taps each, outer index phase.
    transposed_filter_coeffs: Vec<Vec<f32>>,
    /// Trailing `coeffs_per_phase - 1` input frames of the previous call,
    /// one history row per channel.
    state: Vec<Vec<f32>>,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Resampler {
    pub fn new() -> Self {
        Self {
            up_rate: 1,
            down_rate: 1,
            time_modulo_up_rate: 0,
            last_processed_sample: 0,
            num_channels: 0,
            coeffs_per_phase: COEFFS_PER_PHASE,
            transposed_filter_coeffs: Vec::new(),
            state: Vec::new(),
        }
    }

    /// Returns whether the sample rate pair has been validated for use.
    pub fn are_sample_rates_supported(source: u32, destination: u32) -> bool {
        SUPPORTED_RATE_PAIRS
            .iter()
            .any(|&(src, dst)| src == source && dst == destination)
    }

    /// Sets source and destination sampling rates and the channel count.
    /// Regenerates the polyphase filter when the rate ratio changes and
    /// resets the history when the channel count changes.
    pub fn set_rate_and_num_channels(
        &mut self,
        source_frequency: u32,
        destination_frequency: u32,
        num_channels: usize,
    ) {
        assert!(source_frequency > 0 && destination_frequency > 0);
        assert!(num_channels > 0);

        let gcd = find_gcd(source_frequency as i64, destination_frequency as i64) as usize;
        let up_rate = destination_frequency as usize / gcd;
        let down_rate = source_frequency as usize / gcd;

        let rates_changed = up_rate != self.up_rate || down_rate != self.down_rate;
        let channels_changed = num_channels != self.num_channels;

        self.up_rate = up_rate;
        self.down_rate = down_rate;
        self.num_channels = num_channels;

        if rates_changed {
            self.generate_interpolating_filter();
            self.reset_state();
        } else if channels_changed {
            self.reset_state();
        }
        if self.state.len() != num_channels {
            self.state = vec![vec![0.0; self.coeffs_per_phase - 1]; num_channels];
        }
    }

    /// Clears the filter history, allowing reuse on an unrelated stream.
    pub fn reset_state(&mut self) {
        self.time_modulo_up_rate = 0;
        self.last_processed_sample = 0;
        self.state = vec![vec![0.0; self.coeffs_per_phase - 1]; self.num_channels.max(1)];
    }

    /// Returns an upper bound on the output length for `input_length`
    /// frames. The actual output is this or one frame less.
    pub fn max_output_length(&self, input_length: usize) -> usize {
        (input_length * self.up_rate).div_ceil(self.down_rate)
    }

    /// Returns the exact number of output frames the next `process` call
    /// will produce for `input_length` input frames.
    pub fn next_output_length(&self, input_length: usize) -> usize {
        let available = (input_length - self.last_processed_sample) * self.up_rate;
        if available <= self.time_modulo_up_rate {
            return 0;
        }
        (available - self.time_modulo_up_rate).div_ceil(self.down_rate)
    }

    /// Resamples `input` into `output`. The output buffer must hold
    /// exactly `next_output_length(input.num_frames())` frames.
    pub fn process(&mut self, input: &AudioBuffer, output: &mut AudioBuffer) {
        assert_eq!(input.num_channels(), self.num_channels);
        assert_eq!(output.num_channels(), self.num_channels);
        let num_input_frames = input.num_frames();
        let num_output_frames = self.next_output_length(num_input_frames);
        assert_eq!(output.num_frames(), num_output_frames);

        let history_len = self.coeffs_per_phase - 1;
        for channel in 0..self.num_channels {
            let input_samples = input.channel(channel);
            let mut time = self.time_modulo_up_rate;
            let mut last = self.last_processed_sample as isize;

            let output_samples = output.channel_mut(channel);
            for out in output_samples.iter_mut() {
                let coeffs = &self.transposed_filter_coeffs[time];
                let mut acc = 0.0f32;
                for (tap, coeff) in coeffs.iter().enumerate() {
                    let index = last - tap as isize;
                    let sample = if index >= 0 {
                        input_samples[index as usize]
                    } else {
                        self.state[channel][(index + history_len as isize) as usize]
                    };
                    acc += coeff * sample;
                }
                *out = acc;

                time += self.down_rate;
                last += (time / self.up_rate) as isize;
                time %= self.up_rate;
            }

            // Save the trailing input frames as history for the next call.
            let history = &mut self.state[channel];
            if num_input_frames >= history_len {
                history.copy_from_slice(&input_samples[num_input_frames - history_len..]);
            } else {
                history.rotate_left(num_input_frames);
                let offset = history_len - num_input_frames;
                history[offset..].copy_from_slice(input_samples);
            }
        }

        // Advance the shared stream position once for all channels.
        let mut time = self.time_modulo_up_rate;
        let mut last = self.last_processed_sample;
        for _ in 0..num_output_frames {
            time += self.down_rate;
            last += time / self.up_rate;
            time %= self.up_rate;
        }
        self.time_modulo_up_rate = time;
        self.last_processed_sample = last.saturating_sub(num_input_frames);
    }

    /// Generates the windowed sinc anti-aliasing filter and arranges it
    /// in transposed polyphase form.
    fn generate_interpolating_filter(&mut self) {
        let filter_length = self.coeffs_per_phase * self.up_rate;
        // Cutoff at the lower Nyquist of the two rates, normalized to the
        // interpolated rate.
        let cutoff = 0.5 / self.up_rate.max(self.down_rate) as f32;

        let mut window = vec![0.0f32; filter_length];
        generate_hann_window(true, filter_length, &mut window);

        let center = (filter_length - 1) as f32 / 2.0;
        let mut filter = vec![0.0f32; filter_length];
        for (i, coeff) in filter.iter_mut().enumerate() {
            let argument = 2.0 * cutoff * (i as f32 - center);
            let sinc = if argument.abs() < 1e-9 {
                1.0
            } else {
                (std::f32::consts::PI * argument).sin() / (std::f32::consts::PI * argument)
            };
            // Scaled by the interpolation rate to preserve amplitude
            // through the zero stuffing.
            *coeff = 2.0 * cutoff * sinc * window[i] * self.up_rate as f32;
        }

        self.transposed_filter_coeffs = (0..self.up_rate)
            .map(|phase| {
                (0..self.coeffs_per_phase)
                    .map(|tap| filter[tap * self.up_rate + phase])
                    .collect()
            })
            .collect();
    }
}
