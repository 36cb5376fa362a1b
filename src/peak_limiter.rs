//! Feed-forward peak limiting of the binaural output.

use crate::audio_buffer::AudioBuffer;

/// Release-only peak limiter.
///
/// The attack is instantaneous: the gain drops to the required value
/// within the same sample, which keeps the limiter free of look-ahead
/// latency and bit stable across buffer sizes. The release follows a
/// first order envelope with the configured time constant. The same gain
/// is applied to every channel so the stereo image does not shift.
pub struct PeakLimiter {
    ceiling: f64,
    release_time_constant: f64,
    /// Envelope state in `(0, 1]`, starting fully open.
    env: f64,
    /// Per-frame maxima across channels, sized lazily on first use.
    max_samples: Vec<f32>,
    /// Per-frame gain derived from the envelope.
    limiter_env: Vec<f32>,
}

impl PeakLimiter {
    /// Creates a limiter for the given sample rate with a release time in
    /// milliseconds and a ceiling in dBFS (at most 0).
    pub fn new(sampling_rate: u32, release_ms: f64, ceiling_db: f64) -> Self {
        assert!(sampling_rate > 0);
        assert!(release_ms > 0.0);
        assert!(ceiling_db <= 0.0);
        Self {
            ceiling: 10f64.powf(ceiling_db / 20.0),
            release_time_constant: (-3.0 / (sampling_rate as f64 * release_ms / 1000.0)).exp(),
            env: 1.0,
            max_samples: Vec::new(),
            limiter_env: Vec::new(),
        }
    }

    /// Returns the linear ceiling.
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Gain-scales `buffer` in place, uniformly across channels.
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        let num_frames = buffer.num_frames();
        if self.max_samples.len() != num_frames {
            self.max_samples.resize(num_frames, 0.0);
            self.limiter_env.resize(num_frames, 0.0);
        }

        // Per-frame peak across all channels.
        self.max_samples.fill(0.0);
        for channel in 0..buffer.num_channels() {
            for (max, sample) in self.max_samples.iter_mut().zip(buffer.channel(channel)) {
                *max = max.max(sample.abs());
            }
        }

        // Envelope: instantaneous attack, first order release.
        for frame in 0..num_frames {
            let max_required_gain = self.maximum_required_gain(self.max_samples[frame] as f64);
            if max_required_gain < self.env {
                self.env = max_required_gain;
            } else {
                self.env = self.release_time_constant * (self.env - max_required_gain)
                    + max_required_gain;
            }
            self.limiter_env[frame] = self.env as f32;
        }

        for channel in 0..buffer.num_channels() {
            for (sample, &gain) in buffer.channel_mut(channel).iter_mut().zip(self.limiter_env.iter())
            {
                *sample *= gain;
            }
        }
    }

    /// Returns the gain needed to keep `sample` at or below the ceiling.
    fn maximum_required_gain(&self, sample: f64) -> f64 {
        if sample.abs() > self.ceiling {
            self.ceiling / sample.abs()
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    const SAMPLING_RATE: u32 = 48000;

    fn white_ish(num_frames: usize, peak: f32) -> Vec<f32> {
        // Deterministic pseudo noise, scaled to an exact peak.
        let mut state = 0x2545_F491u32;
        let mut samples: Vec<f32> = (0..num_frames)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect();
        let max = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        samples.iter_mut().for_each(|s| *s *= peak / max);
        samples
    }

    #[test]
    fn test_output_respects_ceiling() {
        let num_frames = 4800;
        let noise = white_ish(num_frames, 2.0);
        let mut buffer = AudioBuffer::new(2, num_frames);
        buffer.channel_mut(0).copy_from_slice(&noise);
        for (out, sample) in buffer.channel_mut(1).iter_mut().zip(&noise) {
            *out = -sample;
        }

        let mut limiter = PeakLimiter::new(SAMPLING_RATE, 50.0, -0.5);
        limiter.process(&mut buffer);

        let ceiling = limiter.ceiling() as f32;
        for channel in 0..2 {
            for &sample in buffer.channel(channel) {
                // Attack is instantaneous, so no sample may overshoot.
                assert!(sample.abs() <= ceiling + 1e-6);
            }
        }
    }

    #[test]
    fn test_gain_is_uniform_across_channels() {
        let num_frames = 256;
        let mut buffer = AudioBuffer::new(2, num_frames);
        // Only channel 0 clips; channel 1 must be scaled by the same gain.
        buffer.channel_mut(0).fill(2.0);
        buffer.channel_mut(1).fill(0.5);

        let mut limiter = PeakLimiter::new(SAMPLING_RATE, 50.0, -0.5);
        limiter.process(&mut buffer);

        for frame in 0..num_frames {
            let gain_0 = buffer.channel(0)[frame] / 2.0;
            let gain_1 = buffer.channel(1)[frame] / 0.5;
            assert_float_eq!(gain_0, gain_1, abs <= 1e-6);
        }
    }

    #[test]
    fn test_release_time_constant() {
        let release_ms = 50.0;
        let mut limiter = PeakLimiter::new(SAMPLING_RATE, release_ms, 0.0);

        // Clamp the envelope down with a loud single-sample burst.
        let mut burst = AudioBuffer::new(1, 1);
        burst.channel_mut(0)[0] = 2.0;
        limiter.process(&mut burst);
        let initial_env = limiter.env;
        assert_float_eq!(initial_env, 0.5, abs <= 1e-9);

        // Feed silence and watch the envelope recover toward 1 with the
        // configured coefficient: env_n = 1 - (1 - env_0) * alpha^n.
        let num_frames = 2400; // 50 ms at 48 kHz
        let mut silence = AudioBuffer::new(1, num_frames);
        limiter.process(&mut silence);

        let alpha = (-3.0f64 / (SAMPLING_RATE as f64 * release_ms / 1000.0)).exp();
        let expected = 1.0 - (1.0 - initial_env) * alpha.powi(num_frames as i32);
        assert_float_eq!(limiter.env, expected, abs <= 1e-6);

        // After one full release time the envelope has recovered by
        // e^-3, i.e. to within about 5 percent of unity.
        assert!(limiter.env > 0.95);
    }

    #[test]
    fn test_quiet_signal_is_untouched() {
        let num_frames = 128;
        let mut buffer = AudioBuffer::new(2, num_frames);
        for (i, sample) in buffer.channel_mut(0).iter_mut().enumerate() {
            *sample = 0.25 * (i as f32 * 0.1).sin();
        }
        let reference: Vec<f32> = buffer.channel(0).to_vec();

        let mut limiter = PeakLimiter::new(SAMPLING_RATE, 50.0, -0.5);
        limiter.process(&mut buffer);

        assert_float_eq!(buffer.channel(0), &reference[..], abs_all <= 0.0);
    }

    #[test]
    fn test_bit_stable_across_buffer_sizes() {
        // Processing the same stream in blocks of 64 and 256 must give
        // identical envelopes because the state updates per sample.
        let total = 1024;
        let noise = white_ish(total, 1.8);

        let run = |block: usize| -> Vec<f32> {
            let mut limiter = PeakLimiter::new(SAMPLING_RATE, 50.0, -0.5);
            let mut out = Vec::with_capacity(total);
            for chunk in noise.chunks(block) {
                let mut buffer = AudioBuffer::new(1, chunk.len());
                buffer.channel_mut(0).copy_from_slice(chunk);
                limiter.process(&mut buffer);
                out.extend_from_slice(buffer.channel(0));
            }
            out
        };

        assert_eq!(run(64), run(256));
    }
}
