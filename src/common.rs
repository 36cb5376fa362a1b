//! Shared constants, integer math and Ambisonic channel arithmetic.

/// Number of mono channels.
pub const NUM_MONO_CHANNELS: usize = 1;

/// Number of stereo channels.
pub const NUM_STEREO_CHANNELS: usize = 2;

/// Number of binaural output channels.
pub const NUM_BINAURAL_CHANNELS: usize = 2;

/// Lowest Ambisonic order with binaural filters available.
pub const MIN_SUPPORTED_AMBISONIC_ORDER: usize = 1;

/// Highest Ambisonic order with binaural filters available.
pub const MAX_SUPPORTED_AMBISONIC_ORDER: usize = 7;

/// Upper bound on the total number of renderer input channels.
pub const MAX_SUPPORTED_NUM_INPUT_CHANNELS: usize = 128;

/// Amplitude of -120 dBFS, below which encoder sources are muted.
pub const NEGATIVE_120_DB_IN_AMPLITUDE: f32 = 1e-6;

/// Tolerance used for single precision comparisons in tests.
pub const EPSILON_FLOAT: f32 = 1e-5;

/// Memory alignment of audio buffer channels, in bytes.
pub const MEMORY_ALIGNMENT_BYTES: usize = 64;

/// Number of frames over which sound field rotations are interpolated.
pub const SLERP_FRAME_INTERVAL: usize = 32;

/// Returns the next power of two greater than or equal to `input`.
pub fn next_pow_two(input: usize) -> usize {
    input.next_power_of_two()
}

/// Returns the greatest common divisor of `a` and `b`.
pub fn find_gcd(a: i64, b: i64) -> i64 {
    let mut a = a.abs();
    let mut b = b.abs();
    while b != 0 {
        let temp = b;
        b = a % b;
        a = temp;
    }
    a
}

/// Rounds `size` up to the next multiple of `frames_per_buffer`. A `size`
/// of zero rounds up to one full buffer.
pub fn ceil_to_multiple_of_frames_per_buffer(size: usize, frames_per_buffer: usize) -> usize {
    assert_ne!(frames_per_buffer, 0);
    let remainder = size % frames_per_buffer;
    if remainder == 0 {
        size.max(frames_per_buffer)
    } else {
        size + frames_per_buffer - remainder
    }
}

/// Fills `buffer` with a Hann window of `window_length` samples. A full
/// window rises and falls; a half window only rises, for use as the first
/// half of a symmetric window of twice the length.
pub fn generate_hann_window(full_window: bool, window_length: usize, buffer: &mut [f32]) {
    assert!(window_length <= buffer.len());
    let scaling_factor = if full_window {
        2.0 * std::f32::consts::PI / (window_length as f32 - 1.0)
    } else {
        2.0 * std::f32::consts::PI / (2.0 * window_length as f32 - 1.0)
    };
    for (i, value) in buffer.iter_mut().take(window_length).enumerate() {
        *value = 0.5 * (1.0 - (scaling_factor * i as f32).cos());
    }
}

/// Returns the Ambisonic Channel Number for spherical harmonic `(degree,
/// order)`, or `None` when the order lies outside `[-degree, degree]`.
pub fn acn_sequence(degree: i32, order: i32) -> Option<usize> {
    if order < -degree || order > degree {
        return None;
    }
    Some((degree * degree + degree + order) as usize)
}

/// Returns the spherical harmonic degree for an ACN channel index.
pub fn ambisonic_order_for_channel(channel: usize) -> i32 {
    (channel as f64).sqrt().floor() as i32
}

/// Returns the spherical harmonic order for an ACN channel index. The
/// value is negative for the sine-phase harmonics.
pub fn ambisonic_degree_for_channel(channel: usize) -> i32 {
    let order = ambisonic_order_for_channel(channel);
    channel as i32 - order * order - order
}

/// Returns true if `num_channels` is a full periphonic channel count,
/// i.e. `(n + 1)^2` for some non-negative order `n`.
pub fn is_valid_ambisonic_channel_count(num_channels: usize) -> bool {
    if num_channels == 0 {
        return false;
    }
    let order = (num_channels as f64).sqrt() as usize - 1;
    (order + 1) * (order + 1) == num_channels
}

/// Returns the number of channels of a periphonic sound field of the
/// given order.
pub fn num_periphonic_channels(ambisonic_order: usize) -> usize {
    (ambisonic_order + 1) * (ambisonic_order + 1)
}

/// Converts a 16 bit sample to a float in `[-1.0, 1.0)`.
#[inline]
pub fn sample_to_float(input: i16) -> f32 {
    const INT16_TO_FLOAT: f32 = 1.0 / 32768.0;
    input as f32 * INT16_TO_FLOAT
}

/// Converts a float sample to 16 bit, saturating outside `[-1.0, 1.0]`.
#[inline]
pub fn sample_from_float(input: f32) -> i16 {
    const FLOAT_TO_INT16: f32 = 32768.0;
    (input * FLOAT_TO_INT16).clamp(-32767.0, 32767.0) as i16
}

/// Converts a planar slice of 16 bit samples to float.
pub fn convert_planar_samples_to_float(input: &[i16], output: &mut [f32]) {
    assert_eq!(input.len(), output.len());
    for (out, sample) in output.iter_mut().zip(input) {
        *out = sample_to_float(*sample);
    }
}

/// Converts a planar slice of float samples to 16 bit.
pub fn convert_planar_samples_from_float(input: &[f32], output: &mut [i16]) {
    assert_eq!(input.len(), output.len());
    for (out, sample) in output.iter_mut().zip(input) {
        *out = sample_from_float(*sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greatest_common_divisor() {
        let a_values = [2, 10, 3, 5, 48000, 7, -2, 2, -3];
        let b_values = [8, 4, 1, 10, 24000, 13, 6, -6, -9];
        let expected = [2, 2, 1, 5, 24000, 1, 2, 2, 3];

        for i in 0..expected.len() {
            assert_eq!(expected[i], find_gcd(a_values[i], b_values[i]));
        }
    }

    #[test]
    fn test_next_pow_two() {
        let inputs = [2, 10, 3, 5, 48000, 7, 23, 32];
        let expected = [2, 16, 4, 8, 65536, 8, 32, 32];

        for i in 0..inputs.len() {
            assert_eq!(expected[i], next_pow_two(inputs[i]));
        }
    }

    #[test]
    fn test_ceil_to_multiple_of_frames_per_buffer() {
        assert_eq!(ceil_to_multiple_of_frames_per_buffer(0, 256), 256);
        assert_eq!(ceil_to_multiple_of_frames_per_buffer(17, 256), 256);
        assert_eq!(ceil_to_multiple_of_frames_per_buffer(256, 256), 256);
        assert_eq!(ceil_to_multiple_of_frames_per_buffer(257, 256), 512);
    }

    #[test]
    fn test_ambisonic_order_for_channel() {
        let channels = [0, 1, 4, 8, 16, 32];
        let expected_orders = [0, 1, 2, 2, 4, 5];
        for (channel, expected) in channels.iter().zip(expected_orders) {
            assert_eq!(expected, ambisonic_order_for_channel(*channel));
        }
    }

    #[test]
    fn test_ambisonic_degree_for_channel() {
        let channels = [0, 1, 4, 8, 16, 32];
        let expected_degrees = [0, -1, -2, 2, -4, 2];
        for (channel, expected) in channels.iter().zip(expected_degrees) {
            assert_eq!(expected, ambisonic_degree_for_channel(*channel));
        }
    }

    #[test]
    fn test_is_valid_ambisonic_channel_count() {
        for valid in [1, 4, 9, 16, 25, 36] {
            assert!(is_valid_ambisonic_channel_count(valid));
        }
        for invalid in [0, 2, 3, 5, 8, 50, 99] {
            assert!(!is_valid_ambisonic_channel_count(invalid));
        }
    }

    #[test]
    fn test_acn_sequence() {
        assert_eq!(acn_sequence(0, 0), Some(0));
        assert_eq!(acn_sequence(1, -1), Some(1));
        assert_eq!(acn_sequence(1, 0), Some(2));
        assert_eq!(acn_sequence(1, 1), Some(3));
        assert_eq!(acn_sequence(3, -3), Some(9));
        assert_eq!(acn_sequence(2, 3), None);
    }

    #[test]
    fn test_hann_window_symmetry() {
        let mut window = vec![0.0; 64];
        generate_hann_window(true, 64, &mut window);
        assert!((window[0]).abs() < 1e-6);
        for i in 0..32 {
            assert!((window[i] - window[63 - i]).abs() < 1e-5);
        }
    }

    // Every representable 16 bit value in the symmetric range survives a
    // trip through float and back unchanged.
    #[test]
    fn test_sample_conversion_round_trip() {
        for value in -0x7FFF..=0x7FFF_i32 {
            let sample = value as i16;
            assert_eq!(sample, sample_from_float(sample_to_float(sample)));
        }
    }

    #[test]
    fn test_sample_from_float_saturates() {
        assert_eq!(sample_from_float(1.5), 0x7FFF);
        assert_eq!(sample_from_float(-1.5), -0x7FFF);
        assert_eq!(sample_from_float(0.0), 0);
    }
}
