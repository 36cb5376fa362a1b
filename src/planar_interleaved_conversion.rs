//! Conversion between interleaved sample streams and planar buffers.
//!
//! File IO and most audio APIs deliver interleaved frames; the DSP
//! pipeline works on planar [`AudioBuffer`]s. These helpers convert
//! between the two, going through the 16 bit sample conversions of
//! [`crate::common`] where a bit depth change is involved.

use crate::audio_buffer::AudioBuffer;
use crate::common::{sample_from_float, sample_to_float};

/// Fills `output` from an interleaved 16 bit sample stream. The stream
/// may be shorter than the buffer, in which case remaining frames are
/// left untouched; excess input is ignored.
pub fn fill_audio_buffer_from_interleaved_i16(
    interleaved: &[i16],
    num_channels: usize,
    output: &mut AudioBuffer,
) {
    assert_eq!(output.num_channels(), num_channels);
    let num_frames = (interleaved.len() / num_channels).min(output.num_frames());
    for channel in 0..num_channels {
        let samples = output.channel_mut(channel);
        for (frame, sample) in samples.iter_mut().take(num_frames).enumerate() {
            *sample = sample_to_float(interleaved[frame * num_channels + channel]);
        }
    }
}

/// Fills `output` from an interleaved float sample stream.
pub fn fill_audio_buffer_from_interleaved_f32(
    interleaved: &[f32],
    num_channels: usize,
    output: &mut AudioBuffer,
) {
    assert_eq!(output.num_channels(), num_channels);
    let num_frames = (interleaved.len() / num_channels).min(output.num_frames());
    for channel in 0..num_channels {
        let samples = output.channel_mut(channel);
        for (frame, sample) in samples.iter_mut().take(num_frames).enumerate() {
            *sample = interleaved[frame * num_channels + channel];
        }
    }
}

/// Writes `input` into an interleaved 16 bit stream, saturating samples
/// outside `[-1.0, 1.0]`. The output slice must hold exactly
/// `num_frames * num_channels` samples.
pub fn interleave_audio_buffer_to_i16(input: &AudioBuffer, output: &mut [i16]) {
    assert_eq!(output.len(), input.num_frames() * input.num_channels());
    let num_channels = input.num_channels();
    for channel in 0..num_channels {
        for (frame, &sample) in input.channel(channel).iter().enumerate() {
            output[frame * num_channels + channel] = sample_from_float(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn test_fill_from_interleaved_i16() {
        // Two channels, three frames: L0 R0 L1 R1 L2 R2.
        let interleaved: [i16; 6] = [16384, -16384, 8192, -8192, 0, 32767];
        let mut buffer = AudioBuffer::new(2, 3);
        fill_audio_buffer_from_interleaved_i16(&interleaved, 2, &mut buffer);

        assert_float_eq!(buffer.channel(0), &[0.5, 0.25, 0.0][..], abs_all <= 1e-6);
        assert_float_eq!(
            buffer.channel(1),
            &[-0.5, -0.25, 32767.0 / 32768.0][..],
            abs_all <= 1e-6
        );
    }

    #[test]
    fn test_fill_short_input_leaves_tail() {
        let interleaved: [i16; 2] = [16384, -16384];
        let mut buffer = AudioBuffer::new(2, 3);
        buffer.channel_mut(0).fill(1.0);
        buffer.channel_mut(1).fill(1.0);
        fill_audio_buffer_from_interleaved_i16(&interleaved, 2, &mut buffer);

        assert_float_eq!(buffer.channel(0), &[0.5, 1.0, 1.0][..], abs_all <= 1e-6);
        assert_float_eq!(buffer.channel(1), &[-0.5, 1.0, 1.0][..], abs_all <= 1e-6);
    }

    #[test]
    fn test_fill_from_interleaved_f32() {
        let interleaved = [0.1f32, -0.1, 0.2, -0.2];
        let mut buffer = AudioBuffer::new(2, 2);
        fill_audio_buffer_from_interleaved_f32(&interleaved, 2, &mut buffer);

        assert_float_eq!(buffer.channel(0), &[0.1, 0.2][..], abs_all <= 0.0);
        assert_float_eq!(buffer.channel(1), &[-0.1, -0.2][..], abs_all <= 0.0);
    }

    #[test]
    fn test_interleave_round_trip() {
        let interleaved: [i16; 8] = [100, -100, 200, -200, 300, -300, 32767, -32767];
        let mut buffer = AudioBuffer::new(2, 4);
        fill_audio_buffer_from_interleaved_i16(&interleaved, 2, &mut buffer);

        let mut out = [0i16; 8];
        interleave_audio_buffer_to_i16(&buffer, &mut out);
        assert_eq!(interleaved, out);
    }

    #[test]
    fn test_interleave_saturates() {
        let mut buffer = AudioBuffer::new(1, 2);
        buffer.channel_mut(0).copy_from_slice(&[2.0, -2.0]);
        let mut out = [0i16; 2];
        interleave_audio_buffer_to_i16(&buffer, &mut out);
        assert_eq!(out, [32767, -32767]);
    }
}
