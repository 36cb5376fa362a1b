//! End to end scenarios driving the renderer through its public API.

use std::borrow::Cow;
use std::io::Cursor;

use glam::{Quat, Vec3};

use obr::ambisonic_encoder::AmbisonicEncoder;
use obr::audio_buffer::AudioBuffer;
use obr::audio_element::AudioElementType;
use obr::common::num_periphonic_channels;
use obr::renderer::Renderer;
use obr::sh_hrir_creator::HrirAssetProvider;

const SAMPLING_RATE: u32 = 48000;

/// Synthetic SH-HRIR assets modeling an idealized head: a single tap with
/// an omnidirectional component and a first degree left/right component,
/// mirrored between the ears. The component weights are chosen so a
/// source at +/-90 degrees azimuth produces close to +/-12 dB of
/// broadband level difference.
struct IdealizedHeadAssets;

const OMNI_TAP: i16 = 16384; // 0.5
const SIDE_TAP: i16 = 9830; // ~0.3

impl IdealizedHeadAssets {
    fn wav(order: usize, left: bool) -> Vec<u8> {
        let num_channels = num_periphonic_channels(order);
        let spec = hound::WavSpec {
            channels: num_channels as u16,
            sample_rate: SAMPLING_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let num_taps = 16;
            for tap in 0..num_taps {
                for channel in 0..num_channels {
                    let value: i16 = match (tap, channel) {
                        (0, 0) => OMNI_TAP,
                        (0, 1) => {
                            if left {
                                SIDE_TAP
                            } else {
                                -SIDE_TAP
                            }
                        }
                        _ => 0,
                    };
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }
}

impl HrirAssetProvider for IdealizedHeadAssets {
    fn get_file(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        let (order_str, ear) = name.split_once("OA_")?;
        let order: usize = order_str.parse().ok()?;
        if !(1..=7).contains(&order) {
            return None;
        }
        Some(Cow::Owned(Self::wav(order, ear == "L")))
    }
}

fn make_renderer(buffer_size: usize) -> Renderer {
    Renderer::new(buffer_size, SAMPLING_RATE, Box::new(IdealizedHeadAssets))
}

/// Encodes a Kronecker delta to an Ambisonic scene of the given order.
fn kronecker_delta_encoded_to_ambisonics(
    num_frames: usize,
    azimuth: f32,
    elevation: f32,
    distance: f32,
    ambisonic_order: usize,
) -> AudioBuffer {
    let mut mono_signal = AudioBuffer::new(1, num_frames);
    mono_signal.channel_mut(0)[0] = 1.0;

    let mut encoder = AmbisonicEncoder::new(1, ambisonic_order);
    encoder.set_source(0, 1.0, azimuth, elevation, distance);

    let mut output = AudioBuffer::new(num_periphonic_channels(ambisonic_order), num_frames);
    encoder.process(&mono_signal, &mut output);
    output
}

fn signal_energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

fn broadband_ild(left: &[f32], right: &[f32]) -> f64 {
    10.0 * (signal_energy(left) / signal_energy(right)).log10()
}

fn ambisonics_element_of_order(order: usize) -> AudioElementType {
    match order {
        1 => AudioElementType::Ambisonics1,
        2 => AudioElementType::Ambisonics2,
        3 => AudioElementType::Ambisonics3,
        4 => AudioElementType::Ambisonics4,
        5 => AudioElementType::Ambisonics5,
        6 => AudioElementType::Ambisonics6,
        7 => AudioElementType::Ambisonics7,
        _ => unreachable!(),
    }
}

// Renders Ambisonic scenes containing a Kronecker delta at different
// azimuths and checks the broadband interaural level difference.
#[test]
fn test_render_ambisonics_and_measure_broadband_ild() {
    let num_frames = 1000;
    let ild_accuracy_threshold_db = 3.0;
    let azimuth_ilds: [(f32, f64); 4] =
        [(0.0, 0.0), (90.0, 12.0), (180.0, 0.0), (270.0, -12.0)];

    for order in 1..=7usize {
        for (azimuth, expected_ild) in azimuth_ilds {
            let renderer = make_renderer(num_frames);
            renderer
                .add_audio_element(ambisonics_element_of_order(order))
                .unwrap();

            let scene = kronecker_delta_encoded_to_ambisonics(num_frames, azimuth, 0.0, 1.0, order);
            let mut output = AudioBuffer::new(2, num_frames);
            renderer.process(&scene, &mut output);

            let ild = broadband_ild(output.channel(0), output.channel(1));
            assert!(
                (ild - expected_ild).abs() < ild_accuracy_threshold_db,
                "order {order}, azimuth {azimuth}: ILD {ild:.2} dB, expected {expected_ild} dB"
            );
        }
    }
}

// A loudspeaker mix renders through the encoder path: a stereo layout
// panned hard left must favor the left ear.
#[test]
fn test_loudspeaker_layout_renders_through_encoder() {
    let num_frames = 256;
    let renderer = make_renderer(num_frames);
    renderer
        .add_audio_element(AudioElementType::LayoutStereo)
        .unwrap();
    assert_eq!(renderer.number_of_input_channels(), 2);

    let mut input = AudioBuffer::new(2, num_frames);
    input.channel_mut(0)[0] = 1.0; // kL30 only
    let mut output = AudioBuffer::new(2, num_frames);
    renderer.process(&input, &mut output);

    let ild = broadband_ild(output.channel(0), output.channel(1));
    assert!(ild > 1.0, "left loudspeaker should favor the left ear, ILD {ild:.2} dB");
}

// Moving an object with update_object_position swings the image.
#[test]
fn test_object_position_update_pans_the_source() {
    let num_frames = 256;
    let renderer = make_renderer(num_frames);
    renderer
        .add_audio_element(AudioElementType::ObjectMono)
        .unwrap();
    renderer.update_object_position(0, 90.0, 0.0, 1.0).unwrap();

    let mut input = AudioBuffer::new(1, num_frames);
    input.channel_mut(0)[0] = 1.0;
    let mut output = AudioBuffer::new(2, num_frames);
    renderer.process(&input, &mut output);
    let ild_left = broadband_ild(output.channel(0), output.channel(1));
    assert!(ild_left > 6.0);

    renderer.update_object_position(0, 270.0, 0.0, 1.0).unwrap();
    renderer.process(&input, &mut output);
    let ild_right = broadband_ild(output.channel(0), output.channel(1));
    assert!(ild_right < -6.0);
}

// Re-applying identical source parameters must not perturb the stream:
// the same input blocks produce bitwise identical output with and
// without the redundant update.
#[test]
fn test_identical_object_update_is_bitwise_transparent() {
    let num_frames = 128;
    let renderer_a = make_renderer(num_frames);
    let renderer_b = make_renderer(num_frames);
    for renderer in [&renderer_a, &renderer_b] {
        renderer
            .add_audio_element(AudioElementType::ObjectMono)
            .unwrap();
        renderer.update_object_position(0, 42.0, 10.0, 2.0).unwrap();
    }

    let mut input = AudioBuffer::new(1, num_frames);
    for (i, sample) in input.channel_mut(0).iter_mut().enumerate() {
        *sample = ((i * 37 % 19) as f32 - 9.0) * 0.05;
    }

    let mut output_a = AudioBuffer::new(2, num_frames);
    let mut output_b = AudioBuffer::new(2, num_frames);
    for _block in 0..4 {
        renderer_a.process(&input, &mut output_a);
        // The redundant update must be a no-op.
        renderer_b.update_object_position(0, 42.0, 10.0, 2.0).unwrap();
        renderer_b.process(&input, &mut output_b);

        assert_eq!(output_a.channel(0), output_b.channel(0));
        assert_eq!(output_a.channel(1), output_b.channel(1));
    }
}

// Two head rotations within the quantization threshold produce bitwise
// identical output.
#[test]
fn test_head_rotation_quantization_is_bitwise_stable() {
    let num_frames = 128;
    let renderer_a = make_renderer(num_frames);
    let renderer_b = make_renderer(num_frames);
    for renderer in [&renderer_a, &renderer_b] {
        renderer
            .add_audio_element(AudioElementType::Ambisonics3)
            .unwrap();
        renderer.enable_head_tracking(true);
        renderer.set_head_rotation(0.9239, 0.0, 0.3827, 0.0); // 45 degrees about y
    }

    let scene = kronecker_delta_encoded_to_ambisonics(num_frames, 30.0, 0.0, 1.0, 3);
    let mut output_a = AudioBuffer::new(2, num_frames);
    let mut output_b = AudioBuffer::new(2, num_frames);

    renderer_a.process(&scene, &mut output_a);
    renderer_b.process(&scene, &mut output_b);

    // Nudge renderer B's rotation by far less than the threshold.
    renderer_b.set_head_rotation(0.92391, 0.00001, 0.38269, 0.0);

    renderer_a.process(&scene, &mut output_a);
    renderer_b.process(&scene, &mut output_b);
    assert_eq!(output_a.channel(0), output_b.channel(0));
    assert_eq!(output_a.channel(1), output_b.channel(1));
}

// With head tracking enabled, the tail of the first block carries the
// full rotation: a scene rotated 90 degrees about the vertical axis must
// match an independently encoded scene at the rotated azimuth.
#[test]
fn test_head_tracking_rotates_the_sound_field() {
    let num_frames = 256;
    let source_azimuth = 22.0f32;
    let source_elevation = 33.0f32;
    // Rotating the head +90 degrees about y moves the source to 112.
    let rotated_azimuth = 112.0f32;

    let rotated_renderer = make_renderer(num_frames);
    let reference_renderer = make_renderer(num_frames);
    for renderer in [&rotated_renderer, &reference_renderer] {
        renderer
            .add_audio_element(AudioElementType::Ambisonics3)
            .unwrap();
    }

    rotated_renderer.enable_head_tracking(true);
    let rotation = Quat::from_axis_angle(Vec3::Y, 90.0f32.to_radians());
    rotated_renderer.set_head_rotation(rotation.w, rotation.x, rotation.y, rotation.z);

    // Constant excitation so every frame carries the source signature.
    let mut scene = kronecker_delta_encoded_to_ambisonics(num_frames, source_azimuth, source_elevation, 1.0, 3);
    let coeffs: Vec<f32> = (0..16).map(|ch| scene.channel(ch)[0]).collect();
    for (channel, &coeff) in coeffs.iter().enumerate() {
        scene.channel_mut(channel).fill(coeff);
    }
    let mut reference_scene =
        kronecker_delta_encoded_to_ambisonics(num_frames, rotated_azimuth, source_elevation, 1.0, 3);
    let reference_coeffs: Vec<f32> = (0..16).map(|ch| reference_scene.channel(ch)[0]).collect();
    for (channel, &coeff) in reference_coeffs.iter().enumerate() {
        reference_scene.channel_mut(channel).fill(coeff);
    }

    let mut rotated_output = AudioBuffer::new(2, num_frames);
    let mut reference_output = AudioBuffer::new(2, num_frames);
    rotated_renderer.process(&scene, &mut rotated_output);
    reference_renderer.process(&reference_scene, &mut reference_output);

    // The HRIR taps are concentrated at tap zero, so the binaural output
    // tracks the mix bed frame for frame; compare the fully interpolated
    // tail.
    for channel in 0..2 {
        for frame in num_frames - 32..num_frames {
            let rotated = rotated_output.channel(channel)[frame];
            let reference = reference_output.channel(channel)[frame];
            assert!(
                (rotated - reference).abs() < 1e-4,
                "channel {channel}, frame {frame}: {rotated} vs {reference}"
            );
        }
    }
}

// Re-enabling head tracking must apply the current pose immediately,
// without a stale interpolation ramp from the pose at disable time.
#[test]
fn test_head_tracking_reenable_has_no_ramp() {
    let num_frames = 256;
    let renderer = make_renderer(num_frames);
    renderer
        .add_audio_element(AudioElementType::Ambisonics3)
        .unwrap();

    let mut scene = kronecker_delta_encoded_to_ambisonics(num_frames, 22.0, 33.0, 1.0, 3);
    let coeffs: Vec<f32> = (0..16).map(|ch| scene.channel(ch)[0]).collect();
    for (channel, &coeff) in coeffs.iter().enumerate() {
        scene.channel_mut(channel).fill(coeff);
    }
    let mut output = AudioBuffer::new(2, num_frames);

    // Track, rotate, settle.
    renderer.enable_head_tracking(true);
    let rotation = Quat::from_axis_angle(Vec3::Y, 90.0f32.to_radians());
    renderer.set_head_rotation(rotation.w, rotation.x, rotation.y, rotation.z);
    renderer.process(&scene, &mut output);

    // Pause tracking, then re-enable with the pose unchanged.
    renderer.enable_head_tracking(false);
    renderer.process(&scene, &mut output);
    renderer.enable_head_tracking(true);
    renderer.process(&scene, &mut output);
    let first_frame_after_reenable = [output.channel(0)[0], output.channel(1)[0]];

    // Steady state under the same rotation for comparison.
    renderer.process(&scene, &mut output);
    let steady_frame = [output.channel(0)[0], output.channel(1)[0]];

    for (after_reenable, steady) in first_frame_after_reenable.iter().zip(steady_frame) {
        assert!(
            (after_reenable - steady).abs() < 1e-4,
            "re-enable ramped: {after_reenable} vs steady {steady}"
        );
    }
}

// The output peak never exceeds the limiter ceiling.
#[test]
fn test_output_is_limited_to_the_ceiling() {
    let num_frames = 4800;
    let renderer = make_renderer(num_frames);
    renderer
        .add_audio_element(AudioElementType::Ambisonics1)
        .unwrap();

    // Loud noise on the omni channel; the decoder alone would peak well
    // above full scale.
    let mut state = 0x1234_5678u32;
    let mut scene = AudioBuffer::new(4, num_frames);
    for sample in scene.channel_mut(0).iter_mut() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        *sample = ((state as f32 / u32::MAX as f32) * 2.0 - 1.0) * 4.0;
    }

    let mut output = AudioBuffer::new(2, num_frames);
    renderer.process(&scene, &mut output);

    let ceiling = 10f32.powf(-0.5 / 20.0);
    for channel in 0..2 {
        for &sample in output.channel(channel) {
            assert!(sample.abs() <= ceiling + 1e-5);
        }
    }
}

// WAV bytes survive a parse and re-emit cycle untouched once the data
// chunk size has been fixed up by the writer.
#[test]
fn test_wav_parse_and_reemit_is_byte_exact() {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let samples: Vec<i16> = (0..512).map(|i| ((i * 9173) % 32768) as i16 - 16384).collect();

    let mut first = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut first, spec).unwrap();
        for &sample in &samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    let first_bytes = first.into_inner();

    // Parse it back and re-emit.
    let mut reader = hound::WavReader::new(Cursor::new(&first_bytes)).unwrap();
    assert_eq!(reader.spec(), spec);
    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(decoded, samples);

    let mut second = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut second, spec).unwrap();
        for &sample in &decoded {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    assert_eq!(first_bytes, second.into_inner());
}
