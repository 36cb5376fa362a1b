//! The renderer façade tying the DSP stages together.

use std::fmt::Write as _;
use std::sync::Mutex;

use glam::Quat;
use log::{error, info};

use crate::ambisonic_binaural_decoder::AmbisonicBinauralDecoder;
use crate::ambisonic_encoder::AmbisonicEncoder;
use crate::ambisonic_rotator::AmbisonicRotator;
use crate::audio_buffer::AudioBuffer;
use crate::audio_element::{AudioElementConfig, AudioElementType};
use crate::common::{
    num_periphonic_channels, MAX_SUPPORTED_AMBISONIC_ORDER, MAX_SUPPORTED_NUM_INPUT_CHANNELS,
    MIN_SUPPORTED_AMBISONIC_ORDER, NUM_BINAURAL_CHANNELS,
};
use crate::error::ObrError;
use crate::fft_manager::FftManager;
use crate::peak_limiter::PeakLimiter;
use crate::resampler::Resampler;
use crate::sh_hrir_creator::{create_sh_hrirs_from_assets, HrirAssetProvider};

/// The DSP chain built for one configuration of audio elements. Torn
/// down and rebuilt whenever the element list changes.
struct Dsp {
    ambisonic_mix_bed: AudioBuffer,
    /// Gather buffer and encoder for loudspeaker/object channels; absent
    /// when every element is an Ambisonic scene.
    ambisonic_encoder: Option<(AudioBuffer, AmbisonicEncoder)>,
    ambisonic_rotator: AmbisonicRotator,
    ambisonic_binaural_decoder: AmbisonicBinauralDecoder,
    peak_limiter: PeakLimiter,
}

/// State behind the advisory lock: the element list, head tracking, and
/// the current DSP chain.
struct RendererInner {
    audio_elements: Vec<AudioElementConfig>,
    head_tracking_enabled: bool,
    world_rotation: Quat,
    fft_manager: FftManager,
    resampler: Resampler,
    dsp: Option<Dsp>,
}

/// Binaural renderer for Ambisonic scene, loudspeaker layout and audio
/// object elements.
///
/// A renderer is constructed with a fixed block size and sample rate.
/// Audio elements are then added sequentially; each mutation rebuilds the
/// DSP chain. All mutating calls and `process` synchronize on one
/// advisory mutex, held for the whole `process` call, so configuration
/// may be driven from a control thread while an audio thread renders.
pub struct Renderer {
    buffer_size_per_channel: usize,
    sampling_rate: u32,
    hrir_assets: Box<dyn HrirAssetProvider>,
    inner: Mutex<RendererInner>,
}

impl Renderer {
    /// Creates a renderer processing blocks of `buffer_size_per_channel`
    /// frames at `sampling_rate` Hz, resolving SH-HRIR filter banks
    /// through `hrir_assets`.
    pub fn new(
        buffer_size_per_channel: usize,
        sampling_rate: u32,
        hrir_assets: Box<dyn HrirAssetProvider>,
    ) -> Self {
        assert!(buffer_size_per_channel > 0);
        assert!(sampling_rate > 0);
        Self {
            buffer_size_per_channel,
            sampling_rate,
            hrir_assets,
            inner: Mutex::new(RendererInner {
                audio_elements: Vec::new(),
                head_tracking_enabled: false,
                world_rotation: Quat::IDENTITY,
                fft_manager: FftManager::new(buffer_size_per_channel),
                resampler: Resampler::new(),
                dsp: None,
            }),
        }
    }

    pub fn buffer_size_per_channel(&self) -> usize {
        self.buffer_size_per_channel
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    /// Returns the total number of input channels across all elements.
    pub fn number_of_input_channels(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        Self::input_channel_count(&inner.audio_elements)
    }

    pub fn number_of_output_channels(&self) -> usize {
        NUM_BINAURAL_CHANNELS
    }

    pub fn number_of_audio_elements(&self) -> usize {
        self.inner.lock().unwrap().audio_elements.len()
    }

    /// Appends an audio element and rebuilds the DSP chain.
    ///
    /// All elements must share one type; the total input channel count
    /// must stay within [`MAX_SUPPORTED_NUM_INPUT_CHANNELS`]. On failure
    /// the element list is left as it was.
    pub fn add_audio_element(&self, element_type: AudioElementType) -> Result<(), ObrError> {
        let mut inner = self.inner.lock().unwrap();

        // Rendering different element types in one pass would need one
        // decoder per binaural filter order; until then the list is
        // homogeneous.
        if let Some(last) = inner.audio_elements.last() {
            if last.element_type() != element_type {
                error!(
                    "Rendering only the same type of audio elements is supported. \
                     Remove the existing audio element before adding a new one."
                );
                return Err(ObrError::InvalidConfig(
                    "only same-typed audio elements are supported".to_string(),
                ));
            }
        }

        let mut config = AudioElementConfig::new(element_type)?;
        if let Some(last) = inner.audio_elements.last() {
            config.set_first_channel_index(
                last.first_channel_index() + last.number_of_input_channels(),
            );
        }

        if Self::input_channel_count(&inner.audio_elements) + config.number_of_input_channels()
            > MAX_SUPPORTED_NUM_INPUT_CHANNELS
        {
            error!(
                "More input channels requested than supported ({}).",
                MAX_SUPPORTED_NUM_INPUT_CHANNELS
            );
            return Err(ObrError::Exhausted(
                "more input channels requested than supported".to_string(),
            ));
        }

        inner.audio_elements.push(config);
        info!(
            "Added audio element: {}.",
            inner.audio_elements.last().unwrap().element_type()
        );

        if let Err(e) = self.initialize_dsp(&mut inner) {
            // Leave the configuration as it was before the failed add.
            inner.audio_elements.pop();
            if inner.audio_elements.is_empty() {
                inner.dsp = None;
            } else {
                self.initialize_dsp(&mut inner)?;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes the most recently added element, rebuilding the DSP chain
    /// when elements remain.
    pub fn remove_last_audio_element(&self) -> Result<(), ObrError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(removed) = inner.audio_elements.pop() else {
            info!("No audio elements to remove.");
            return Err(ObrError::Precondition(
                "no audio elements to remove".to_string(),
            ));
        };
        info!("Removing audio element: {}.", removed.element_type());

        if inner.audio_elements.is_empty() {
            info!("No audio elements left.");
            inner.dsp = None;
            return Ok(());
        }
        self.initialize_dsp(&mut inner)
    }

    /// Moves every object channel of the element at `audio_element_index`
    /// to the same direction and refreshes the encoder.
    pub fn update_object_position(
        &self,
        audio_element_index: usize,
        azimuth: f32,
        elevation: f32,
        distance: f32,
    ) -> Result<(), ObrError> {
        let mut inner = self.inner.lock().unwrap();
        if audio_element_index >= inner.audio_elements.len() {
            error!("Invalid audio element index.");
            return Err(ObrError::InvalidConfig(
                "invalid audio element index".to_string(),
            ));
        }
        if inner.audio_elements[audio_element_index]
            .object_channels()
            .is_empty()
        {
            error!("No objects in the audio element.");
            return Err(ObrError::Precondition(
                "no objects in the audio element".to_string(),
            ));
        }

        for object_channel in inner.audio_elements[audio_element_index]
            .object_channels_mut()
            .iter_mut()
        {
            object_channel.set_azimuth(azimuth);
            object_channel.set_elevation(elevation);
            object_channel.set_distance(distance);
        }
        Self::update_ambisonic_encoder(&mut inner)
    }

    /// Enables or disables sound field rotation by the head pose. On
    /// re-enabling, the rotator snaps to the current pose so no stale
    /// interpolation ramp is audible.
    pub fn enable_head_tracking(&self, enable: bool) {
        let mut inner = self.inner.lock().unwrap();
        if enable && !inner.head_tracking_enabled {
            let rotation = inner.world_rotation;
            if let Some(dsp) = inner.dsp.as_mut() {
                dsp.ambisonic_rotator.reset(rotation);
            }
        }
        inner.head_tracking_enabled = enable;
    }

    /// Stores the current head orientation quaternion, read by `process`
    /// when head tracking is enabled.
    pub fn set_head_rotation(&self, w: f32, x: f32, y: f32, z: f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.world_rotation = Quat::from_xyzw(x, y, z, w);
    }

    /// Renders one block: encodes loudspeaker/object channels into the
    /// Ambisonic mix bed, copies Ambisonic channels in directly, rotates
    /// the bed under head tracking, decodes to binaural and limits.
    ///
    /// # Panics
    ///
    /// Panics when no elements are configured or when the buffer shapes
    /// do not match the configuration; both are programmer errors.
    pub fn process(&self, input_buffer: &AudioBuffer, output_buffer: &mut AudioBuffer) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(
            input_buffer.num_channels(),
            Self::input_channel_count(&inner.audio_elements),
            "input channel count does not match the configured audio elements"
        );
        assert_eq!(input_buffer.num_frames(), self.buffer_size_per_channel);
        assert_eq!(output_buffer.num_channels(), NUM_BINAURAL_CHANNELS);
        assert_eq!(output_buffer.num_frames(), self.buffer_size_per_channel);

        let RendererInner {
            audio_elements,
            head_tracking_enabled,
            world_rotation,
            fft_manager,
            dsp,
            ..
        } = &mut *inner;
        let dsp = dsp
            .as_mut()
            .expect("precondition: process called with no audio elements configured");

        // Encode loudspeaker and object channels into the mix bed.
        let indices = Self::encoder_source_channel_indices(audio_elements);
        if let Some((encoder_input, encoder)) = dsp.ambisonic_encoder.as_mut() {
            for (i, &index) in indices.iter().enumerate() {
                encoder_input
                    .channel_mut(i)
                    .copy_from_slice(input_buffer.channel(index));
            }
            encoder.process(encoder_input, &mut dsp.ambisonic_mix_bed);
        } else {
            dsp.ambisonic_mix_bed.clear();
        }

        // Ambisonic scene channels feed the bed without encoding.
        for audio_element in audio_elements.iter() {
            if audio_element.element_type().is_ambisonics() {
                for channel in 0..audio_element.number_of_input_channels() {
                    dsp.ambisonic_mix_bed.accumulate_channel(
                        channel,
                        input_buffer.channel(audio_element.first_channel_index() + channel),
                    );
                }
            }
        }

        if *head_tracking_enabled {
            dsp.ambisonic_rotator
                .process(*world_rotation, &mut dsp.ambisonic_mix_bed);
        }

        dsp.ambisonic_binaural_decoder
            .process(&dsp.ambisonic_mix_bed, output_buffer, fft_manager);

        dsp.peak_limiter.process(output_buffer);
    }

    /// Renders a table describing the configured audio elements, used
    /// for logging at configuration time.
    pub fn audio_element_config_log_message(&self) -> String {
        const HEADER: [(&str, usize); 9] = [
            ("AE ID", 5),
            ("Type", 15),
            ("BinFlt xOA", 10),
            ("Ch ID", 5),
            ("Ch Label", 10),
            ("Azimuth", 10),
            ("Elevation", 10),
            ("Distance", 10),
            ("LFE", 5),
        ];

        fn pad_left(text: &str, width: usize) -> String {
            if text.len() < width {
                format!("{}{}", " ".repeat(width - text.len()), text)
            } else {
                text.to_string()
            }
        }

        fn angle_value(number: f32) -> String {
            pad_left(&format!("{number:.2}"), 7)
        }

        fn border(message: &mut String) {
            message.push('+');
            for (_, width) in HEADER {
                message.push_str(&"-".repeat(width));
                message.push('+');
            }
            message.push('\n');
        }

        fn row(message: &mut String, columns: &[String]) {
            message.push('|');
            for (text, (_, width)) in columns.iter().zip(HEADER) {
                message.push_str(&pad_left(text, width));
                message.push('|');
            }
            message.push('\n');
        }

        let inner = self.inner.lock().unwrap();
        let mut message = String::new();
        border(&mut message);
        message.push('|');
        for (label, width) in HEADER {
            let _ = write!(message, "{label:<width$}|");
        }
        message.push('\n');

        for (element_index, audio_element) in inner.audio_elements.iter().enumerate() {
            border(&mut message);
            let element_columns = [
                element_index.to_string(),
                audio_element.element_type().to_string(),
                audio_element.binaural_filters_ambisonic_order().to_string(),
            ];

            for channel in audio_element.ambisonic_channels() {
                let mut columns = element_columns.to_vec();
                columns.extend([
                    channel.channel_index().to_string(),
                    channel.id().to_string(),
                    "N/A".to_string(),
                    "N/A".to_string(),
                    "N/A".to_string(),
                    "N/A".to_string(),
                ]);
                row(&mut message, &columns);
            }
            for channel in audio_element.loudspeaker_channels() {
                let mut columns = element_columns.to_vec();
                columns.extend([
                    channel.channel_index().to_string(),
                    channel.id().to_string(),
                    angle_value(channel.azimuth()),
                    angle_value(channel.elevation()),
                    angle_value(channel.distance()),
                    if channel.is_lfe() { "Yes" } else { "No" }.to_string(),
                ]);
                row(&mut message, &columns);
            }
            for channel in audio_element.object_channels() {
                let mut columns = element_columns.to_vec();
                columns.extend([
                    channel.channel_index().to_string(),
                    channel.id().to_string(),
                    angle_value(channel.azimuth()),
                    angle_value(channel.elevation()),
                    angle_value(channel.distance()),
                    "N/A".to_string(),
                ]);
                row(&mut message, &columns);
            }
        }
        border(&mut message);
        message
    }

    fn input_channel_count(audio_elements: &[AudioElementConfig]) -> usize {
        audio_elements
            .iter()
            .map(|element| element.number_of_input_channels())
            .sum()
    }

    /// Absolute input channel indices routed through the encoder, i.e.
    /// every loudspeaker and object channel in element order.
    fn encoder_source_channel_indices(audio_elements: &[AudioElementConfig]) -> Vec<usize> {
        let mut source_channel_indices = Vec::new();
        for audio_element in audio_elements {
            if audio_element.element_type().is_loudspeaker_layout()
                || audio_element.element_type().is_object()
            {
                for i in 0..audio_element.number_of_input_channels() {
                    source_channel_indices.push(audio_element.first_channel_index() + i);
                }
            }
        }
        source_channel_indices
    }

    /// Tears down and rebuilds the whole DSP chain for the current
    /// element list.
    fn initialize_dsp(&self, inner: &mut RendererInner) -> Result<(), ObrError> {
        if inner.audio_elements.is_empty() {
            return Err(ObrError::Precondition(
                "no audio elements configured, cannot initialize DSP".to_string(),
            ));
        }

        // Until rendering of multiple orders is implemented, the DSP runs
        // at the binaural filter order of the first element.
        let order = inner.audio_elements[0].binaural_filters_ambisonic_order();
        assert!((MIN_SUPPORTED_AMBISONIC_ORDER..=MAX_SUPPORTED_AMBISONIC_ORDER).contains(&order));

        let number_of_input_channels = Self::input_channel_count(&inner.audio_elements);
        if number_of_input_channels == 0 {
            return Err(ObrError::Precondition(
                "no input channels configured, cannot initialize DSP".to_string(),
            ));
        }

        info!("Resetting DSP.");
        inner.dsp = None;

        let num_bed_channels = num_periphonic_channels(order);
        info!("Initializing DSP:");
        info!("  - Number of input channels: {number_of_input_channels}");
        info!("  - Binaural filters Ambisonic order: {order}");
        info!("  - Number of Ambisonic mix bed channels: {num_bed_channels}");

        let ambisonic_mix_bed = AudioBuffer::new(num_bed_channels, self.buffer_size_per_channel);

        let indices = Self::encoder_source_channel_indices(&inner.audio_elements);
        let ambisonic_encoder = if indices.is_empty() {
            None
        } else {
            Some((
                AudioBuffer::new(indices.len(), self.buffer_size_per_channel),
                AmbisonicEncoder::new(indices.len(), order),
            ))
        };

        let ambisonic_rotator = AmbisonicRotator::new(order);

        // Load the filter bank matching the operational order.
        let sh_hrirs_left = create_sh_hrirs_from_assets(
            self.hrir_assets.as_ref(),
            &format!("{order}OA_L"),
            self.sampling_rate,
            &mut inner.resampler,
        )?;
        let sh_hrirs_right = create_sh_hrirs_from_assets(
            self.hrir_assets.as_ref(),
            &format!("{order}OA_R"),
            self.sampling_rate,
            &mut inner.resampler,
        )?;
        if sh_hrirs_left.num_channels() != num_bed_channels
            || sh_hrirs_right.num_channels() != num_bed_channels
        {
            return Err(ObrError::Unsupported(format!(
                "HRIR channel counts ({}, {}) do not match order {order}",
                sh_hrirs_left.num_channels(),
                sh_hrirs_right.num_channels()
            )));
        }
        if sh_hrirs_left.num_frames() != sh_hrirs_right.num_frames() {
            return Err(ObrError::Unsupported(
                "left and right HRIR sets differ in length".to_string(),
            ));
        }

        let ambisonic_binaural_decoder = AmbisonicBinauralDecoder::new(
            &sh_hrirs_left,
            &sh_hrirs_right,
            self.buffer_size_per_channel,
            &mut inner.fft_manager,
        );

        let peak_limiter = PeakLimiter::new(self.sampling_rate, 50.0, -0.5);

        let has_encoder = ambisonic_encoder.is_some();
        inner.dsp = Some(Dsp {
            ambisonic_mix_bed,
            ambisonic_encoder,
            ambisonic_rotator,
            ambisonic_binaural_decoder,
            peak_limiter,
        });
        if has_encoder {
            Self::update_ambisonic_encoder(inner)?;
        }
        Ok(())
    }

    /// Pushes the loudspeaker and object channel positions of every
    /// element into the encoder.
    fn update_ambisonic_encoder(inner: &mut RendererInner) -> Result<(), ObrError> {
        let RendererInner {
            audio_elements,
            dsp,
            ..
        } = inner;
        let Some((_, encoder)) = dsp.as_mut().and_then(|dsp| dsp.ambisonic_encoder.as_mut())
        else {
            return Err(ObrError::Precondition(
                "ambisonic encoder not initialized".to_string(),
            ));
        };

        let mut encoder_input_channel_index = 0usize;
        for audio_element in audio_elements.iter() {
            for source in audio_element.loudspeaker_channels() {
                encoder.set_source(
                    encoder_input_channel_index,
                    1.0,
                    source.azimuth(),
                    source.elevation(),
                    source.distance(),
                );
                encoder_input_channel_index += 1;
            }
            for source in audio_element.object_channels() {
                encoder.set_source(
                    encoder_input_channel_index,
                    source.gain(),
                    source.azimuth(),
                    source.elevation(),
                    source.distance(),
                );
                encoder_input_channel_index += 1;
            }
        }
        Ok(())
    }
}
