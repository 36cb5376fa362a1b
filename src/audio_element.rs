//! Audio element types and their input channel configurations.

use crate::common::{
    num_periphonic_channels, MAX_SUPPORTED_AMBISONIC_ORDER, MIN_SUPPORTED_AMBISONIC_ORDER,
};
use crate::error::ObrError;
use crate::loudspeaker_layouts::loudspeaker_layout;

/// The kinds of audio elements the renderer accepts.
///
/// Ambisonics elements feed the mix bed directly; loudspeaker layouts and
/// objects pass through the Ambisonic encoder first.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioElementType {
    // Ambisonic scenes of order 1 through 7.
    Ambisonics1,
    Ambisonics2,
    Ambisonics3,
    Ambisonics4,
    Ambisonics5,
    Ambisonics6,
    Ambisonics7,
    // Loudspeaker layouts.
    LayoutMono,
    LayoutStereo,
    Layout3_1_2,
    Layout5_1_0,
    Layout5_1_2,
    Layout5_1_4,
    Layout7_1_0,
    Layout7_1_2,
    Layout7_1_4,
    Layout9_1_0,
    Layout9_1_2,
    Layout9_1_4,
    Layout9_1_6,
    // Audio objects.
    ObjectMono,
}

impl AudioElementType {
    /// Returns true for Ambisonic scene elements.
    pub fn is_ambisonics(&self) -> bool {
        self.ambisonic_order().is_some()
    }

    /// Returns true for loudspeaker layout elements.
    pub fn is_loudspeaker_layout(&self) -> bool {
        use AudioElementType::*;
        matches!(
            self,
            LayoutMono
                | LayoutStereo
                | Layout3_1_2
                | Layout5_1_0
                | Layout5_1_2
                | Layout5_1_4
                | Layout7_1_0
                | Layout7_1_2
                | Layout7_1_4
                | Layout9_1_0
                | Layout9_1_2
                | Layout9_1_4
                | Layout9_1_6
        )
    }

    /// Returns true for object elements.
    pub fn is_object(&self) -> bool {
        matches!(self, AudioElementType::ObjectMono)
    }

    /// Returns the Ambisonic order of a scene element.
    pub fn ambisonic_order(&self) -> Option<usize> {
        use AudioElementType::*;
        match self {
            Ambisonics1 => Some(1),
            Ambisonics2 => Some(2),
            Ambisonics3 => Some(3),
            Ambisonics4 => Some(4),
            Ambisonics5 => Some(5),
            Ambisonics6 => Some(6),
            Ambisonics7 => Some(7),
            _ => None,
        }
    }

    /// Returns the display name of the element type.
    pub fn as_str(&self) -> &'static str {
        use AudioElementType::*;
        match self {
            Ambisonics1 => "1OA",
            Ambisonics2 => "2OA",
            Ambisonics3 => "3OA",
            Ambisonics4 => "4OA",
            Ambisonics5 => "5OA",
            Ambisonics6 => "6OA",
            Ambisonics7 => "7OA",
            LayoutMono => "Mono",
            LayoutStereo => "Stereo",
            Layout3_1_2 => "3.1.2",
            Layout5_1_0 => "5.1",
            Layout5_1_2 => "5.1.2",
            Layout5_1_4 => "5.1.4",
            Layout7_1_0 => "7.1",
            Layout7_1_2 => "7.1.2",
            Layout7_1_4 => "7.1.4",
            Layout9_1_0 => "9.1",
            Layout9_1_2 => "9.1.2",
            Layout9_1_4 => "9.1.4",
            Layout9_1_6 => "9.1.6",
            ObjectMono => "ObjectMono",
        }
    }
}

impl std::fmt::Display for AudioElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An Ambisonic scene input channel, identified by its ACN label.
#[derive(Debug, Clone)]
pub struct AmbisonicSceneInputChannel {
    id: String,
    input_channel_index: usize,
}

impl AmbisonicSceneInputChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            input_channel_index: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel_index(&self) -> usize {
        self.input_channel_index
    }

    pub fn set_channel_index(&mut self, index: usize) {
        self.input_channel_index = index;
    }
}

/// A loudspeaker feed with its fixed virtual position.
#[derive(Debug, Clone)]
pub struct LoudspeakerLayoutInputChannel {
    id: String,
    input_channel_index: usize,
    azimuth: f32,
    elevation: f32,
    distance: f32,
    is_lfe: bool,
}

impl LoudspeakerLayoutInputChannel {
    pub fn new(
        id: impl Into<String>,
        azimuth: f32,
        elevation: f32,
        distance: f32,
        is_lfe: bool,
    ) -> Self {
        Self {
            id: id.into(),
            input_channel_index: 0,
            azimuth,
            elevation,
            distance,
            is_lfe,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel_index(&self) -> usize {
        self.input_channel_index
    }

    pub fn set_channel_index(&mut self, index: usize) {
        self.input_channel_index = index;
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn is_lfe(&self) -> bool {
        self.is_lfe
    }
}

/// An audio object input channel with a movable position.
#[derive(Debug, Clone)]
pub struct AudioObjectInputChannel {
    id: String,
    input_channel_index: usize,
    gain: f32,
    azimuth: f32,
    elevation: f32,
    distance: f32,
}

impl AudioObjectInputChannel {
    pub fn new(id: impl Into<String>, azimuth: f32, elevation: f32, distance: f32) -> Self {
        Self {
            id: id.into(),
            input_channel_index: 0,
            gain: 1.0,
            azimuth,
            elevation,
            distance,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel_index(&self) -> usize {
        self.input_channel_index
    }

    pub fn set_channel_index(&mut self, index: usize) {
        self.input_channel_index = index;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn set_azimuth(&mut self, azimuth: f32) {
        self.azimuth = azimuth;
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn set_elevation(&mut self, elevation: f32) {
        self.elevation = elevation;
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance;
    }
}

/// Configuration of a single audio element: its type, the span of renderer
/// input channels it occupies, and the per-channel descriptors.
#[derive(Debug, Clone)]
pub struct AudioElementConfig {
    element_type: AudioElementType,
    first_channel_index: usize,
    number_of_input_channels: usize,
    /// Ambisonic order of the binaural filter bank this element renders
    /// through. Scene elements use their own order; loudspeaker layouts
    /// and objects use the highest available.
    binaural_filters_ambisonic_order: usize,
    ambisonic_channels: Vec<AmbisonicSceneInputChannel>,
    loudspeaker_channels: Vec<LoudspeakerLayoutInputChannel>,
    object_channels: Vec<AudioObjectInputChannel>,
}

impl AudioElementConfig {
    pub fn new(element_type: AudioElementType) -> Result<Self, ObrError> {
        let mut config = Self {
            element_type,
            first_channel_index: 0,
            number_of_input_channels: 0,
            binaural_filters_ambisonic_order: 0,
            ambisonic_channels: Vec::new(),
            loudspeaker_channels: Vec::new(),
            object_channels: Vec::new(),
        };

        if let Some(order) = element_type.ambisonic_order() {
            assert!((MIN_SUPPORTED_AMBISONIC_ORDER..=MAX_SUPPORTED_AMBISONIC_ORDER)
                .contains(&order));
            // Binaural filters match the order of the input; scaling an
            // Ambisonic scene up or down is not supported.
            config.binaural_filters_ambisonic_order = order;
            config.number_of_input_channels = num_periphonic_channels(order);
            for i in 0..config.number_of_input_channels {
                config
                    .ambisonic_channels
                    .push(AmbisonicSceneInputChannel::new(format!("kACN{i}")));
            }
        } else if element_type.is_loudspeaker_layout() {
            config.loudspeaker_channels = loudspeaker_layout(element_type)?;
            config.binaural_filters_ambisonic_order = MAX_SUPPORTED_AMBISONIC_ORDER;
            config.number_of_input_channels = config.loudspeaker_channels.len();
        } else if element_type.is_object() {
            config
                .object_channels
                .push(AudioObjectInputChannel::new("kMono", 0.0, 0.0, 1.0));
            config.binaural_filters_ambisonic_order = MAX_SUPPORTED_AMBISONIC_ORDER;
            config.number_of_input_channels = config.object_channels.len();
        } else {
            return Err(ObrError::InvalidConfig(format!(
                "unknown audio element type: {element_type}"
            )));
        }

        config.set_first_channel_index(0);
        Ok(config)
    }

    pub fn element_type(&self) -> AudioElementType {
        self.element_type
    }

    /// Moves the element to start at `first_channel` of the renderer
    /// input, updating every contained channel index.
    pub fn set_first_channel_index(&mut self, first_channel: usize) {
        self.first_channel_index = first_channel;
        for (i, channel) in self.ambisonic_channels.iter_mut().enumerate() {
            channel.set_channel_index(first_channel + i);
        }
        for (i, channel) in self.loudspeaker_channels.iter_mut().enumerate() {
            channel.set_channel_index(first_channel + i);
        }
        for (i, channel) in self.object_channels.iter_mut().enumerate() {
            channel.set_channel_index(first_channel + i);
        }
    }

    pub fn first_channel_index(&self) -> usize {
        self.first_channel_index
    }

    pub fn number_of_input_channels(&self) -> usize {
        self.number_of_input_channels
    }

    pub fn binaural_filters_ambisonic_order(&self) -> usize {
        self.binaural_filters_ambisonic_order
    }

    pub fn ambisonic_channels(&self) -> &[AmbisonicSceneInputChannel] {
        &self.ambisonic_channels
    }

    pub fn loudspeaker_channels(&self) -> &[LoudspeakerLayoutInputChannel] {
        &self.loudspeaker_channels
    }

    pub fn object_channels(&self) -> &[AudioObjectInputChannel] {
        &self.object_channels
    }

    pub fn object_channels_mut(&mut self) -> &mut [AudioObjectInputChannel] {
        &mut self.object_channels
    }
}
