//! Static definitions of the renderable loudspeaker layouts.

use crate::audio_element::{AudioElementType, LoudspeakerLayoutInputChannel};
use crate::error::ObrError;

/// Labels of the virtual loudspeakers used across layouts. The number in
/// a label is the azimuth in degrees, positive to the left; a `T` prefix
/// marks a top (elevated) loudspeaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VirtualLoudspeaker {
    C,
    Lfe,
    L30,
    R30,
    L45,
    R45,
    L60,
    R60,
    L90,
    R90,
    L110,
    R110,
    L135,
    R135,
    Tl30,
    Tr30,
    Tl45,
    Tr45,
    Tl90,
    Tr90,
    Tl135,
    Tr135,
    Tl150,
    Tr150,
}

impl VirtualLoudspeaker {
    /// Returns the source configuration of this loudspeaker: label,
    /// azimuth, elevation, distance and the LFE flag.
    fn channel(self) -> LoudspeakerLayoutInputChannel {
        use VirtualLoudspeaker::*;
        match self {
            C => LoudspeakerLayoutInputChannel::new("kC", 0.0, 0.0, 1.0, false),
            Lfe => LoudspeakerLayoutInputChannel::new("kLFE", 0.0, -30.0, 1.0, true),
            L30 => LoudspeakerLayoutInputChannel::new("kL30", 30.0, 0.0, 1.0, false),
            R30 => LoudspeakerLayoutInputChannel::new("kR30", -30.0, 0.0, 1.0, false),
            L45 => LoudspeakerLayoutInputChannel::new("kL45", 45.0, 0.0, 1.0, false),
            R45 => LoudspeakerLayoutInputChannel::new("kR45", -45.0, 0.0, 1.0, false),
            L60 => LoudspeakerLayoutInputChannel::new("kL60", 60.0, 0.0, 1.0, false),
            R60 => LoudspeakerLayoutInputChannel::new("kR60", -60.0, 0.0, 1.0, false),
            L90 => LoudspeakerLayoutInputChannel::new("kL90", 90.0, 0.0, 1.0, false),
            R90 => LoudspeakerLayoutInputChannel::new("kR90", -90.0, 0.0, 1.0, false),
            L110 => LoudspeakerLayoutInputChannel::new("kL110", 110.0, 0.0, 1.0, false),
            R110 => LoudspeakerLayoutInputChannel::new("kR110", -110.0, 0.0, 1.0, false),
            L135 => LoudspeakerLayoutInputChannel::new("kL135", 135.0, 0.0, 1.0, false),
            R135 => LoudspeakerLayoutInputChannel::new("kR135", -135.0, 0.0, 1.0, false),
            Tl30 => LoudspeakerLayoutInputChannel::new("kTL30", 30.0, 45.0, 1.0, false),
            Tr30 => LoudspeakerLayoutInputChannel::new("kTR30", -30.0, 45.0, 1.0, false),
            Tl45 => LoudspeakerLayoutInputChannel::new("kTL45", 45.0, 45.0, 1.0, false),
            Tr45 => LoudspeakerLayoutInputChannel::new("kTR45", -45.0, 45.0, 1.0, false),
            Tl90 => LoudspeakerLayoutInputChannel::new("kTL90", 90.0, 45.0, 1.0, false),
            Tr90 => LoudspeakerLayoutInputChannel::new("kTR90", -90.0, 45.0, 1.0, false),
            Tl135 => LoudspeakerLayoutInputChannel::new("kTL135", 135.0, 45.0, 1.0, false),
            Tr135 => LoudspeakerLayoutInputChannel::new("kTR135", -135.0, 45.0, 1.0, false),
            Tl150 => LoudspeakerLayoutInputChannel::new("kTL150", 150.0, 45.0, 1.0, false),
            Tr150 => LoudspeakerLayoutInputChannel::new("kTR150", -150.0, 45.0, 1.0, false),
        }
    }
}

/// Returns the ordered loudspeakers of `layout`.
fn layout_loudspeakers(layout: AudioElementType) -> Option<&'static [VirtualLoudspeaker]> {
    use AudioElementType::*;
    use VirtualLoudspeaker::*;
    Some(match layout {
        LayoutMono => &[C],
        LayoutStereo => &[L30, R30],
        Layout3_1_2 => &[L45, R45, C, Lfe, Tl30, Tr30],
        Layout5_1_0 => &[L30, R30, C, Lfe, L110, R110],
        Layout5_1_2 => &[L30, R30, C, Lfe, L110, R110, Tl90, Tr90],
        Layout5_1_4 => &[L30, R30, C, Lfe, L110, R110, Tl45, Tr45, Tl135, Tr135],
        Layout7_1_0 => &[L30, R30, C, Lfe, L90, R90, L135, R135],
        Layout7_1_2 => &[L30, R30, C, Lfe, L90, R90, L135, R135, Tl90, Tr90],
        Layout7_1_4 => &[
            L30, R30, C, Lfe, L90, R90, L135, R135, Tl45, Tr45, Tl135, Tr135,
        ],
        Layout9_1_0 => &[L30, R30, C, Lfe, L60, R60, L90, R90, L135, R135],
        Layout9_1_2 => &[L30, R30, C, Lfe, L60, R60, L90, R90, L135, R135, Tl90, Tr90],
        Layout9_1_4 => &[
            L30, R30, C, Lfe, L60, R60, L90, R90, L135, R135, Tl45, Tr45, Tl135, Tr135,
        ],
        Layout9_1_6 => &[
            L30, R30, C, Lfe, L60, R60, L90, R90, L135, R135, Tl30, Tr30, Tl90, Tr90, Tl150,
            Tr150,
        ],
        _ => return None,
    })
}

/// Returns the input channel configurations of `layout`, in channel
/// order.
pub fn loudspeaker_layout(
    layout: AudioElementType,
) -> Result<Vec<LoudspeakerLayoutInputChannel>, ObrError> {
    let loudspeakers = layout_loudspeakers(layout).ok_or_else(|| {
        ObrError::InvalidConfig(format!("unknown loudspeaker layout: \"{layout}\""))
    })?;
    Ok(loudspeakers
        .iter()
        .map(|loudspeaker| loudspeaker.channel())
        .collect())
}
