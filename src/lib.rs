//! An Ambisonic binaural renderer.
//!
//! The renderer accepts immersive audio content in one of three
//! representations — an Ambisonic sound field of order 1 to 7, a
//! channel-based loudspeaker mix (mono through 9.1.6), or point-source
//! audio objects positioned in 3D — and produces a two-channel output mix
//! which reproduces the spatial scene over headphones.
//!
//! All three input representations are unified through an intermediate
//! higher-order Ambisonic mix bed which is convolved with
//! spherical-harmonic-encoded head related impulse responses (SH-HRIRs).
//!
//! # Usage
//!
//! ```no_run
//! use obr::renderer::Renderer;
//! use obr::audio_buffer::AudioBuffer;
//! use obr::audio_element::AudioElementType;
//! use obr::sh_hrir_creator::DirectoryAssetProvider;
//!
//! let assets = DirectoryAssetProvider::new("hrir_assets");
//! let renderer = Renderer::new(256, 48000, Box::new(assets));
//! renderer.add_audio_element(AudioElementType::Ambisonics3).unwrap();
//!
//! let input = AudioBuffer::new(16, 256);
//! let mut output = AudioBuffer::new(2, 256);
//! renderer.process(&input, &mut output);
//! ```
//!
//! The processing pipeline per block is: Ambisonic encoding of
//! channel/object sources, optional sound field rotation for head
//! tracking, partitioned FFT convolution against the left/right SH-HRIR
//! filter banks, and a release-only peak limiter on the stereo output.

pub mod ambisonic_binaural_decoder;
pub mod ambisonic_encoder;
pub mod ambisonic_rotator;
pub mod audio_buffer;
pub mod audio_element;
pub mod common;
pub mod error;
pub mod fft_manager;
pub mod loudspeaker_layouts;
pub mod partitioned_fft_filter;
pub mod peak_limiter;
pub mod planar_interleaved_conversion;
pub mod renderer;
pub mod resampler;
pub mod sh_hrir_creator;

mod alp_generator;

pub use crate::audio_buffer::AudioBuffer;
pub use crate::audio_element::AudioElementType;
pub use crate::error::ObrError;
pub use crate::renderer::Renderer;
pub use crate::sh_hrir_creator::HrirAssetProvider;
