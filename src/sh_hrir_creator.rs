//! Loading of spherical harmonic HRIR sets from WAV assets.

use std::borrow::Cow;
use std::io::Cursor;
use std::path::PathBuf;

use log::info;

use crate::audio_buffer::AudioBuffer;
use crate::common::is_valid_ambisonic_channel_count;
use crate::error::ObrError;
use crate::planar_interleaved_conversion::fill_audio_buffer_from_interleaved_i16;
use crate::resampler::Resampler;

/// Provider of HRIR asset bytes, keyed by fixed names of the form
/// `"{order}OA_L"` / `"{order}OA_R"` for orders 1 through 7. The returned
/// bytes are a complete 16 bit PCM RIFF-WAVE file with `(order + 1)^2`
/// channels.
pub trait HrirAssetProvider: Send {
    /// Returns the bytes for `name`, or `None` when the asset does not
    /// exist.
    fn get_file(&self, name: &str) -> Option<Cow<'_, [u8]>>;
}

/// Asset provider resolving `<directory>/<name>.wav` on disk.
pub struct DirectoryAssetProvider {
    directory: PathBuf,
}

impl DirectoryAssetProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl HrirAssetProvider for DirectoryAssetProvider {
    fn get_file(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        let path = self.directory.join(format!("{name}.wav"));
        std::fs::read(path).ok().map(Cow::Owned)
    }
}

/// Decodes a WAV blob into a planar HRIR buffer, resampling to
/// `target_sample_rate_hz` when the asset was recorded at another rate.
pub fn create_sh_hrirs_from_wav(
    wav_data: &[u8],
    target_sample_rate_hz: u32,
    resampler: &mut Resampler,
) -> Result<AudioBuffer, ObrError> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_data))
        .map_err(|e| ObrError::InvalidConfig(format!("failed to parse HRIR WAV: {e}")))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(ObrError::Unsupported(format!(
            "HRIR WAV must be 16 bit PCM, got {} bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let num_channels = spec.channels as usize;
    if !is_valid_ambisonic_channel_count(num_channels) {
        return Err(ObrError::Unsupported(format!(
            "HRIR WAV channel count {num_channels} is not a full periphonic set"
        )));
    }

    let num_frames = reader.duration() as usize;
    if num_frames == 0 {
        return Err(ObrError::InvalidConfig("HRIR WAV holds no samples".to_string()));
    }

    // De-interleave into planar float channels.
    let interleaved = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(|e| ObrError::InvalidConfig(format!("failed to read HRIR WAV: {e}")))?;
    let mut sh_hrirs = AudioBuffer::new(num_channels, num_frames);
    fill_audio_buffer_from_interleaved_i16(&interleaved, num_channels, &mut sh_hrirs);

    let wav_sample_rate_hz = spec.sample_rate;
    if wav_sample_rate_hz == target_sample_rate_hz {
        return Ok(sh_hrirs);
    }

    if !Resampler::are_sample_rates_supported(wav_sample_rate_hz, target_sample_rate_hz) {
        return Err(ObrError::Unsupported(format!(
            "unsupported sampling rates for loading HRIRs: {wav_sample_rate_hz}, {target_sample_rate_hz}"
        )));
    }
    info!(
        "resampling HRIRs from {} Hz to {} Hz",
        wav_sample_rate_hz, target_sample_rate_hz
    );
    resampler.reset_state();
    resampler.set_rate_and_num_channels(wav_sample_rate_hz, target_sample_rate_hz, num_channels);
    let mut resampled =
        AudioBuffer::new(num_channels, resampler.next_output_length(num_frames));
    resampler.process(&sh_hrirs, &mut resampled);
    Ok(resampled)
}

/// Resolves `filename` through the asset provider and decodes it.
pub fn create_sh_hrirs_from_assets(
    provider: &dyn HrirAssetProvider,
    filename: &str,
    target_sample_rate_hz: u32,
    resampler: &mut Resampler,
) -> Result<AudioBuffer, ObrError> {
    let data = provider
        .get_file(filename)
        .ok_or_else(|| ObrError::Missing(filename.to_string()))?;
    create_sh_hrirs_from_wav(&data, target_sample_rate_hz, resampler)
}
