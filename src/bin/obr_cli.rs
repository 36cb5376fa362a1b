//! Command line binaural renderer: WAV in, binaural WAV out.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use obr::audio_buffer::AudioBuffer;
use obr::audio_element::AudioElementType;
use obr::common::NUM_BINAURAL_CHANNELS;
use obr::error::ObrError;
use obr::planar_interleaved_conversion::{
    fill_audio_buffer_from_interleaved_i16, interleave_audio_buffer_to_i16,
};
use obr::renderer::Renderer;
use obr::sh_hrir_creator::DirectoryAssetProvider;

#[derive(Parser)]
#[command(name = "obr-cli")]
#[command(about = "Renders Ambisonic, channel or object based WAV files to binaural stereo")]
struct Cli {
    /// Declared type of the input file: 3OA, 7OA, 7.1.4 or OBA
    #[arg(long = "input_type")]
    input_type: String,

    /// Textproto file describing the object sources (OBA input only)
    #[arg(long = "oba_metadata_file", default_value = "")]
    oba_metadata_file: String,

    /// Input WAV file (16 bit PCM)
    #[arg(long = "input_file")]
    input_file: PathBuf,

    /// Output WAV file
    #[arg(long = "output_file")]
    output_file: PathBuf,

    /// Frames per channel per processing block
    #[arg(long = "buffer_size", default_value = "256")]
    buffer_size: usize,

    /// Directory holding the SH-HRIR assets (1OA_L.wav ... 7OA_R.wav)
    #[arg(long = "hrir_dir")]
    hrir_dir: PathBuf,
}

/// One object source parsed from the OBA metadata file.
#[derive(Debug, Default, Clone, PartialEq)]
struct ObaSource {
    input_channel: usize,
    azimuth: f32,
    elevation: f32,
    distance: f32,
    gain: f32,
}

/// Parses a textproto list of `source { ... }` blocks with the fields
/// `input_channel`, `azimuth`, `elevation`, `distance` and `gain`.
fn parse_oba_metadata(text: &str) -> Result<Vec<ObaSource>, ObrError> {
    let malformed = |detail: &str| ObrError::InvalidConfig(format!("OBA metadata: {detail}"));

    // Tokenize on whitespace, treating braces and colons as their own
    // tokens so `source{` and `azimuth:30` also parse.
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '{' | '}' | ':' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut sources = Vec::new();
    let mut iter = tokens.iter().peekable();
    while let Some(token) = iter.next() {
        if token != "source" {
            return Err(malformed(&format!("expected \"source\", got \"{token}\"")));
        }
        if iter.next().map(String::as_str) != Some("{") {
            return Err(malformed("expected '{' after \"source\""));
        }
        let mut source = ObaSource {
            distance: 1.0,
            gain: 1.0,
            ..Default::default()
        };
        loop {
            let Some(field) = iter.next() else {
                return Err(malformed("unterminated source block"));
            };
            if field == "}" {
                break;
            }
            if iter.next().map(String::as_str) != Some(":") {
                return Err(malformed(&format!("expected ':' after \"{field}\"")));
            }
            let Some(value) = iter.next() else {
                return Err(malformed(&format!("missing value for \"{field}\"")));
            };
            match field.as_str() {
                "input_channel" => {
                    source.input_channel = value
                        .parse()
                        .map_err(|_| malformed(&format!("bad input_channel \"{value}\"")))?;
                }
                "azimuth" => {
                    source.azimuth = value
                        .parse()
                        .map_err(|_| malformed(&format!("bad azimuth \"{value}\"")))?;
                }
                "elevation" => {
                    source.elevation = value
                        .parse()
                        .map_err(|_| malformed(&format!("bad elevation \"{value}\"")))?;
                }
                "distance" => {
                    source.distance = value
                        .parse()
                        .map_err(|_| malformed(&format!("bad distance \"{value}\"")))?;
                }
                "gain" => {
                    source.gain = value
                        .parse()
                        .map_err(|_| malformed(&format!("bad gain \"{value}\"")))?;
                }
                unknown => {
                    return Err(malformed(&format!("unknown field \"{unknown}\"")));
                }
            }
        }
        sources.push(source);
    }
    Ok(sources)
}

/// Strips `#` comments before tokenizing.
fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_input_type(input_type: &str) -> Result<AudioElementType, ObrError> {
    match input_type {
        "3OA" => Ok(AudioElementType::Ambisonics3),
        "7OA" => Ok(AudioElementType::Ambisonics7),
        "7.1.4" => Ok(AudioElementType::Layout7_1_4),
        "OBA" => Ok(AudioElementType::ObjectMono),
        other => Err(ObrError::InvalidConfig(format!(
            "unknown input type \"{other}\"; expected 3OA, 7OA, 7.1.4 or OBA"
        ))),
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let input_type = parse_input_type(&cli.input_type)?;

    // Parse the metadata file when object input is declared.
    let oba_sources = if input_type.is_object() {
        if cli.oba_metadata_file.is_empty() {
            return Err(ObrError::InvalidConfig("no OBA metadata file specified".to_string()).into());
        }
        info!(
            "Processing OBA input with metadata file: \"{}\".",
            cli.oba_metadata_file
        );
        let text = std::fs::read_to_string(&cli.oba_metadata_file)?;
        parse_oba_metadata(&strip_comments(&text))?
    } else {
        Vec::new()
    };

    let mut reader = hound::WavReader::open(&cli.input_file)?;
    let spec = reader.spec();
    info!("Input WAV header info:");
    info!("  num_channels= {}", spec.channels);
    info!("  sample_rate_hz= {}", spec.sample_rate);
    info!("  bit_depth= {}", spec.bits_per_sample);

    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(ObrError::Unsupported(format!(
            "unsupported number of bits per sample: {}",
            spec.bits_per_sample
        ))
        .into());
    }

    let input_wav_nch = spec.channels as usize;
    let buffer_size = cli.buffer_size;
    info!(
        "Declared input type: {input_type}; processing \"{}\"; {} channels; {} Hz; 16 bit; \
         processing buffer size: {buffer_size} samples.",
        cli.input_file.display(),
        input_wav_nch,
        spec.sample_rate
    );

    let assets = DirectoryAssetProvider::new(&cli.hrir_dir);
    let renderer = Renderer::new(buffer_size, spec.sample_rate, Box::new(assets));

    if input_type.is_object() {
        info!("Providing OBA metadata to the renderer:");
        for source in &oba_sources {
            info!("  WAV file ch (0-indexed): {}", source.input_channel);
            info!("    Azimuth: {}", source.azimuth);
            info!("    Elevation: {}", source.elevation);
            info!("    Distance: {}", source.distance);
            info!("    Gain: {}", source.gain);

            renderer.add_audio_element(input_type)?;
            let current_index = renderer.number_of_audio_elements() - 1;
            renderer.update_object_position(
                current_index,
                source.azimuth,
                source.elevation,
                source.distance,
            )?;
        }
    } else {
        renderer.add_audio_element(input_type)?;
    }

    if input_wav_nch != renderer.number_of_input_channels() {
        return Err(ObrError::InvalidConfig(format!(
            "mismatching number of input channels: ({} vs {})",
            input_wav_nch,
            renderer.number_of_input_channels()
        ))
        .into());
    }

    info!("\n{}", renderer.audio_element_config_log_message());

    let output_spec = hound::WavSpec {
        channels: NUM_BINAURAL_CHANNELS as u16,
        sample_rate: spec.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&cli.output_file, output_spec)?;

    let mut input_buffer = AudioBuffer::new(input_wav_nch, buffer_size);
    let mut output_buffer = AudioBuffer::new(NUM_BINAURAL_CHANNELS, buffer_size);
    let mut interleaved_in = vec![0i16; buffer_size * input_wav_nch];
    let mut interleaved_out = vec![0i16; buffer_size * NUM_BINAURAL_CHANNELS];

    let mut samples = reader.samples::<i16>();
    loop {
        // Read one block of interleaved samples, zero padding the tail.
        let mut samples_read = 0;
        for slot in interleaved_in.iter_mut() {
            match samples.next() {
                Some(sample) => {
                    *slot = sample?;
                    samples_read += 1;
                }
                None => *slot = 0,
            }
        }
        if samples_read == 0 {
            break;
        }

        fill_audio_buffer_from_interleaved_i16(&interleaved_in, input_wav_nch, &mut input_buffer);

        renderer.process(&input_buffer, &mut output_buffer);

        interleave_audio_buffer_to_i16(&output_buffer, &mut interleaved_out);
        for &sample in &interleaved_out {
            writer.write_sample(sample)?;
        }

        if samples_read < interleaved_in.len() {
            break;
        }
    }

    writer.finalize()?;
    info!("Finished rendering file \"{}\".", cli.output_file.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_type() {
        assert_eq!(
            parse_input_type("3OA").unwrap(),
            AudioElementType::Ambisonics3
        );
        assert_eq!(
            parse_input_type("7OA").unwrap(),
            AudioElementType::Ambisonics7
        );
        assert_eq!(
            parse_input_type("7.1.4").unwrap(),
            AudioElementType::Layout7_1_4
        );
        assert_eq!(parse_input_type("OBA").unwrap(), AudioElementType::ObjectMono);
        assert!(parse_input_type("5OA").is_err());
    }

    #[test]
    fn test_parse_oba_metadata() {
        let text = r#"
            source {
              input_channel: 0
              azimuth: -30.0
              elevation: 10.5
              distance: 2.0
              gain: 0.5
            }
            source {
              input_channel: 1
              azimuth: 30.0
            }
        "#;
        let sources = parse_oba_metadata(&strip_comments(text)).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].input_channel, 0);
        assert_eq!(sources[0].azimuth, -30.0);
        assert_eq!(sources[0].elevation, 10.5);
        assert_eq!(sources[0].distance, 2.0);
        assert_eq!(sources[0].gain, 0.5);
        // Unset fields keep their defaults.
        assert_eq!(sources[1].distance, 1.0);
        assert_eq!(sources[1].gain, 1.0);
    }

    #[test]
    fn test_parse_oba_metadata_with_comments_and_tight_syntax() {
        let text = "# leading comment\nsource{input_channel:3 azimuth:90}";
        let sources = parse_oba_metadata(&strip_comments(text)).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].input_channel, 3);
        assert_eq!(sources[0].azimuth, 90.0);
    }

    #[test]
    fn test_parse_oba_metadata_rejects_garbage() {
        assert!(parse_oba_metadata("listener { }").is_err());
        assert!(parse_oba_metadata("source { input_channel }").is_err());
        assert!(parse_oba_metadata("source { input_channel: x }").is_err());
        assert!(parse_oba_metadata("source { input_channel: 1").is_err());
    }
}
