//! Encoding of point sources into a higher order Ambisonic sound field.

use std::collections::HashMap;

use crate::alp_generator::AssociatedLegendrePolynomialsGenerator;
use crate::audio_buffer::AudioBuffer;
use crate::common::{acn_sequence, num_periphonic_channels, NEGATIVE_120_DB_IN_AMPLITUDE};

/// Factorials up to 14, enough for degree and order up to 7.
const FACTORIALS: [f64; 15] = [
    1.0,
    1.0,
    2.0,
    6.0,
    24.0,
    120.0,
    720.0,
    5040.0,
    40320.0,
    362880.0,
    3628800.0,
    39916800.0,
    479001600.0,
    6227020800.0,
    87178291200.0,
];

/// SN3D normalization factor for spherical harmonic `(degree, order)`.
fn sn3d_normalization(degree: i32, order: i32) -> f32 {
    debug_assert!(degree >= 0);
    debug_assert!(order.abs() <= degree);
    let m = order.unsigned_abs() as usize;
    let l = degree as usize;
    let two_minus_delta: f64 = if order == 0 { 1.0 } else { 2.0 };
    (two_minus_delta * FACTORIALS[l - m] / FACTORIALS[l + m]).sqrt() as f32
}

#[derive(Clone, Copy, PartialEq)]
struct Source {
    gain: f32,
    azimuth: f32,
    elevation: f32,
    distance: f32,
}

/// Encodes a set of mono input channels into an Ambisonic sound field of
/// a fixed order by way of an `(order + 1)^2 x num_inputs` encoding
/// matrix.
///
/// Source updates with unchanged parameters are no-ops, keeping the
/// block-rate overhead of repeated position updates bounded.
pub struct AmbisonicEncoder {
    number_of_input_channels: usize,
    number_of_output_channels: usize,
    ambisonic_order: usize,
    alp_generator: AssociatedLegendrePolynomialsGenerator,
    /// Row-major matrix; row = ACN channel, column = input channel.
    encoding_matrix: Vec<f32>,
    /// Cache of the last set source parameters, keyed by input channel.
    sources: HashMap<usize, Source>,
}

impl AmbisonicEncoder {
    pub fn new(number_of_input_channels: usize, ambisonic_order: usize) -> Self {
        assert!(number_of_input_channels > 0);
        assert!(ambisonic_order > 0);
        let number_of_output_channels = num_periphonic_channels(ambisonic_order);
        Self {
            number_of_input_channels,
            number_of_output_channels,
            ambisonic_order,
            alp_generator: AssociatedLegendrePolynomialsGenerator::new(ambisonic_order),
            encoding_matrix: vec![0.0; number_of_output_channels * number_of_input_channels],
            sources: HashMap::new(),
        }
    }

    pub fn num_input_channels(&self) -> usize {
        self.number_of_input_channels
    }

    pub fn num_output_channels(&self) -> usize {
        self.number_of_output_channels
    }

    /// Places the source feeding `input_channel` at the given direction.
    /// `azimuth` and `elevation` are in degrees; the distance attenuation
    /// clamps below half a meter. A source whose overall gain falls below
    /// -120 dBFS is muted outright.
    pub fn set_source(
        &mut self,
        input_channel: usize,
        gain: f32,
        azimuth: f32,
        elevation: f32,
        distance: f32,
    ) {
        assert!(input_channel < self.number_of_input_channels);

        let source = Source {
            gain,
            azimuth,
            elevation,
            distance,
        };
        if self.sources.get(&input_channel) == Some(&source) {
            return;
        }
        self.sources.insert(input_channel, source);

        let overall_gain = gain / distance.max(0.5);
        if overall_gain < NEGATIVE_120_DB_IN_AMPLITUDE {
            self.zero_column(input_channel);
            return;
        }

        let mut sh_coeffs = vec![0.0; self.number_of_output_channels];
        self.sh_coeffs(azimuth, elevation, &mut sh_coeffs);
        for (row, coeff) in sh_coeffs.iter().enumerate() {
            self.encoding_matrix[row * self.number_of_input_channels + input_channel] =
                coeff * overall_gain;
        }
    }

    /// Removes the source from `input_channel` and mutes its column.
    pub fn remove_source(&mut self, input_channel: usize) {
        self.sources.remove(&input_channel);
        self.zero_column(input_channel);
    }

    /// Applies the encoding matrix to a block of planar audio:
    /// `output = E * input`, rows being ACN channels and columns frames.
    pub fn process(&self, input_buffer: &AudioBuffer, output_buffer: &mut AudioBuffer) {
        assert_eq!(self.number_of_input_channels, input_buffer.num_channels());
        assert_eq!(self.number_of_output_channels, output_buffer.num_channels());
        assert_eq!(input_buffer.num_frames(), output_buffer.num_frames());

        for row in 0..self.number_of_output_channels {
            let coeffs =
                &self.encoding_matrix[row * self.number_of_input_channels..][..self.number_of_input_channels];
            let output = output_buffer.channel_mut(row);
            output.fill(0.0);
            for (column, &coeff) in coeffs.iter().enumerate() {
                if coeff == 0.0 {
                    continue;
                }
                for (out, sample) in output.iter_mut().zip(input_buffer.channel(column)) {
                    *out += coeff * sample;
                }
            }
        }
    }

    /// Writes the SN3D normalized real spherical harmonics for the given
    /// direction into `coeffs`, in ACN order.
    pub fn sh_coeffs(&self, azimuth: f32, elevation: f32, coeffs: &mut [f32]) {
        assert_eq!(coeffs.len(), self.number_of_output_channels);
        let azimuth_rad = azimuth.to_radians();
        let elevation_rad = elevation.to_radians();

        let alp_values = self.alp_generator.generate(elevation_rad.sin());
        for degree in 0..=self.ambisonic_order as i32 {
            for order in -degree..=degree {
                let Some(row) = acn_sequence(degree, order) else {
                    continue;
                };
                let last_term = if order >= 0 {
                    (order as f32 * azimuth_rad).cos()
                } else {
                    (-order as f32 * azimuth_rad).sin()
                };
                coeffs[row] = sn3d_normalization(degree, order)
                    * alp_values
                        [self.alp_generator.index(degree as usize, order.unsigned_abs() as usize)]
                    * last_term;
            }
        }
    }

    fn zero_column(&mut self, input_channel: usize) {
        for row in 0..self.number_of_output_channels {
            self.encoding_matrix[row * self.number_of_input_channels + input_channel] = 0.0;
        }
    }
}
