//! Sound field rotation in the spherical harmonics domain.

use glam::{Mat3, Quat};

use crate::audio_buffer::AudioBuffer;
use crate::common::{num_periphonic_channels, SLERP_FRAME_INTERVAL};

/// Angular distance below which two rotations are treated as equal.
/// Avoids rebuilding the rotation matrices at block rate for jittery but
/// effectively stationary head poses.
const ROTATION_QUANTIZATION_RAD: f32 = 1.0 * std::f32::consts::PI / 180.0;

/// ACN channel ordering puts the first degree harmonics in the order
/// (Y, Z, X); this permutation reads those axes out of a 3x3 rotation
/// matrix in the spherical harmonics frame.
const FIRST_DEGREE_AXIS_PERMUTATION: [usize; 3] = [1, 2, 0];

fn kronecker_delta(a: i32, b: i32) -> f32 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

/// Reads an element of a `(2 * degree + 1)` square band matrix using
/// indices centered on zero, i.e. `row, col` in `[-degree, degree]`.
fn centered_element(band: &[f32], degree: i32, row: i32, col: i32) -> f32 {
    debug_assert!(row.abs() <= degree && col.abs() <= degree);
    let dim = (2 * degree + 1) as usize;
    band[(row + degree) as usize * dim + (col + degree) as usize]
}

/// The `P` kernel of the Ivanic-Ruedenberg recurrence: combines the first
/// degree rotation with the band of the previous degree. `rotations[k]`
/// holds the band matrix of degree `k + 1`.
fn p(i: i32, a: i32, b: i32, degree: i32, rotations: &[Vec<f32>]) -> f32 {
    let first = &rotations[0];
    let previous = &rotations[(degree - 2) as usize];
    let prev_degree = degree - 1;
    if b == degree {
        centered_element(first, 1, i, 1) * centered_element(previous, prev_degree, a, degree - 1)
            - centered_element(first, 1, i, -1)
                * centered_element(previous, prev_degree, a, -degree + 1)
    } else if b == -degree {
        centered_element(first, 1, i, 1) * centered_element(previous, prev_degree, a, -degree + 1)
            + centered_element(first, 1, i, -1)
                * centered_element(previous, prev_degree, a, degree - 1)
    } else {
        centered_element(first, 1, i, 0) * centered_element(previous, prev_degree, a, b)
    }
}

fn u_term(m: i32, n: i32, degree: i32, rotations: &[Vec<f32>]) -> f32 {
    p(0, m, n, degree, rotations)
}

fn v_term(m: i32, n: i32, degree: i32, rotations: &[Vec<f32>]) -> f32 {
    if m == 0 {
        p(1, 1, n, degree, rotations) + p(-1, -1, n, degree, rotations)
    } else if m > 0 {
        let d = kronecker_delta(m, 1);
        p(1, m - 1, n, degree, rotations) * (1.0 + d).sqrt()
            - p(-1, -m + 1, n, degree, rotations) * (1.0 - d)
    } else {
        let d = kronecker_delta(m, -1);
        p(1, m + 1, n, degree, rotations) * (1.0 - d)
            + p(-1, -m - 1, n, degree, rotations) * (1.0 + d).sqrt()
    }
}

fn w_term(m: i32, n: i32, degree: i32, rotations: &[Vec<f32>]) -> f32 {
    debug_assert_ne!(m, 0);
    if m > 0 {
        p(1, m + 1, n, degree, rotations) + p(-1, -m - 1, n, degree, rotations)
    } else {
        p(1, m - 1, n, degree, rotations) - p(-1, -m + 1, n, degree, rotations)
    }
}

fn compute_uvw_coeffs(m: i32, n: i32, degree: i32) -> (f32, f32, f32) {
    let d = kronecker_delta(m, 0);
    let denom = if n.abs() == degree {
        (2 * degree * (2 * degree - 1)) as f32
    } else {
        ((degree + n) * (degree - n)) as f32
    };
    let one_over_denom = 1.0 / denom;
    let u = (((degree + m) * (degree - m)) as f32 * one_over_denom).sqrt();
    let v = 0.5
        * ((1.0 + d)
            * ((degree + m.abs() - 1) * (degree + m.abs())) as f32
            * one_over_denom)
            .sqrt()
        * (1.0 - 2.0 * d);
    let w = -0.5
        * (((degree - m.abs() - 1) * (degree - m.abs())) as f32 * one_over_denom).sqrt()
        * (1.0 - d);
    (u, v, w)
}

/// Computes the band rotation matrix of `degree` from the already
/// available lower degree bands.
fn compute_band_rotation(degree: i32, rotations: &[Vec<f32>]) -> Vec<f32> {
    let dim = (2 * degree + 1) as usize;
    let mut band = vec![0.0f32; dim * dim];
    for m in -degree..=degree {
        for n in -degree..=degree {
            let (mut u, mut v, mut w) = compute_uvw_coeffs(m, n, degree);
            if u != 0.0 {
                u *= u_term(m, n, degree, rotations);
            }
            if v != 0.0 {
                v *= v_term(m, n, degree, rotations);
            }
            if w != 0.0 {
                w *= w_term(m, n, degree, rotations);
            }
            band[(m + degree) as usize * dim + (n + degree) as usize] = u + v + w;
        }
    }
    band
}

/// Rotates a higher order Ambisonic sound field by a quaternion.
///
/// The full `(order + 1)^2` square rotation matrix is block diagonal per
/// degree: a unit entry for degree zero, a permuted 3x3 rotation for
/// degree one, and higher degrees derived recursively from the band
/// below (Ivanic-Ruedenberg). To avoid audible stepping, rotation changes
/// are spread across the block by slerping in sub-windows of
/// [`SLERP_FRAME_INTERVAL`] frames.
pub struct AmbisonicRotator {
    ambisonic_order: usize,
    /// Band matrices of degree `k + 1` at index `k`, row-major,
    /// `(2 * degree + 1)` square.
    rotation_matrices: Vec<Vec<f32>>,
    /// Rotation whose matrices are currently cached; also the slerp
    /// starting point for the next rotation change.
    last_rotation: Quat,
    /// Sub-window workspace, `(2 * order + 1)` rows of
    /// `SLERP_FRAME_INTERVAL` samples.
    scratch: Vec<f32>,
}

impl AmbisonicRotator {
    pub fn new(ambisonic_order: usize) -> Self {
        assert!(ambisonic_order > 0);
        let mut rotator = Self {
            ambisonic_order,
            rotation_matrices: Vec::with_capacity(ambisonic_order),
            last_rotation: Quat::IDENTITY,
            scratch: vec![0.0; (2 * ambisonic_order + 1) * SLERP_FRAME_INTERVAL],
        };
        rotator.update_rotation_matrix(Quat::IDENTITY);
        rotator
    }

    /// Forgets the interpolation history and caches `target` as the
    /// applied rotation, so the next `process` call applies it without a
    /// slerp ramp. Used when head tracking is re-enabled after a pause.
    pub fn reset(&mut self, target: Quat) {
        let target = target.normalize();
        self.update_rotation_matrix(target);
        self.last_rotation = target;
    }

    /// Rotates `buffer` in place toward `target_rotation`.
    ///
    /// Returns `false` without touching the buffer when the target is
    /// within the quantization threshold of identity. When the target
    /// matches the previously applied rotation, the cached matrices are
    /// reapplied unchanged, which keeps repeated calls bit stable.
    pub fn process(&mut self, target_rotation: Quat, buffer: &mut AudioBuffer) -> bool {
        assert_eq!(
            buffer.num_channels(),
            num_periphonic_channels(self.ambisonic_order)
        );
        let num_frames = buffer.num_frames();
        let target = target_rotation.normalize();

        if target.angle_between(Quat::IDENTITY) < ROTATION_QUANTIZATION_RAD {
            return false;
        }

        if target.angle_between(self.last_rotation) < ROTATION_QUANTIZATION_RAD {
            self.apply_rotation(buffer, 0, num_frames);
            return true;
        }

        if num_frames < SLERP_FRAME_INTERVAL {
            // Too short to interpolate; jump to the target.
            self.update_rotation_matrix(target);
            self.apply_rotation(buffer, 0, num_frames);
        } else {
            let num_subwindows = num_frames.div_ceil(SLERP_FRAME_INTERVAL);
            let start = self.last_rotation;
            for subwindow in 0..num_subwindows {
                let t = (subwindow + 1) as f32 / num_subwindows as f32;
                self.update_rotation_matrix(start.slerp(target, t));
                let begin = subwindow * SLERP_FRAME_INTERVAL;
                let end = (begin + SLERP_FRAME_INTERVAL).min(num_frames);
                self.apply_rotation(buffer, begin, end);
            }
        }
        self.last_rotation = target;
        true
    }

    /// Rebuilds all band matrices for `rotation`.
    fn update_rotation_matrix(&mut self, rotation: Quat) {
        // Express the world rotation in the spherical harmonics frame:
        // sh_x = -z, sh_y = -x, sh_z = y.
        let sh_rotation = Quat::from_xyzw(-rotation.z, -rotation.x, rotation.y, rotation.w);
        let columns = Mat3::from_quat(sh_rotation.normalize()).to_cols_array_2d();

        let mut first_degree = vec![0.0f32; 9];
        for (i, row_axis) in FIRST_DEGREE_AXIS_PERMUTATION.iter().enumerate() {
            for (j, col_axis) in FIRST_DEGREE_AXIS_PERMUTATION.iter().enumerate() {
                first_degree[i * 3 + j] = columns[*col_axis][*row_axis];
            }
        }

        self.rotation_matrices.clear();
        self.rotation_matrices.push(first_degree);
        for degree in 2..=self.ambisonic_order {
            let band = compute_band_rotation(degree as i32, &self.rotation_matrices);
            self.rotation_matrices.push(band);
        }
    }

    /// Applies the cached band matrices to `buffer[.., begin..end]` in
    /// place, chunking internally so the scratch never overflows.
    fn apply_rotation(&mut self, buffer: &mut AudioBuffer, begin: usize, end: usize) {
        let Self {
            ambisonic_order,
            rotation_matrices,
            scratch,
            ..
        } = self;

        let mut chunk_begin = begin;
        while chunk_begin < end {
            let chunk_end = (chunk_begin + SLERP_FRAME_INTERVAL).min(end);
            let window = chunk_end - chunk_begin;

            for degree in 1..=*ambisonic_order {
                let dim = 2 * degree + 1;
                let base_channel = degree * degree;
                let band = &rotation_matrices[degree - 1];

                for n in 0..dim {
                    scratch[n * SLERP_FRAME_INTERVAL..][..window]
                        .copy_from_slice(&buffer.channel(base_channel + n)[chunk_begin..chunk_end]);
                }
                for m in 0..dim {
                    let row = &band[m * dim..][..dim];
                    let output = &mut buffer.channel_mut(base_channel + m)[chunk_begin..chunk_end];
                    output.fill(0.0);
                    for (n, &coeff) in row.iter().enumerate() {
                        if coeff == 0.0 {
                            continue;
                        }
                        let input = &scratch[n * SLERP_FRAME_INTERVAL..][..window];
                        for (out, sample) in output.iter_mut().zip(input) {
                            *out += coeff * sample;
                        }
                    }
                }
            }
            chunk_begin = chunk_end;
        }
    }
}
