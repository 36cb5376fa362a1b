//! Associated Legendre polynomial generation for spherical harmonics.

/// Generates associated Legendre polynomials (ALPs) by stable recurrence,
/// without the Condon-Shortley phase, for all degrees up to a maximum and
/// all non-negative orders.
pub struct AssociatedLegendrePolynomialsGenerator {
    max_degree: usize,
}

impl AssociatedLegendrePolynomialsGenerator {
    /// Constructs a generator producing polynomials up to `max_degree`.
    pub fn new(max_degree: usize) -> Self {
        Self { max_degree }
    }

    /// Returns the number of polynomials this generator produces.
    pub fn num_values(&self) -> usize {
        (self.max_degree + 1) * (self.max_degree + 2) / 2
    }

    /// Returns the index into the generated sequence for `(degree, order)`.
    pub fn index(&self, degree: usize, order: usize) -> usize {
        debug_assert!(degree <= self.max_degree);
        debug_assert!(order <= degree);
        degree * (degree + 1) / 2 + order
    }

    /// Generates the sequence of `P_l^m(x)` for `0 <= l <= max_degree`,
    /// `0 <= m <= l`, flat indexed by [`Self::index`].
    ///
    /// Recurrences used, in this sequence:
    /// `P_0^0 = 1`,
    /// `P_l^l = (2l - 1) sqrt(1 - x^2) P_{l-1}^{l-1}`,
    /// `P_l^{l-1} = (2l - 1) x P_{l-1}^{l-1}`,
    /// `P_l^m = ((2l - 1) x P_{l-1}^m - (l + m - 1) P_{l-2}^m) / (l - m)`.
    pub fn generate(&self, x: f32) -> Vec<f32> {
        let mut values = vec![0.0f32; self.num_values()];
        values[self.index(0, 0)] = 1.0;
        if self.max_degree == 0 {
            return values;
        }

        let sqrt_one_minus_x2 = (1.0 - x * x).max(0.0).sqrt();
        for degree in 1..=self.max_degree {
            let l = degree as f32;
            // Diagonal term.
            values[self.index(degree, degree)] =
                (2.0 * l - 1.0) * sqrt_one_minus_x2 * values[self.index(degree - 1, degree - 1)];
            // First sub-diagonal term.
            values[self.index(degree, degree - 1)] =
                (2.0 * l - 1.0) * x * values[self.index(degree - 1, degree - 1)];
            // Remaining orders from the two-term recurrence.
            for order in 0..degree.saturating_sub(1) {
                let m = order as f32;
                values[self.index(degree, order)] = ((2.0 * l - 1.0) * x
                    * values[self.index(degree - 1, order)]
                    - (l + m - 1.0) * values[self.index(degree - 2, order)])
                    / (l - m);
            }
        }
        values
    }
}
