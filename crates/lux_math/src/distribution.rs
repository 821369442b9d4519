/// Discrete 1-D distribution over weighted entries.
///
/// Stores the running CDF; sampling maps a uniform number to an entry index
/// by binary search.
#[derive(Debug, Clone)]
pub struct DiscreteDistribution1D {
    cdf: Vec<f32>,
}

impl DiscreteDistribution1D {
    pub fn new() -> Self {
        Self { cdf: vec![0.0] }
    }

    /// Append an entry with the given non-negative weight.
    pub fn add(&mut self, v: f32) {
        debug_assert!(v >= 0.0);
        let last = *self.cdf.last().unwrap();
        self.cdf.push(last + v);
    }

    /// Normalize so the total mass is one. No-op on zero total mass.
    pub fn normalize(&mut self) {
        let sum = *self.cdf.last().unwrap();
        if sum > 0.0 {
            let inv = 1.0 / sum;
            for v in &mut self.cdf {
                *v *= inv;
            }
        }
    }

    /// Sample an entry index from a uniform number in [0, 1).
    pub fn sample(&self, u: f32) -> usize {
        let i = self.cdf.partition_point(|&c| c <= u);
        i.clamp(1, self.cdf.len() - 1) - 1
    }

    /// Sample an entry and remap the uniform number to [0, 1) within the
    /// chosen entry, so the same draw can drive a follow-up decision.
    pub fn sample_remap(&self, u: f32) -> (usize, f32) {
        let i = self.sample(u);
        let p = self.pdf(i);
        let remapped = if p > 0.0 {
            ((u - self.cdf[i]) / p).clamp(0.0, 1.0 - f32::EPSILON)
        } else {
            0.0
        };
        (i, remapped)
    }

    /// Probability mass of entry `i` (after normalization).
    pub fn pdf(&self, i: usize) -> f32 {
        if i + 1 >= self.cdf.len() {
            0.0
        } else {
            self.cdf[i + 1] - self.cdf[i]
        }
    }

    pub fn len(&self) -> usize {
        self.cdf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.cdf.len() == 1
    }

    pub fn clear(&mut self) {
        self.cdf.clear();
        self.cdf.push(0.0);
    }
}

impl Default for DiscreteDistribution1D {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let mut d = DiscreteDistribution1D::new();
        d.add(1.0);
        d.add(3.0);
        d.normalize();
        assert!((d.pdf(0) - 0.25).abs() < 1e-6);
        assert!((d.pdf(1) - 0.75).abs() < 1e-6);
        let total: f32 = (0..d.len()).map(|i| d.pdf(i)).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_matches_pdf() {
        let mut d = DiscreteDistribution1D::new();
        d.add(2.0);
        d.add(1.0);
        d.add(1.0);
        d.normalize();
        assert_eq!(d.sample(0.0), 0);
        assert_eq!(d.sample(0.49), 0);
        assert_eq!(d.sample(0.51), 1);
        assert_eq!(d.sample(0.76), 2);
        assert_eq!(d.sample(0.999), 2);
    }

    #[test]
    fn test_sample_remap_uniform() {
        let mut d = DiscreteDistribution1D::new();
        d.add(1.0);
        d.add(1.0);
        d.normalize();
        // u = 0.75 falls in the middle of the second entry
        let (i, u) = d.sample_remap(0.75);
        assert_eq!(i, 1);
        assert!((u - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_weight_entry_is_never_sampled() {
        let mut d = DiscreteDistribution1D::new();
        d.add(1.0);
        d.add(0.0);
        d.add(1.0);
        d.normalize();
        for k in 0..100 {
            let u = k as f32 / 100.0;
            assert_ne!(d.sample(u), 1);
        }
    }
}
