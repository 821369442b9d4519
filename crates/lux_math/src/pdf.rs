/// Measure a probability density is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measure {
    /// No associated measure (unset or invalid evaluation).
    #[default]
    None,
    SolidAngle,
    /// Solid angle multiplied by |cos theta| w.r.t. the shading normal.
    ///
    /// At degenerate (point-emitter) geometry there is no normal to project
    /// onto; by convention directional densities there carry this tag with
    /// the plain solid-angle value.
    ProjectedSolidAngle,
    Area,
    Discrete,
}

/// A probability density value tagged with its measure.
///
/// Products and sums of densities are only meaningful when the measures
/// agree or the conversion (e.g. the geometry term) is explicit, so the tag
/// travels with the value and is checked at combination sites.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PdfEval {
    pub v: f32,
    pub measure: Measure,
}

impl PdfEval {
    pub fn new(v: f32, measure: Measure) -> Self {
        Self { v, measure }
    }

    /// A zero density in the given measure.
    pub fn zero(measure: Measure) -> Self {
        Self { v: 0.0, measure }
    }

    pub fn is_zero(&self) -> bool {
        self.v == 0.0
    }

    /// Product of two densities in the same measure.
    pub fn mul(self, other: PdfEval) -> PdfEval {
        debug_assert_eq!(self.measure, other.measure);
        PdfEval::new(self.v * other.v, self.measure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_none() {
        let p = PdfEval::default();
        assert_eq!(p.measure, Measure::None);
        assert!(p.is_zero());
    }

    #[test]
    fn test_mul_same_measure() {
        let a = PdfEval::new(0.5, Measure::Discrete);
        let b = PdfEval::new(0.25, Measure::Discrete);
        let c = a.mul(b);
        assert_eq!(c.v, 0.125);
        assert_eq!(c.measure, Measure::Discrete);
    }
}
