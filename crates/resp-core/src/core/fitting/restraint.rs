#[inline]
pub fn hyperbolic_penalty(charge: f64, height: f64, slope: f64) -> f64 {
    if height == 0.0 {
        return 0.0;
    }
    height * ((charge * charge + slope * slope).sqrt() - slope)
}

#[inline]
pub fn restraint_weight(charge: f64, height: f64, slope: f64) -> f64 {
    if height == 0.0 {
        return 0.0;
    }
    height / (charge * charge + slope * slope).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn penalty_vanishes_at_zero_charge() {
        assert!(f64_approx_equal(hyperbolic_penalty(0.0, 0.0005, 0.1), 0.0));
    }

    #[test]
    fn penalty_is_symmetric_in_the_charge_sign() {
        let plus = hyperbolic_penalty(0.37, 0.0005, 0.1);
        let minus = hyperbolic_penalty(-0.37, 0.0005, 0.1);
        assert!(f64_approx_equal(plus, minus));
    }

    #[test]
    fn penalty_grows_monotonically_with_charge_magnitude() {
        let small = hyperbolic_penalty(0.1, 0.0005, 0.1);
        let large = hyperbolic_penalty(0.5, 0.0005, 0.1);
        assert!(large > small);
    }

    #[test]
    fn penalty_approaches_linear_for_large_charges() {
        // For |q| >> b the penalty tends to a * (|q| - b).
        let q = 50.0;
        let penalty = hyperbolic_penalty(q, 0.0005, 0.1);
        let linear = 0.0005 * (q - 0.1);
        assert!((penalty - linear).abs() < 1e-6);
    }

    #[test]
    fn weight_is_the_penalty_linearization() {
        // a / sqrt(q^2 + b^2) evaluated by hand at q = 0.3, b = 0.1.
        let expected = 0.0005 / (0.3f64 * 0.3 + 0.1 * 0.1).sqrt();
        assert!(f64_approx_equal(restraint_weight(0.3, 0.0005, 0.1), expected));
    }

    #[test]
    fn weight_decreases_as_charge_grows() {
        let at_zero = restraint_weight(0.0, 0.0005, 0.1);
        let at_half = restraint_weight(0.5, 0.0005, 0.1);
        assert!(at_zero > at_half);
        assert!(f64_approx_equal(at_zero, 0.0005 / 0.1));
    }

    #[test]
    fn zero_height_disables_both_terms() {
        assert!(f64_approx_equal(hyperbolic_penalty(0.4, 0.0, 0.0), 0.0));
        assert!(f64_approx_equal(restraint_weight(0.4, 0.0, 0.0), 0.0));
    }
}
