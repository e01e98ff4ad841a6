use crate::global_variables::*;

pub fn is_inside_sdf(phi: Float) -> bool {
    phi < 0.0
}

/// Fraction of the segment between two samples that lies inside
/// (negative side of) the level set.
pub fn fraction_inside_sdf(phi0: Float, phi1: Float) -> Float {
    match (is_inside_sdf(phi0), is_inside_sdf(phi1)) {
        (true, true) => 1.0,
        (true, false) => phi0 / (phi0 - phi1),
        (false, true) => phi1 / (phi1 - phi0),
        (false, false) => 0.0,
    }
}

/// Fluid level sets are non-negative inside the liquid and negative in the
/// atmosphere.
pub fn is_inside_fluid(phi: Float) -> bool {
    !is_inside_sdf(phi)
}

pub fn fraction_inside_fluid(phi0: Float, phi1: Float) -> Float {
    1.0 - fraction_inside_sdf(phi0, phi1)
}

/// Area fraction of a unit cell inside the level set, from its corner samples.
pub fn fraction_inside(
    phi_bottom_left: Float,
    phi_bottom_right: Float,
    phi_top_left: Float,
    phi_top_right: Float,
) -> Float {
    // Counter-clockwise from the bottom-left corner.
    let mut corners = [phi_bottom_left, phi_bottom_right, phi_top_right, phi_top_left];
    let inside_count = corners.iter().filter(|&&phi| is_inside_sdf(phi)).count();
    match inside_count {
        0 => 0.0,
        4 => 1.0,
        1 => {
            while !is_inside_sdf(corners[0]) {
                corners.rotate_left(1);
            }
            let side0 = fraction_inside_sdf(corners[0], corners[3]);
            let side1 = fraction_inside_sdf(corners[0], corners[1]);
            0.5 * side0 * side1
        }
        2 => {
            while !is_inside_sdf(corners[0])
                || (!is_inside_sdf(corners[1]) && is_inside_sdf(corners[3]))
            {
                corners.rotate_left(1);
            }
            if is_inside_sdf(corners[1]) {
                let side0 = fraction_inside_sdf(corners[0], corners[3]);
                let side1 = fraction_inside_sdf(corners[1], corners[2]);
                0.5 * (side0 + side1)
            } else {
                // Diagonal pair: the saddle is resolved by the cell average.
                let middle = 0.25 * corners.iter().sum::<Float>();
                if is_inside_sdf(middle) {
                    let mut outside_area = 0.0;
                    let side0 = 1.0 - fraction_inside_sdf(corners[0], corners[3]);
                    let side1 = 1.0 - fraction_inside_sdf(corners[2], corners[3]);
                    outside_area += 0.5 * side0 * side1;
                    let side0 = 1.0 - fraction_inside_sdf(corners[2], corners[1]);
                    let side1 = 1.0 - fraction_inside_sdf(corners[0], corners[1]);
                    outside_area += 0.5 * side0 * side1;
                    1.0 - outside_area
                } else {
                    let mut inside_area = 0.0;
                    let side0 = fraction_inside_sdf(corners[0], corners[1]);
                    let side1 = fraction_inside_sdf(corners[0], corners[3]);
                    inside_area += 0.5 * side0 * side1;
                    let side0 = fraction_inside_sdf(corners[2], corners[1]);
                    let side1 = fraction_inside_sdf(corners[2], corners[3]);
                    inside_area += 0.5 * side0 * side1;
                    inside_area
                }
            }
        }
        _ => {
            while is_inside_sdf(corners[3]) {
                corners.rotate_left(1);
            }
            let side0 = 1.0 - fraction_inside_sdf(corners[2], corners[3]);
            let side1 = 1.0 - fraction_inside_sdf(corners[0], corners[3]);
            1.0 - 0.5 * side0 * side1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_inside_sdf_endpoints() {
        assert_eq!(fraction_inside_sdf(-1.0, -2.0), 1.0);
        assert_eq!(fraction_inside_sdf(1.0, 2.0), 0.0);
        assert!((fraction_inside_sdf(-1.0, 3.0) - 0.25).abs() < 1e-12);
        assert!((fraction_inside_sdf(3.0, -1.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_fraction_inside_fluid_is_complement() {
        assert!(is_inside_fluid(0.0));
        assert_eq!(fraction_inside_fluid(0.5, 1.0), 1.0);
        assert_eq!(fraction_inside_fluid(-0.5, -1.0), 0.0);
        assert!((fraction_inside_fluid(0.25, -0.75) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_fraction_inside_half_plane() {
        // Level set x = 0.5 through a unit cell, inside on the left.
        let area = fraction_inside(-0.5, 0.5, -0.5, 0.5);
        assert!((area - 0.5).abs() < 1e-12, "got {area}");
        let area = fraction_inside(-0.25, 0.75, -0.25, 0.75);
        assert!((area - 0.25).abs() < 1e-12, "got {area}");
    }

    #[test]
    fn test_fraction_inside_corner_and_complement() {
        let corner = fraction_inside(-0.5, 0.5, 0.5, 1.5);
        assert!((corner - 0.125).abs() < 1e-12, "got {corner}");
        let complement = fraction_inside(0.5, -0.5, -0.5, -1.5);
        assert!((complement - 0.875).abs() < 1e-12, "got {complement}");
        assert_eq!(fraction_inside(-1.0, -1.0, -1.0, -1.0), 1.0);
        assert_eq!(fraction_inside(1.0, 1.0, 1.0, 1.0), 0.0);
    }
}
