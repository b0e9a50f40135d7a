//! Physical constants and unit conversions used throughout the crate.
//!
//! All lengths inside the numerical core are in astronomical units (AU).
//! Planetary radii arrive in Earth radii and are converted with
//! [`EARTH_RADIUS_AU`]; working angles arrive in arcseconds.

/// Astronomical units per parsec.  An angle of one arcsecond at a distance
/// of one parsec subtends one AU, so `a [AU] / d [pc]` is an angle in
/// arcseconds.
pub const AU_PER_PARSEC: f64 = 206_264.806_247_096_36;

/// Nominal equatorial Earth radius (6 378 100 m) in AU.
pub const EARTH_RADIUS_AU: f64 = 6_378_100.0 / 149_597_870_700.0;

/// Radians per arcsecond.
pub const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Smallest planetary radius (Earth radii) the albedo/radius relations are
/// valid for.  Smaller population minima are raised to this value.
pub const MIN_EXTRAPOLATION_RADIUS: f64 = 0.35;

/// Largest planetary radius (Earth radii) the albedo/radius relations are
/// valid for.  Larger population maxima are lowered to this value.
pub const MAX_EXTRAPOLATION_RADIUS: f64 = 45.0;

/// Convert a length in Earth radii to AU.
#[inline]
pub fn earth_radii_to_au(r: f64) -> f64 {
    r * EARTH_RADIUS_AU
}

/// Convert a length in AU to Earth radii.
#[inline]
pub fn au_to_earth_radii(r: f64) -> f64 {
    r / EARTH_RADIUS_AU
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn earth_radius_round_trip() {
        assert_relative_eq!(au_to_earth_radii(earth_radii_to_au(11.2)), 11.2, epsilon = 1e-12);
        assert_relative_eq!(EARTH_RADIUS_AU, 4.263_496_512_454_037e-5, max_relative = 1e-12);
    }

    #[test]
    fn arcsec_at_one_parsec_is_one_au() {
        let s = (1.0 * ARCSEC_TO_RAD).tan() * AU_PER_PARSEC;
        assert_relative_eq!(s, 1.0, max_relative = 1e-9);
    }
}
