pub const EARTH_RADIUS: f64 = 6371000.0; // unit: meter

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS * c
}

// Perturbed coordinates are stored with 6 decimal places (~0.1m), same as the
// source documents.
pub fn round_coordinate(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use assert_float_eq::assert_float_absolute_eq;

    use crate::utils::{haversine_distance, round_coordinate};

    #[test]
    fn haversine() {
        // downtown Sao Paulo, about 2.76 km apart
        let d = haversine_distance(-23.55052, -46.633308, -23.559616, -46.658466);
        assert_float_absolute_eq!(d, 2756.6056, 0.001);

        assert_eq!(haversine_distance(10.0, 20.0, 10.0, 20.0), 0.0);

        // symmetric
        let fwd = haversine_distance(-23.55052, -46.633308, -23.559616, -46.658466);
        let back = haversine_distance(-23.559616, -46.658466, -23.55052, -46.633308);
        assert_float_absolute_eq!(fwd, back, 1e-9);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_coordinate(-23.550521234), -23.550521);
        assert_eq!(round_coordinate(-23.5505219), -23.550522);
        assert_eq!(round_coordinate(12.5), 12.5);
    }
}
