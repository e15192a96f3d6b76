/// Mean Earth radius used by the spherical model (kilometers)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Destination point reached from (`lat`, `lon`) after travelling
/// `distance_km` along the great circle leaving at `azimuth_deg`
/// (clockwise from true north). All angles in degrees.
pub fn project(lat: f64, lon: f64, azimuth_deg: f64, distance_km: f64) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();
    let azimuth_rad = azimuth_deg.to_radians();

    // Angular distance
    let delta = distance_km / EARTH_RADIUS_KM;

    let sin_lat2 = lat_rad.sin() * delta.cos() + lat_rad.cos() * delta.sin() * azimuth_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = azimuth_rad.sin() * delta.sin() * lat_rad.cos();
    let x = delta.cos() - lat_rad.sin() * lat2.sin();
    let lon2 = lon_rad + y.atan2(x);

    (lat2.to_degrees(), lon2.to_degrees())
}

/// Great-circle distance between two points (kilometers), haversine form.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().clamp(-1.0, 1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // Same tolerance as "equal to 7 decimal places"
    const SEVEN_PLACES: f64 = 5e-8;

    #[test]
    fn test_zero_distance_returns_origin() {
        for &(lat, lon, azi) in &[
            (46.59103, 5.46573, 81.0),
            (-53.15056, -1.84444, 20.0),
            (0.0, 0.0, 0.0),
            (89.9, 179.5, 270.0),
        ] {
            let (lat2, lon2) = project(lat, lon, azi, 0.0);
            assert_abs_diff_eq!(lat2, lat, epsilon = 1e-12);
            assert_abs_diff_eq!(lon2, lon, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_project_northern_hemisphere() {
        let (lat, lon) = project(46.59103, 5.46573, 81.0, 2.0);
        assert_abs_diff_eq!(lat, 46.5938408, epsilon = SEVEN_PLACES);
        assert_abs_diff_eq!(lon, 5.49158256, epsilon = SEVEN_PLACES);
    }

    #[test]
    fn test_project_negative_coordinates() {
        let (lat, lon) = project(-53.15056, -1.84444, 20.0, 50.0);
        assert_abs_diff_eq!(lat, -52.7277448, epsilon = SEVEN_PLACES);
        assert_abs_diff_eq!(lon, -1.59049155, epsilon = SEVEN_PLACES);
    }

    #[test]
    fn test_project_due_north_moves_latitude_only() {
        let (lat, lon) = project(10.0, 20.0, 0.0, 111.19492664455873);
        assert_abs_diff_eq!(lat, 11.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lon, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_project_at_pole_stays_finite() {
        let (lat, lon) = project(90.0, 0.0, 180.0, 1.0);
        assert!(lat.is_finite());
        assert!(lon.is_finite());
        assert!(lat < 90.0);
    }

    #[test]
    fn test_distance_round_trip_with_project() {
        let (lat, lon) = project(46.0, 5.0, 135.0, 3.5);
        assert_abs_diff_eq!(distance_km(46.0, 5.0, lat, lon), 3.5, epsilon = 1e-9);
    }
}
