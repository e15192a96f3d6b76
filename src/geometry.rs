use crate::observation::Observation;
use crate::projection::{distance_km, project};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64, // degrees
    pub lon: f64, // degrees
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Bearing line drawn from the observer's fix along the recorded azimuth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BearingRay {
    pub origin: GeoPoint,
    pub end: GeoPoint,
}

impl BearingRay {
    pub fn length_km(&self) -> f64 {
        distance_km(self.origin.lat, self.origin.lon, self.end.lat, self.end.lon)
    }
}

/// The observer's recorded position, if both coordinates parsed
pub fn build_fix(observation: &Observation) -> Option<GeoPoint> {
    let (lat, lon) = observation.position()?;
    Some(GeoPoint::new(lat, lon))
}

/// Bearing ray of `ray_length_km`, if position and azimuth parsed
pub fn build_ray(observation: &Observation, ray_length_km: f64) -> Option<BearingRay> {
    let origin = build_fix(observation)?;
    let azimuth = observation.azimuth.value()?;
    let (lat, lon) = project(origin.lat, origin.lon, azimuth, ray_length_km);

    Some(BearingRay {
        origin,
        end: GeoPoint::new(lat, lon),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{ObservationId, RawRow, DEFAULT_DATETIME_FORMAT};
    use approx::assert_abs_diff_eq;

    fn observation(lat: &str, lon: &str, azi: &str) -> Observation {
        let row = RawRow::new("fox", Some("2020-04-03 10:05:00"), lat, lon, azi);
        Observation::parse(ObservationId(1), &row, DEFAULT_DATETIME_FORMAT)
    }

    #[test]
    fn test_ray_starts_at_fix() {
        let obs = observation("46.59103", "5.46573", "81");
        let fix = build_fix(&obs).unwrap();
        let ray = build_ray(&obs, 2.0).unwrap();

        assert_eq!(ray.origin, fix);
        assert_abs_diff_eq!(ray.end.lat, 46.5938408, epsilon = 5e-8);
        assert_abs_diff_eq!(ray.end.lon, 5.49158256, epsilon = 5e-8);
        assert_abs_diff_eq!(ray.length_km(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_azimuth_keeps_fix_drops_ray() {
        let obs = observation("46.5", "5.4", "east");
        assert!(build_fix(&obs).is_some());
        assert!(build_ray(&obs, 1.0).is_none());
    }

    #[test]
    fn test_invalid_position_drops_everything() {
        let obs = observation("", "5.4", "90");
        assert!(build_fix(&obs).is_none());
        assert!(build_ray(&obs, 1.0).is_none());
    }
}
