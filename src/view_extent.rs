use crate::engine::Engine;
use crate::geometry::GeoPoint;

/// Axis-aligned map rectangle in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Extent {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn from_point(point: GeoPoint) -> Self {
        Self::new(point.lon, point.lat, point.lon, point.lat)
    }

    pub fn include(&mut self, point: GeoPoint) {
        self.min_lon = self.min_lon.min(point.lon);
        self.min_lat = self.min_lat.min(point.lat);
        self.max_lon = self.max_lon.max(point.lon);
        self.max_lat = self.max_lat.max(point.lat);
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Whether `other` lies inside this extent, edges included, allowing
    /// `tolerance` degrees of slack on every side.
    pub fn contains(&self, other: &Extent, tolerance: f64) -> bool {
        other.min_lon >= self.min_lon - tolerance
            && other.min_lat >= self.min_lat - tolerance
            && other.max_lon <= self.max_lon + tolerance
            && other.max_lat <= self.max_lat + tolerance
    }

    /// Grow by `ratio` of the size on every side; degenerate extents get
    /// at least `min_margin` degrees.
    pub fn padded(&self, ratio: f64, min_margin: f64) -> Self {
        let dx = (self.width() * ratio).max(min_margin);
        let dy = (self.height() * ratio).max(min_margin);
        Self::new(
            self.min_lon - dx,
            self.min_lat - dy,
            self.max_lon + dx,
            self.max_lat + dy,
        )
    }

    pub fn translated(&self, d_lon: f64, d_lat: f64) -> Self {
        Self::new(
            self.min_lon + d_lon,
            self.min_lat + d_lat,
            self.max_lon + d_lon,
            self.max_lat + d_lat,
        )
    }

    /// Scale around the center; `factor` < 1 zooms in
    pub fn scaled(&self, factor: f64) -> Self {
        let c = self.center();
        let half_w = self.width() * factor / 2.0;
        let half_h = self.height() * factor / 2.0;
        Self::new(c.lon - half_w, c.lat - half_h, c.lon + half_w, c.lat + half_h)
    }
}

/// The map widget the controller drives
pub trait Viewport {
    fn extent(&self) -> Extent;

    /// Request `target`; the viewport may snap or clamp it
    fn zoom_to(&mut self, target: Extent);
}

/// Decides whether the map may be re-zoomed automatically.
///
/// Once the user has panned or zoomed by hand, the current extent no longer
/// matches the one this controller applied, and automatic zooming stops
/// until it is explicitly re-applied.
#[derive(Debug, Clone, Default)]
pub struct ViewExtentController {
    last_applied: Option<Extent>,
    tolerance: f64,
}

impl ViewExtentController {
    pub fn new(tolerance: f64) -> Self {
        Self {
            last_applied: None,
            tolerance,
        }
    }

    pub fn last_applied(&self) -> Option<Extent> {
        self.last_applied
    }

    pub fn should_autofollow(&self, current: &Extent) -> bool {
        match &self.last_applied {
            None => true,
            Some(applied) => {
                current.contains(applied, self.tolerance)
                    && applied.contains(current, self.tolerance)
            }
        }
    }

    /// Remember the extent the viewport settled on after an automatic zoom
    pub fn record_applied(&mut self, post_adjustment: Extent) {
        self.last_applied = Some(post_adjustment);
    }

    /// Zoom `viewport` to `target` unless the user moved it since the last
    /// automatic zoom. Returns whether it zoomed.
    pub fn auto_follow<V: Viewport>(&mut self, viewport: &mut V, target: Extent) -> bool {
        if !self.should_autofollow(&viewport.extent()) {
            return false;
        }
        self.force_follow(viewport, target);
        true
    }

    /// Zoom regardless of manual moves, and resume following
    pub fn force_follow<V: Viewport>(&mut self, viewport: &mut V, target: Extent) {
        viewport.zoom_to(target);
        self.record_applied(viewport.extent());
    }

    pub fn reset(&mut self) {
        self.last_applied = None;
    }
}

/// Bounding box of the visible fixes and ray ends
pub fn visible_extent(engine: &Engine) -> Option<Extent> {
    let mut extent: Option<Extent> = None;
    for id in engine.visible_ids() {
        let ray_end = engine.ray(id).map(|ray| ray.end);
        for point in engine.fix(id).into_iter().chain(ray_end) {
            match extent.as_mut() {
                Some(e) => e.include(point),
                None => extent = Some(Extent::from_point(point)),
            }
        }
    }
    extent
}
