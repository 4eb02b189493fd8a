use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSegment {
    pub track_points: Vec<TrackPoint>,
}

/* A decoded route: one or more track segments in document order, plus the
free-text description the reporting side wants to show. The recalculation
engine mutates points in place (timestamps, and coordinates when perturbation
is on), so all fields are plain and public. */
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTrack {
    pub track_segments: Vec<TrackSegment>,
    pub description: Option<String>,
}

impl RouteTrack {
    /// All points across segments, in document order.
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> + '_ {
        self.track_segments.iter().flat_map(|s| s.track_points.iter())
    }

    pub fn points_mut(&mut self) -> impl Iterator<Item = &mut TrackPoint> + '_ {
        self.track_segments
            .iter_mut()
            .flat_map(|s| s.track_points.iter_mut())
    }

    pub fn total_points(&self) -> usize {
        self.track_segments.iter().map(|s| s.track_points.len()).sum()
    }
}
