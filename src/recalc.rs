use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use rand::Rng;

use crate::track::RouteTrack;
use crate::utils;

pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 40.0;
// ~2.2m at the equator
pub const DEFAULT_PERTURBATION_EPSILON_DEGREES: f64 = 0.00002;

/// How the total duration of a route is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationPolicy {
    /// `distance / average_speed`, with timestamps synthesized from scratch
    /// proportionally to the distance covered.
    AssumedSpeed,
    /// `max(time) - min(time)` over the timestamps already in the track.
    ObservedTimestamps,
}

#[derive(Debug, Clone, Copy)]
pub struct Perturbation {
    pub epsilon_degrees: f64,
}

impl Default for Perturbation {
    fn default() -> Self {
        Perturbation {
            epsilon_degrees: DEFAULT_PERTURBATION_EPSILON_DEGREES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecalcConfig {
    pub duration_policy: DurationPolicy,
    /// Only used by `DurationPolicy::AssumedSpeed`.
    pub average_speed_kmh: f64,
    pub perturbation: Option<Perturbation>,
}

impl Default for RecalcConfig {
    fn default() -> Self {
        RecalcConfig {
            duration_policy: DurationPolicy::AssumedSpeed,
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            perturbation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecalcOutcome {
    pub total_distance_km: f64,
    /// `None` when the observed-timestamp policy finds fewer than 2
    /// timestamped points. Never zero in that case.
    pub total_duration_seconds: Option<f64>,
}

/* The engine. Pure and synchronous: one track in, one outcome out, points
rewritten in place. Randomness only comes from the injected `rng` and the only
instant it knows about is the caller's `start`, so a seeded rng + fixed start
reproduces a run exactly. */
pub fn recalculate(
    track: &mut RouteTrack,
    start: DateTime<Utc>,
    config: &RecalcConfig,
    rng: &mut impl Rng,
) -> RecalcOutcome {
    let original_km = total_distance_km(track);

    if track.total_points() < 2 {
        warn!("degenerate track: fewer than 2 points, distance is 0");
    } else if original_km == 0.0 {
        warn!("degenerate track: zero total distance");
    }

    // Observed before any rewrite, this is the duration that gets scaled when
    // perturbation changes the distance.
    let observed_seconds = observed_duration_seconds(track);

    let perturbed = match &config.perturbation {
        Some(perturbation) => {
            perturb(track, perturbation, rng);
            true
        }
        None => false,
    };

    let new_km = if perturbed {
        total_distance_km(track)
    } else {
        original_km
    };

    let total_duration_seconds = match config.duration_policy {
        DurationPolicy::AssumedSpeed => Some(new_km / config.average_speed_kmh * 3600.0),
        DurationPolicy::ObservedTimestamps => {
            if perturbed && original_km > 0.0 {
                observed_seconds.map(|seconds| {
                    let change_ratio = (new_km - original_km) / original_km;
                    seconds * (1.0 + change_ratio)
                })
            } else {
                // zero original distance: the change ratio is undefined, so
                // the observed duration passes through unscaled
                observed_seconds
            }
        }
    };

    match config.duration_policy {
        DurationPolicy::AssumedSpeed => {
            // timestamps are generated from scratch
            if let Some(seconds) = total_duration_seconds {
                assign_proportional_timestamps(track, start, seconds);
            }
        }
        DurationPolicy::ObservedTimestamps => {
            // existing timestamps are only re-scaled after a perturbation, and
            // only when the track had an observable duration to begin with
            if perturbed {
                if let (Some(seconds), Some(anchor)) =
                    (total_duration_seconds, first_observed_time(track))
                {
                    assign_uniform_timestamps(track, anchor, seconds);
                }
            }
        }
    }

    RecalcOutcome {
        total_distance_km: new_km,
        total_duration_seconds,
    }
}

/// Sum of pairwise great-circle distances between consecutive points, in
/// meters. Fewer than 2 points yields an empty list.
fn pairwise_distances(track: &RouteTrack) -> Vec<f64> {
    track
        .points()
        .tuple_windows()
        .map(|(a, b)| utils::haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude))
        .collect()
}

pub fn total_distance_km(track: &RouteTrack) -> f64 {
    pairwise_distances(track).iter().sum::<f64>() / 1000.0
}

/// `max - min` over points carrying a timestamp, or `None` when fewer than 2
/// points have one.
fn observed_duration_seconds(track: &RouteTrack) -> Option<f64> {
    let times: Vec<DateTime<Utc>> = track.points().filter_map(|p| p.time).collect();
    if times.len() < 2 {
        return None;
    }
    let min = *times.iter().min().unwrap();
    let max = *times.iter().max().unwrap();
    Some((max - min).num_milliseconds() as f64 / 1000.0)
}

fn first_observed_time(track: &RouteTrack) -> Option<DateTime<Utc>> {
    track.points().filter_map(|p| p.time).min()
}

fn perturb(track: &mut RouteTrack, perturbation: &Perturbation, rng: &mut impl Rng) {
    let eps = perturbation.epsilon_degrees;
    for point in track.points_mut() {
        if eps > 0.0 {
            point.latitude += rng.random_range(-eps..=eps);
            point.longitude += rng.random_range(-eps..=eps);
        }
        point.latitude = utils::round_coordinate(point.latitude);
        point.longitude = utils::round_coordinate(point.longitude);
    }
}

/// Point `i` gets `start + (cumulative distance up to i / total) * duration`.
/// Zero total distance degenerates to every point getting `start`.
fn assign_proportional_timestamps(
    track: &mut RouteTrack,
    start: DateTime<Utc>,
    total_duration_seconds: f64,
) {
    let distances = pairwise_distances(track);
    let total: f64 = distances.iter().sum();

    let mut cumulative = 0.0;
    for (i, point) in track.points_mut().enumerate() {
        if i > 0 {
            cumulative += distances[i - 1];
        }
        let offset_seconds = if total > 0.0 {
            cumulative / total * total_duration_seconds
        } else {
            0.0
        };
        point.time = Some(start + millis(offset_seconds));
    }
}

/// Point `i` gets `start + (i / (n - 1)) * duration`. A single point gets
/// `start`, an empty track is a no-op.
fn assign_uniform_timestamps(
    track: &mut RouteTrack,
    start: DateTime<Utc>,
    total_duration_seconds: f64,
) {
    let n = track.total_points();
    if n == 0 {
        return;
    }
    for (i, point) in track.points_mut().enumerate() {
        let offset_seconds = if n > 1 {
            i as f64 / (n - 1) as f64 * total_duration_seconds
        } else {
            0.0
        };
        point.time = Some(start + millis(offset_seconds));
    }
}

fn millis(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.0).round() as i64)
}
