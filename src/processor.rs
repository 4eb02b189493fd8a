use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::gpx_document;
use crate::recalc::{self, RecalcConfig};
use crate::route_db::{NewSubmission, RouteStore};
use crate::route_source::RouteFileMeta;

/* One dispatch: read -> decode -> recalculate -> re-encode -> store. Every
failure propagates before `store` is reached, so a bad file leaves zero rows
behind and the scheduler is free to try again on its next tick. */

pub fn process_route_file(
    path: &Path,
    meta: &RouteFileMeta,
    start: DateTime<Utc>,
    config: &RecalcConfig,
    rng: &mut impl Rng,
    store: &mut dyn RouteStore,
) -> Result<i64> {
    info!(
        "dispatching route file {:?} (route={}, operator={}, shift={})",
        path, meta.route_id, meta.operator, meta.shift
    );
    let xml = fs::read_to_string(path)?;
    process_route_xml(&xml, meta, start, config, rng, store)
}

pub fn process_route_xml(
    xml: &str,
    meta: &RouteFileMeta,
    start: DateTime<Utc>,
    config: &RecalcConfig,
    rng: &mut impl Rng,
    store: &mut dyn RouteStore,
) -> Result<i64> {
    let mut track = gpx_document::decode(xml)?;
    let outcome = recalc::recalculate(&mut track, start, config, rng);
    let encoded = gpx_document::encode(xml, &track)?;

    info!(
        "route {} recalculated: {:.3} km, duration {:?} s",
        meta.route_id, outcome.total_distance_km, outcome.total_duration_seconds
    );

    store.store(&NewSubmission {
        route_id: meta.route_id.clone(),
        operator: meta.operator.clone(),
        submitted_at: start,
        shift: meta.shift,
        distance_km: outcome.total_distance_km,
        duration_seconds: outcome.total_duration_seconds,
        description: track.description.clone(),
        gpx: encoded,
    })
}
