use std::fs;

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use routelog_core::errors::RecalcError;
use routelog_core::gpx_document;
use routelog_core::recalc::{recalculate, RecalcConfig};
use routelog_core::track::{RouteTrack, TrackPoint, TrackSegment};

#[test]
fn decode_sample() {
    let xml = fs::read_to_string("./tests/data/route_sample.gpx").unwrap();
    let track = gpx_document::decode(&xml).unwrap();

    assert_eq!(track.total_points(), 5);
    assert_eq!(
        track.description.as_deref(),
        Some("Linha 7 - Centro ate Terminal Norte")
    );

    let first = track.points().next().unwrap();
    assert_eq!(first.latitude, -23.55052);
    assert_eq!(first.longitude, -46.633308);
    assert!(track.points().all(|p| p.time.is_none()));
}

#[test]
fn decode_timestamped_takes_track_description() {
    let xml = fs::read_to_string("./tests/data/route_timestamped.gpx").unwrap();
    let track = gpx_document::decode(&xml).unwrap();

    assert_eq!(track.total_points(), 5);
    // no document metadata here, falls back to the track's own <desc>
    assert_eq!(
        track.description.as_deref(),
        Some("Linha 12 - Terminal Sul circular")
    );
    assert_eq!(
        track.points().next().unwrap().time,
        Some(Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap())
    );
}

#[test]
fn roundtrip_preserves_unmodified_fields() {
    let xml = fs::read_to_string("./tests/data/route_sample.gpx").unwrap();
    let track = gpx_document::decode(&xml).unwrap();
    let out = gpx_document::encode(&xml, &track).unwrap();

    // same model after a decode of the re-encoded text
    assert_eq!(gpx_document::decode(&out).unwrap(), track);

    // untouched fields survive byte for byte
    assert!(out.contains(r#"lat="-23.55052""#));
    assert!(out.contains(r#"lon="-46.639""#));
    assert!(out.contains("<surface>paved</surface>"));
    assert!(out.contains("<ele>795.5</ele>"));
    assert!(out.contains("<desc>Linha 7 - Centro ate Terminal Norte</desc>"));
}

#[test]
fn roundtrip_timestamped() {
    let xml = fs::read_to_string("./tests/data/route_timestamped.gpx").unwrap();
    let track = gpx_document::decode(&xml).unwrap();
    let out = gpx_document::encode(&xml, &track).unwrap();
    assert_eq!(gpx_document::decode(&out).unwrap(), track);
}

#[test]
fn encode_keeps_processing_instruction_and_doctype() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<?xml-stylesheet type="text/xsl" href="route.xsl"?>
<!DOCTYPE gpx>
<gpx version="1.1" creator="routelog" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="-23.55052" lon="-46.633308"/>
  </trkseg></trk>
</gpx>"#;
    let track = RouteTrack {
        track_segments: vec![TrackSegment {
            track_points: vec![TrackPoint {
                latitude: -23.55052,
                longitude: -46.633308,
                time: None,
            }],
        }],
        description: None,
    };

    let out = gpx_document::encode(xml, &track).unwrap();
    assert!(out.contains(r#"<?xml-stylesheet type="text/xsl" href="route.xsl"?>"#));
    assert!(out.contains("<!DOCTYPE gpx>"));
}

#[test]
fn encode_inserts_synthesized_times() {
    let xml = fs::read_to_string("./tests/data/route_sample.gpx").unwrap();
    let mut track = gpx_document::decode(&xml).unwrap();

    let start = Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    recalculate(&mut track, start, &RecalcConfig::default(), &mut rng);

    let out = gpx_document::encode(&xml, &track).unwrap();
    assert_eq!(out.matches("<time>").count(), 5);

    let reparsed = gpx_document::decode(&out).unwrap();
    let times: Vec<_> = reparsed.points().map(|p| p.time.unwrap()).collect();
    assert_eq!(times[0], start);
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn document_without_track_is_missing_track() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="routelog" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="-23.55052" lon="-46.633308"><name>garage</name></wpt>
</gpx>"#;
    let err = gpx_document::decode(xml).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RecalcError>(),
        Some(RecalcError::MissingTrack)
    ));
}

#[test]
fn track_without_segments_is_missing_track() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="routelog" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>empty</name></trk>
</gpx>"#;
    let err = gpx_document::decode(xml).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RecalcError>(),
        Some(RecalcError::MissingTrack)
    ));
}

#[test]
fn unparsable_coordinate_is_malformed_point() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="routelog" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="abc" lon="-46.633308"/>
  </trkseg></trk>
</gpx>"#;
    let err = gpx_document::decode(xml).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RecalcError>(),
        Some(RecalcError::MalformedPoint { .. })
    ));
}

#[test]
fn unparsable_time_is_malformed_point() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="routelog" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="-23.55052" lon="-46.633308"><time>yesterday-ish</time></trkpt>
  </trkseg></trk>
</gpx>"#;
    let err = gpx_document::decode(xml).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RecalcError>(),
        Some(RecalcError::MalformedPoint { .. })
    ));
}
