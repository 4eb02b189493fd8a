use anyhow::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::errors::RecalcError;
use crate::track::{RouteTrack, TrackPoint, TrackSegment};

/// Decode a GPX document into the track model.
///
/// Structure checks happen here: a document without any track/segment fails
/// with `RecalcError::MissingTrack` before anything is computed, a point with
/// an unparsable coordinate or timestamp fails with
/// `RecalcError::MalformedPoint`.
pub fn decode(xml: &str) -> Result<RouteTrack> {
    let doc = match gpx::read(xml.as_bytes()) {
        Ok(doc) => doc,
        Err(err) => {
            // `gpx::read` reports a single opaque error type. Tell a bad point
            // value apart from an absent track by probing the raw text for
            // track structure, the same check order the original service used.
            return if xml.contains("<trk") {
                Err(Error::new(RecalcError::MalformedPoint {
                    detail: err.to_string(),
                }))
            } else {
                Err(Error::new(RecalcError::MissingTrack))
            };
        }
    };

    if doc.tracks.iter().all(|t| t.segments.is_empty()) {
        return Err(Error::new(RecalcError::MissingTrack));
    }

    // document metadata first, then the track itself
    let description = doc
        .metadata
        .as_ref()
        .and_then(|m| m.description.clone())
        .or_else(|| doc.tracks.iter().find_map(|t| t.description.clone()));

    let mut track_segments = Vec::new();
    for track in &doc.tracks {
        for segment in &track.segments {
            let mut track_points = Vec::with_capacity(segment.points.len());
            for point in &segment.points {
                let time = match &point.time {
                    Some(time) => {
                        let raw = time.format().map_err(malformed)?;
                        let parsed =
                            DateTime::parse_from_rfc3339(&raw).map_err(malformed)?;
                        Some(DateTime::<Utc>::from(parsed))
                    }
                    None => None,
                };
                track_points.push(TrackPoint {
                    latitude: point.point().y(),
                    longitude: point.point().x(),
                    time,
                });
            }
            track_segments.push(TrackSegment { track_points });
        }
    }

    Ok(RouteTrack {
        track_segments,
        description,
    })
}

fn malformed<E: std::fmt::Display>(err: E) -> Error {
    Error::new(RecalcError::MalformedPoint {
        detail: err.to_string(),
    })
}

/// Re-encode a recalculated track over its source document.
///
/// This is a streaming rewrite of the original text: the k-th `<trkpt>` in
/// document order gets the k-th model point's coordinates and its `<time>`
/// child replaced (or inserted when the engine synthesized one). Everything
/// else, including extension elements we know nothing about, passes through
/// verbatim.
pub fn encode(xml: &str, track: &RouteTrack) -> Result<String> {
    let points: Vec<&TrackPoint> = track.points().collect();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut idx = 0;
    let mut in_trkpt = false;
    let mut time_rewritten = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"trkpt" => {
                let point = next_point(&points, idx)?;
                writer.write_event(Event::Start(rewrite_trkpt_attributes(&e, point)?))?;
                in_trkpt = true;
                time_rewritten = false;
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"trkpt" => {
                // self-closing point, needs expanding if a time was synthesized
                let point = next_point(&points, idx)?;
                let rewritten = rewrite_trkpt_attributes(&e, point)?;
                match point.time {
                    Some(time) => {
                        let end = BytesEnd::new(
                            std::str::from_utf8(e.name().as_ref())?.to_string(),
                        );
                        writer.write_event(Event::Start(rewritten))?;
                        write_time_element(&mut writer, time)?;
                        writer.write_event(Event::End(end))?;
                    }
                    None => writer.write_event(Event::Empty(rewritten))?,
                }
                idx += 1;
            }
            Ok(Event::Start(e)) if in_trkpt && e.name().as_ref() == b"time" => {
                let raw = reader.read_text(e.name())?;
                let text = match next_point(&points, idx)?.time {
                    Some(time) => format_time(time),
                    None => raw.into_owned(),
                };
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                writer.write_event(Event::End(e.to_end().to_owned()))?;
                time_rewritten = true;
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"trkpt" => {
                if !time_rewritten {
                    if let Some(time) = next_point(&points, idx)?.time {
                        write_time_element(&mut writer, time)?;
                    }
                }
                writer.write_event(Event::End(e.into_owned()))?;
                in_trkpt = false;
                idx += 1;
            }

            Ok(Event::Start(e)) => writer.write_event(Event::Start(e.into_owned()))?,
            Ok(Event::Empty(e)) => writer.write_event(Event::Empty(e.into_owned()))?,
            Ok(Event::End(e)) => writer.write_event(Event::End(e.into_owned()))?,
            Ok(Event::Text(e)) => writer.write_event(Event::Text(e.into_owned()))?,
            Ok(Event::CData(e)) => writer.write_event(Event::CData(e.into_owned()))?,
            Ok(Event::Decl(e)) => writer.write_event(Event::Decl(e.into_owned()))?,
            Ok(Event::Comment(e)) => writer.write_event(Event::Comment(e.into_owned()))?,
            Ok(Event::PI(e)) => writer.write_event(Event::PI(e.into_owned()))?,
            Ok(Event::DocType(e)) => writer.write_event(Event::DocType(e.into_owned()))?,
            Ok(Event::Eof) => break,
            Err(e) => bail!("XML parse error during GPX rewrite: {e:?}"),
        }

        buf.clear();
    }

    if idx != points.len() {
        bail!(
            "track point count mismatch: document has {}, model has {}",
            idx,
            points.len()
        );
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

fn next_point<'a>(points: &[&'a TrackPoint], idx: usize) -> Result<&'a TrackPoint> {
    points
        .get(idx)
        .copied()
        .ok_or_else(|| anyhow!("document has more <trkpt> elements than the track model"))
}

fn rewrite_trkpt_attributes(e: &BytesStart, point: &TrackPoint) -> Result<BytesStart<'static>> {
    let name = std::str::from_utf8(e.name().as_ref())?.to_string();
    let mut out = BytesStart::new(name);
    for attribute in e.attributes() {
        let attribute = attribute?;
        match attribute.key.as_ref() {
            b"lat" => out.push_attribute(("lat", point.latitude.to_string().as_str())),
            b"lon" => out.push_attribute(("lon", point.longitude.to_string().as_str())),
            _ => out.push_attribute(attribute),
        }
    }
    Ok(out)
}

fn write_time_element(writer: &mut Writer<Vec<u8>>, time: DateTime<Utc>) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("time")))?;
    writer.write_event(Event::Text(BytesText::new(&format_time(time))))?;
    writer.write_event(Event::End(BytesEnd::new("time")))?;
    Ok(())
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
