use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Error, Result};
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::RecalcError;

/// Recurring time-of-day operating window of a route. The token is part of
/// the source file name and of the persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Shift {
    Morning,
    Midday,
    Afternoon,
    Evening,
    LateNight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFileMeta {
    pub route_id: String,
    pub operator: String,
    pub shift: Shift,
}

/// Parse `<routeId>-<operator>-<shift>.gpx`.
pub fn parse_file_name(file_name: &str) -> Result<RouteFileMeta> {
    let bad_file_name = || {
        Error::new(RecalcError::BadFileName {
            file_name: file_name.to_string(),
        })
    };

    let stem = file_name.strip_suffix(".gpx").ok_or_else(bad_file_name)?;
    let parts: Vec<&str> = stem.split('-').collect();
    match parts.as_slice() {
        [route_id, operator, shift] if !route_id.is_empty() && !operator.is_empty() => {
            let shift = shift.parse::<Shift>().map_err(|_| bad_file_name())?;
            Ok(RouteFileMeta {
                route_id: route_id.to_string(),
                operator: operator.to_string(),
                shift,
            })
        }
        _ => Err(bad_file_name()),
    }
}

/// Scan a directory for route files. Files that are not `.gpx` are ignored,
/// `.gpx` files with an unparsable name are logged and skipped so one stray
/// file never blocks the rest of the directory.
pub fn scan_route_files(dir: &Path) -> Result<Vec<(PathBuf, RouteFileMeta)>> {
    let mut routes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("gpx") {
            continue;
        }
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        match parse_file_name(file_name) {
            Ok(meta) => routes.push((path.clone(), meta)),
            Err(err) => warn!("skipping route file {:?}: {}", path, err),
        }
    }
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::str::FromStr;

    use crate::errors::RecalcError;
    use crate::route_source::{parse_file_name, scan_route_files, Shift};

    #[test]
    fn shift_tokens() {
        assert_eq!(Shift::from_str("morning").unwrap(), Shift::Morning);
        assert_eq!(Shift::from_str("late_night").unwrap(), Shift::LateNight);
        assert_eq!(Shift::LateNight.to_string(), "late_night");
        assert!(Shift::from_str("brunch").is_err());
    }

    #[test]
    fn file_name_ok() {
        let meta = parse_file_name("R7_centro-TransNorte-afternoon.gpx").unwrap();
        assert_eq!(meta.route_id, "R7_centro");
        assert_eq!(meta.operator, "TransNorte");
        assert_eq!(meta.shift, Shift::Afternoon);
    }

    #[test]
    fn file_name_rejected() {
        for name in [
            "R7-TransNorte-afternoon.kml",
            "R7-afternoon.gpx",
            "R7-TransNorte-siesta.gpx",
            "-TransNorte-morning.gpx",
            "R7-Trans-Norte-morning.gpx",
        ] {
            let err = parse_file_name(name).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<RecalcError>(),
                Some(RecalcError::BadFileName { .. })
            ));
        }
    }

    #[test]
    fn scan_skips_stray_files() {
        let dir = tempdir::TempDir::new("scan_route_files").unwrap();
        for name in [
            "R7-TransNorte-morning.gpx",
            "R7_TransNorte_morning.gpx",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "<gpx/>").unwrap();
        }

        let routes = scan_route_files(dir.path()).unwrap();
        assert_eq!(routes.len(), 1);
        let (path, meta) = &routes[0];
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "R7-TransNorte-morning.gpx"
        );
        assert_eq!(meta.route_id, "R7");
        assert_eq!(meta.operator, "TransNorte");
        assert_eq!(meta.shift, Shift::Morning);
    }
}
