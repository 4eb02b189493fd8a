use std::fmt;

/* Fatal conditions for a single route file. Anything that fails with one of
these must leave zero storage side effects for that file; the scheduler will
simply pick the file up again on the next tick. */
#[derive(Debug)]
pub enum RecalcError {
    /// A point's coordinate or timestamp failed to parse.
    MalformedPoint { detail: String },
    /// The document has no track/segment structure, so there is nothing to
    /// compute or persist.
    MissingTrack,
    /// A source file name does not follow `<routeId>-<operator>-<shift>.gpx`.
    BadFileName { file_name: String },
}

impl fmt::Display for RecalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecalcError::MalformedPoint { detail } => {
                write!(f, "malformed track point: {}", detail)
            }
            RecalcError::MissingTrack => {
                write!(f, "no track found in the GPX document")
            }
            RecalcError::BadFileName { file_name } => {
                write!(
                    f,
                    "file name {:?} does not match <routeId>-<operator>-<shift>.gpx",
                    file_name
                )
            }
        }
    }
}

impl std::error::Error for RecalcError {}
