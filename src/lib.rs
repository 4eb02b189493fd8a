#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod errors;
pub mod gpx_document;
pub mod logs;
pub mod processor;
pub mod recalc;
pub mod route_db;
pub mod route_source;
pub mod schedule;
pub mod track;
pub mod utils;
