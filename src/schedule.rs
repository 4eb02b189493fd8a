use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::route_source::Shift;

/// Time of day at which a shift's route file is dispatched to the engine,
/// every day unless the date is a holiday.
pub fn dispatch_time(shift: Shift) -> NaiveTime {
    let (hour, minute) = match shift {
        Shift::Morning => (7, 0),
        Shift::Midday => (13, 0),
        Shift::Afternoon => (18, 45),
        Shift::Evening => (19, 0),
        Shift::LateNight => (23, 45),
    };
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Injected by the host; the scheduler itself knows nothing about which dates
/// are holidays.
pub trait HolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn is_holiday(&self, _date: NaiveDate) -> bool {
        false
    }
}

pub fn is_eligible(date: NaiveDate, calendar: &dyn HolidayCalendar) -> bool {
    !calendar.is_holiday(date)
}

/// First dispatch instant strictly after `after` for the given shift,
/// skipping holiday dates. Pure date arithmetic, the caller supplies "now".
pub fn next_dispatch(
    shift: Shift,
    after: DateTime<Utc>,
    calendar: &dyn HolidayCalendar,
) -> DateTime<Utc> {
    let time = dispatch_time(shift);
    let mut date = after.date_naive();
    if after.time() >= time {
        date = date + Days::new(1);
    }
    while !is_eligible(date, calendar) {
        date = date + Days::new(1);
    }
    Utc.from_utc_datetime(&date.and_time(time))
}
