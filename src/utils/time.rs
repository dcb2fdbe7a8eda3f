/*
Copyright 2024 CNR-ISAC

This file is part of osprey.

osprey is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

osprey is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with osprey. If not, see https://www.gnu.org/licenses/.
*/

//! Module with calendar arithmetic: the leg/year convention of the
//! EC-Earth4 runtime and the decimal-year time axis used by every
//! diagnostic product.

use crate::constants::{FIRST_LEG, FIRST_SIMULATION_YEAR};
use crate::errors::ConfigError;
use crate::Float;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Leg number covering a given simulation year. Years before the
/// first simulation year have no leg.
pub fn leg_from_year(year: i32) -> Result<u32, ConfigError> {
    if year < FIRST_SIMULATION_YEAR {
        return Err(ConfigError::OutOfBounds(
            "Year predates the first simulation year",
        ));
    }

    Ok((year - FIRST_SIMULATION_YEAR + FIRST_LEG as i32) as u32)
}

/// First simulation year covered by a given leg.
pub fn year_from_leg(leg: u32) -> i32 {
    FIRST_SIMULATION_YEAR + leg as i32 - FIRST_LEG as i32
}

/// Year at which an EOF projection is evaluated.
pub fn forecast_year(endyear: i32, yearleap: i32) -> i32 {
    endyear + yearleap
}

/// Nominal date of the projected field: mid-January of the forecast
/// year, matching the centre of the first monthly mean.
pub fn forecast_date(foreyear: i32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(foreyear, 1, 16)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(FIRST_SIMULATION_YEAR, 1, 16).unwrap())
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// Converts a calendar date to a decimal-year real number.
///
/// Diagnostic products always carry this representation on their time
/// axis so that experiments with different calendars stay comparable.
pub fn decimal_year(date: &NaiveDateTime) -> Float {
    let year = date.year();
    let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();

    let year_seconds = days_in_year(year) as Float * 86400.0;
    let elapsed = (date.date().num_days_from_ce() - start.num_days_from_ce()) as Float * 86400.0
        + date.num_seconds_from_midnight() as Float;

    year as Float + elapsed / year_seconds
}

pub fn decimal_years(dates: &[NaiveDateTime]) -> Vec<Float> {
    dates.iter().map(decimal_year).collect()
}

fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}
