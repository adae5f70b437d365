use chrono::{NaiveTime, Timelike};

use crate::bookings::models::Ground;
use crate::errors::ServiceError;

/// peak hours run from 17:00 until 05:00 the next morning
const PEAK_START_HOUR: u32 = 17;
const PEAK_END_HOUR: u32 = 5;

/// Price of a booking length, in taka
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rate {
    pub duration: i16,
    pub regular: i32,
    pub peak: i32,
}

#[derive(Debug, Serialize)]
pub struct GroundPricing {
    pub ground: Ground,
    pub name: &'static str,
    pub capacity: i16,
    pub peak_hours: (&'static str, &'static str),
    pub rates: Vec<Rate>,
    pub facilities: &'static [&'static str],
}

fn rates(ground: Ground) -> [Rate; 2] {
    match ground {
        Ground::One => [
            Rate {
                duration: 60,
                regular: 1000,
                peak: 1500,
            },
            Rate {
                duration: 90,
                regular: 1500,
                peak: 2200,
            },
        ],
        Ground::Two => [
            Rate {
                duration: 60,
                regular: 1000,
                peak: 1400,
            },
            Rate {
                duration: 90,
                regular: 1400,
                peak: 2000,
            },
        ],
    }
}

/// the start hour decides the rate of the whole booking
pub fn is_peak(start: NaiveTime) -> bool {
    start.hour() >= PEAK_START_HOUR || start.hour() < PEAK_END_HOUR
}

/// Calculates what a booking costs, this is the amount that gets stored
pub fn quote(ground: Ground, start: NaiveTime, duration: i16) -> Result<i32, ServiceError> {
    let rate = match rates(ground).iter().find(|rate| rate.duration == duration) {
        Some(rate) => *rate,
        None => bad_request!("there is no price for a {} minute booking", duration),
    };

    if is_peak(start) {
        Ok(rate.peak)
    } else {
        Ok(rate.regular)
    }
}

/// The public price list
pub fn price_list() -> Vec<GroundPricing> {
    Ground::ALL
        .iter()
        .map(|ground| GroundPricing {
            ground: *ground,
            name: ground.name(),
            capacity: ground.capacity(),
            peak_hours: ("17:00", "05:00"),
            rates: rates(*ground).to_vec(),
            facilities: ground.facilities(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms(hour, minute, 0)
    }

    #[test]
    fn peak_hours_wrap_around_midnight() {
        assert!(is_peak(at(17, 0)));
        assert!(is_peak(at(23, 59)));
        assert!(is_peak(at(0, 0)));
        assert!(is_peak(at(4, 59)));

        assert!(!is_peak(at(5, 0)));
        assert!(!is_peak(at(16, 59)));
    }

    #[test]
    fn football_ground_prices() {
        assert_eq!(quote(Ground::One, at(9, 0), 60), Ok(1000));
        assert_eq!(quote(Ground::One, at(9, 0), 90), Ok(1500));
        assert_eq!(quote(Ground::One, at(18, 0), 60), Ok(1500));
        assert_eq!(quote(Ground::One, at(18, 0), 90), Ok(2200));
    }

    #[test]
    fn cricket_ground_prices() {
        assert_eq!(quote(Ground::Two, at(9, 0), 60), Ok(1000));
        assert_eq!(quote(Ground::Two, at(9, 0), 90), Ok(1400));
        assert_eq!(quote(Ground::Two, at(2, 30), 60), Ok(1400));
        assert_eq!(quote(Ground::Two, at(2, 30), 90), Ok(2000));
    }

    #[test]
    fn unknown_duration_has_no_price() {
        assert!(quote(Ground::One, at(9, 0), 45).is_err());
    }

    #[test]
    fn price_list_contains_every_ground() {
        let list = price_list();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].capacity, 14);
        assert_eq!(list[1].capacity, 12);
    }
}
