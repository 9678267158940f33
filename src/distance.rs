// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Mean radius of Earth, in statute miles.
const EARTH_RADIUS: f64 = 3958.75587;

/// Mean diameter of Earth, in statute miles.
const EARTH_DIAMETER: f64 = EARTH_RADIUS + EARTH_RADIUS;

/// Length of one degree of latitude, in miles.
pub const MILES_PER_LAT: f64 = 69.047;

/// Calculates the great-circle distance between two lat-lon positions
/// on Earth using the `haversine formula <https://en.wikipedia.org/wiki/Haversine_formula>`_.
/// Returns the result in miles.
pub fn earth_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lon1 = lon1.to_radians();
    let lat2 = lat2.to_radians();
    let lon2 = lon2.to_radians();

    let sin_dlat_half = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1) * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half;

    EARTH_DIAMETER * h.sqrt().min(1.0).asin()
}

/// Converts a north-south distance in miles into degrees of latitude.
#[inline]
pub fn miles_to_lat(miles: f64) -> f64 {
    miles / MILES_PER_LAT
}

/// Converts an east-west distance in miles, measured at the given latitude,
/// into degrees of longitude.
#[inline]
pub fn miles_to_lon(miles: f64, lat: f64) -> f64 {
    miles / (lat.to_radians().cos() * MILES_PER_LAT)
}
