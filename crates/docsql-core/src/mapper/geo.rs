use crate::{Error, Point, Result};
use serde_json::Value as Json;

/// Mean Earth radius used to convert radian distances to meters.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Converts a distance in radians on the unit sphere to meters.
pub fn radians_to_meters(distance: f64) -> f64 {
    distance * EARTH_RADIUS_KM * 1000.0
}

pub fn validate(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::invalid_json(format!(
            "GeoPoint latitude out of bounds: {latitude}"
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::invalid_json(format!(
            "GeoPoint longitude out of bounds: {longitude}"
        )));
    }
    Ok(())
}

/// Reads a `{"latitude", "longitude"}` value into a validated point.
pub fn point(value: &Json) -> Result<Point> {
    let latitude = value.get("latitude").and_then(Json::as_f64);
    let longitude = value.get("longitude").and_then(Json::as_f64);
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Err(Error::invalid_json(format!("invalid GeoPoint value: {value}")));
    };
    validate(latitude, longitude)?;
    Ok(Point {
        x: longitude,
        y: latitude,
    })
}

/// Reads `[[latitude, longitude], ...]` polygon coordinates.
///
/// The ring is closed when the last point differs from the first and must
/// keep at least three distinct vertices.
pub fn polygon(coordinates: &Json) -> Result<Vec<Point>> {
    let Some(pairs) = coordinates.as_array() else {
        return Err(Error::invalid_json(format!(
            "invalid Polygon coordinates: {coordinates}"
        )));
    };
    if pairs.len() < 3 {
        return Err(Error::invalid_json("Polygon must have at least 3 values"));
    }

    let mut points = Vec::with_capacity(pairs.len() + 1);
    for pair in pairs {
        let latitude = pair.get(0).and_then(Json::as_f64);
        let longitude = pair.get(1).and_then(Json::as_f64);
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            return Err(Error::invalid_json(format!("invalid Polygon point: {pair}")));
        };
        validate(latitude, longitude)?;
        points.push(Point {
            x: longitude,
            y: latitude,
        });
    }

    close_ring(points)
}

/// Closes a ring of points and checks it has three distinct vertices.
pub fn close_ring(mut points: Vec<Point>) -> Result<Vec<Point>> {
    if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
        if first != last {
            points.push(first);
        }
    }

    let mut distinct: Vec<Point> = Vec::with_capacity(points.len());
    for point in &points {
        if !distinct.contains(point) {
            distinct.push(*point);
        }
    }
    if distinct.len() < 3 {
        return Err(Error::internal_server_error(
            "GeoJSON: Loop must have at least 3 different vertices",
        ));
    }

    Ok(points)
}
