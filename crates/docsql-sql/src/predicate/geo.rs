use super::clause;
use crate::serializer::{Bind, Ident, Params, ToSql};

use docsql_core::{
    mapper::{geo, type_tag},
    Error, Point, Result,
};
use serde_json::Value as Json;

/// `ST_DistanceSphere` between the column and `point`, in meters.
pub(super) fn distance(field: &str, point: Point, params: &mut Params) -> String {
    clause(params, |f| {
        fmt!(f, "ST_DistanceSphere(" Ident(field) "::geometry, POINT(" Bind(point.x) ", " Bind(point.y) ")::geometry)")
    })
}

pub(super) fn within_box(field: &str, box_: &Json, params: &mut Params) -> Result<String> {
    let corners = match box_ {
        Json::Array(corners) if corners.len() == 2 => corners,
        _ => {
            return Err(Error::invalid_json(
                "bad $within value; $box should be an array of 2 GeoPoints",
            ))
        }
    };
    let lower = geo::point(&corners[0])?;
    let upper = geo::point(&corners[1])?;
    let literal = format!("(({}, {}), ({}, {}))", lower.x, lower.y, upper.x, upper.y);

    Ok(clause(params, |f| {
        fmt!(f, Ident(field) "::point <@ " Bind(literal) "::text::box")
    }))
}

pub(super) fn center_sphere(field: &str, sphere: &Json, params: &mut Params) -> Result<String> {
    let (center, radius) = match sphere {
        Json::Array(items) if items.len() >= 2 => (&items[0], &items[1]),
        _ => {
            return Err(Error::invalid_json(
                "bad $geoWithin value; $centerSphere should be an array of Parse.GeoPoint and distance",
            ))
        }
    };

    let center = match center {
        Json::Array(pair) if pair.len() == 2 => {
            let (Some(longitude), Some(latitude)) = (pair[0].as_f64(), pair[1].as_f64()) else {
                return Err(center_invalid());
            };
            geo::validate(latitude, longitude)?;
            Point {
                x: longitude,
                y: latitude,
            }
        }
        Json::Object(_) if type_tag(center) == Some("GeoPoint") => {
            geo::point(center).map_err(|_| center_invalid())?
        }
        _ => return Err(center_invalid()),
    };

    let radius = match radius.as_f64() {
        Some(radius) if radius >= 0.0 => radius,
        _ => {
            return Err(Error::invalid_json(
                "bad $geoWithin value; $centerSphere distance invalid",
            ))
        }
    };

    let distance = distance(field, center, params);
    let meters = geo::radians_to_meters(radius);
    Ok(clause(params, |f| fmt!(f, distance.as_str() " <= " Bind(meters))))
}

fn center_invalid() -> Error {
    Error::invalid_json("bad $geoWithin value; $centerSphere geo point invalid")
}

/// `$geoWithin.$polygon`: either a Polygon value, whose coordinates are
/// `[latitude, longitude]` pairs, or a list of GeoPoints or
/// `[longitude, latitude]` pairs.
pub(super) fn within_polygon(field: &str, polygon: &Json, params: &mut Params) -> Result<String> {
    let points = if type_tag(polygon) == Some("Polygon") {
        let coordinates = polygon.get("coordinates").unwrap_or(&Json::Null);
        if coordinates.as_array().map_or(true, |pairs| pairs.len() < 3) {
            return Err(Error::invalid_json(
                "bad $geoWithin value; Polygon.coordinates should contain at least 3 lon/lat pairs",
            ));
        }
        geo::polygon(coordinates)?
    } else if let Json::Array(items) = polygon {
        if items.len() < 3 {
            return Err(Error::invalid_json(
                "bad $geoWithin value; $polygon should contain at least 3 GeoPoints",
            ));
        }
        items.iter().map(vertex).collect::<Result<Vec<_>>>()?
    } else {
        return Err(Error::invalid_json(
            "bad $geoWithin value; $polygon should be Polygon object or Array of Parse.GeoPoint's",
        ));
    };

    let literal = polygon_literal(&points);
    Ok(clause(params, |f| {
        fmt!(f, Ident(field) "::point <@ " Bind(literal) "::text::polygon")
    }))
}

fn vertex(item: &Json) -> Result<Point> {
    match item {
        Json::Array(pair) if pair.len() == 2 => {
            let (Some(longitude), Some(latitude)) = (pair[0].as_f64(), pair[1].as_f64()) else {
                return Err(Error::invalid_json("bad $geoWithin value"));
            };
            geo::validate(latitude, longitude)?;
            Ok(Point {
                x: longitude,
                y: latitude,
            })
        }
        Json::Object(_) if type_tag(item) == Some("GeoPoint") => geo::point(item),
        _ => Err(Error::invalid_json("bad $geoWithin value")),
    }
}

pub(super) fn intersects_point(field: &str, point: &Json, params: &mut Params) -> Result<String> {
    if type_tag(point) != Some("GeoPoint") {
        return Err(Error::invalid_json(
            "bad $geoIntersect value; $point should be GeoPoint",
        ));
    }
    let point = geo::point(point)?;
    let literal = format!("({}, {})", point.x, point.y);

    Ok(clause(params, |f| {
        fmt!(f, Ident(field) "::polygon @> " Bind(literal) "::text::point")
    }))
}

/// `((x1, y1), (x2, y2), ...)`
pub(super) fn polygon_literal(points: &[Point]) -> String {
    let vertices: Vec<String> = points
        .iter()
        .map(|point| format!("({}, {})", point.x, point.y))
        .collect();
    format!("({})", vertices.join(", "))
}
