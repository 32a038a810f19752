//! Binding [`Value`]s to statement parameters and reading columns back.

use chrono::{DateTime, NaiveDateTime, Utc};
use docsql_core::{mapper, Error, Point, Result, Value};
use postgres_types::{accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::Row;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// A bound parameter. Encodes to whatever type the server inferred for
/// the placeholder, converting between scalar encodings where needed.
#[derive(Debug)]
pub(crate) struct Param<'a>(pub(crate) &'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            _ if *ty == Type::JSON || *ty == Type::JSONB => to_json(self.0).to_sql(ty, out),
            Value::Bool(value) => match *ty {
                Type::BOOL => value.to_sql(ty, out),
                _ => value.to_string().to_sql(ty, out),
            },
            Value::Integer(value) => match *ty {
                Type::INT2 => i16::try_from(*value)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*value)?.to_sql(ty, out),
                Type::INT8 => value.to_sql(ty, out),
                Type::FLOAT4 => (*value as f32).to_sql(ty, out),
                Type::FLOAT8 => (*value as f64).to_sql(ty, out),
                _ => value.to_string().to_sql(ty, out),
            },
            Value::Number(value) => match *ty {
                Type::FLOAT8 => value.to_sql(ty, out),
                Type::FLOAT4 => (*value as f32).to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 if value.fract() != 0.0 => {
                    Err(format!("{value} is not an integer").into())
                }
                Type::INT2 => (*value as i16).to_sql(ty, out),
                Type::INT4 => (*value as i32).to_sql(ty, out),
                Type::INT8 => (*value as i64).to_sql(ty, out),
                _ => mapper::number(*value).to_string().to_sql(ty, out),
            },
            Value::String(value) => match *ty {
                Type::TIMESTAMPTZ => parse_timestamp(value)?.to_sql(ty, out),
                Type::TIMESTAMP => parse_timestamp(value)?.naive_utc().to_sql(ty, out),
                Type::FLOAT8 => value.parse::<f64>()?.to_sql(ty, out),
                Type::BOOL => value.parse::<bool>()?.to_sql(ty, out),
                _ => value.to_sql(ty, out),
            },
            Value::Timestamp(value) => match *ty {
                Type::TIMESTAMPTZ => value.to_sql(ty, out),
                Type::TIMESTAMP => value.naive_utc().to_sql(ty, out),
                _ => mapper::to_iso(value).to_sql(ty, out),
            },
            Value::StringArray(items) => items.to_sql(ty, out),
            Value::Point(point) => match *ty {
                Type::POINT => {
                    write_point(point, out);
                    Ok(IsNull::No)
                }
                _ => format!("({}, {})", point.x, point.y).to_sql(ty, out),
            },
            Value::Polygon(points) => match *ty {
                Type::POLYGON => {
                    out.extend_from_slice(&i32::try_from(points.len())?.to_be_bytes());
                    for point in points {
                        write_point(point, out);
                    }
                    Ok(IsNull::No)
                }
                _ => polygon_text(points).to_sql(ty, out),
            },
            Value::Json(value) => value.to_string().to_sql(ty, out),
        }
    }

    accepts!(
        BOOL,
        INT2,
        INT4,
        INT8,
        FLOAT4,
        FLOAT8,
        TEXT,
        VARCHAR,
        BPCHAR,
        NAME,
        UNKNOWN,
        TIMESTAMPTZ,
        TIMESTAMP,
        JSON,
        JSONB,
        TEXT_ARRAY,
        VARCHAR_ARRAY,
        POINT,
        POLYGON
    );

    to_sql_checked!();
}

fn write_point(point: &Point, out: &mut BytesMut) {
    out.extend_from_slice(&point.x.to_be_bytes());
    out.extend_from_slice(&point.y.to_be_bytes());
}

fn polygon_text(points: &[Point]) -> String {
    let points: Vec<String> = points
        .iter()
        .map(|point| format!("({}, {})", point.x, point.y))
        .collect();
    format!("({})", points.join(", "))
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, BoxError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

/// The JSON form of a value bound to a `json`/`jsonb` parameter.
fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Timestamp(at) => serde_json::Value::String(mapper::to_iso(at)),
        Value::Json(json) => json.clone(),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Number(n) => mapper::number(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::StringArray(items) => serde_json::Value::from(items.clone()),
        other => mapper::decode(None, other.clone()),
    }
}

/// Collects parameters for `query`/`execute`.
pub(crate) fn params(values: &[Value]) -> Vec<Param<'_>> {
    values.iter().map(Param).collect()
}

pub(crate) fn args<'a>(params: &'a [Param<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|param| param as &(dyn ToSql + Sync)).collect()
}

/// A `point` column.
struct PgPoint(Point);

impl<'a> FromSql<'a> for PgPoint {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<PgPoint, BoxError> {
        let (point, _) = read_point(raw)?;
        Ok(PgPoint(point))
    }

    accepts!(POINT);
}

/// A `polygon` column.
struct PgPolygon(Vec<Point>);

impl<'a> FromSql<'a> for PgPolygon {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<PgPolygon, BoxError> {
        let Some((len, mut rest)) = raw.split_first_chunk::<4>() else {
            return Err("polygon value is truncated".into());
        };
        let len = usize::try_from(i32::from_be_bytes(*len))?;

        let mut points = Vec::with_capacity(len);
        for _ in 0..len {
            let (point, tail) = read_point(rest)?;
            points.push(point);
            rest = tail;
        }
        Ok(PgPolygon(points))
    }

    accepts!(POLYGON);
}

fn read_point(raw: &[u8]) -> std::result::Result<(Point, &[u8]), BoxError> {
    let Some((x, rest)) = raw.split_first_chunk::<8>() else {
        return Err("point value is truncated".into());
    };
    let Some((y, rest)) = rest.split_first_chunk::<8>() else {
        return Err("point value is truncated".into());
    };
    let point = Point {
        x: f64::from_be_bytes(*x),
        y: f64::from_be_bytes(*y),
    };
    Ok((point, rest))
}

/// Reads column `index` of `row` by its column type.
pub(crate) fn decode(row: &Row, index: usize) -> Result<Value> {
    let ty = row.columns()[index].type_();

    fn get<'a, T: FromSql<'a>>(row: &'a Row, index: usize) -> Result<Option<T>> {
        row.try_get::<usize, Option<T>>(index).map_err(Error::driver)
    }

    // The type enum is not matchable, so each type is compared in turn.
    let value = if *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
    {
        get::<String>(row, index)?.map(Value::String)
    } else if *ty == Type::BOOL {
        get::<bool>(row, index)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        get::<i16>(row, index)?.map(|v| Value::Integer(v.into()))
    } else if *ty == Type::INT4 {
        get::<i32>(row, index)?.map(|v| Value::Integer(v.into()))
    } else if *ty == Type::INT8 {
        get::<i64>(row, index)?.map(Value::Integer)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, index)?.map(|v| Value::Number(v.into()))
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, index)?.map(Value::Number)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, index)?.map(Value::Timestamp)
    } else if *ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, index)?.map(|at| Value::Timestamp(at.and_utc()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<serde_json::Value>(row, index)?.map(Value::Json)
    } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
        get::<Vec<Option<String>>>(row, index)?
            .map(|items| Value::StringArray(items.into_iter().flatten().collect()))
    } else if *ty == Type::POINT {
        get::<PgPoint>(row, index)?.map(|point| Value::Point(point.0))
    } else if *ty == Type::POLYGON {
        get::<PgPolygon>(row, index)?.map(|polygon| Value::Polygon(polygon.0))
    } else {
        return Err(Error::internal_server_error(format!(
            "unsupported column type `{ty}` for column `{}`",
            row.columns()[index].name()
        )));
    };

    Ok(value.unwrap_or(Value::Null))
}
