use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::error::{Error, Result};
use crate::types::ColumnType;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_INPUT_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A single cell of a result-set row, or a property value of a feature.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i32),
    LongInteger(i64),
    Double(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::LongInteger(_) => "long integer",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Convert the value so that it can be stored in a field of `target` type.
    ///
    /// `Null` is accepted by every type.
    pub fn coerce_to(&self, target: ColumnType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        match target {
            ColumnType::Text => Ok(Value::Text(self.to_text())),
            ColumnType::Integer => {
                let value = self.to_i64(target)?;
                i32::try_from(value)
                    .map(Value::Integer)
                    .map_err(|_| Error::ValueOutOfRange { target: "i32" })
            }
            ColumnType::LongInteger => self.to_i64(target).map(Value::LongInteger),
            ColumnType::Double => match self {
                Self::Integer(v) => Ok(Value::Double(f64::from(*v))),
                Self::LongInteger(v) => Ok(Value::Double(*v as f64)),
                Self::Double(v) => Ok(Value::Double(*v)),
                Self::Text(text) => text
                    .trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| self.mismatch(target)),
                _ => Err(self.mismatch(target)),
            },
            ColumnType::Boolean => match self {
                Self::Boolean(v) => Ok(Value::Boolean(*v)),
                Self::Integer(0) | Self::LongInteger(0) => Ok(Value::Boolean(false)),
                Self::Integer(1) | Self::LongInteger(1) => Ok(Value::Boolean(true)),
                Self::Text(text) => parse_bool(text)
                    .map(Value::Boolean)
                    .ok_or_else(|| self.mismatch(target)),
                _ => Err(self.mismatch(target)),
            },
            ColumnType::DateTime => match self {
                Self::Timestamp(v) => Ok(Value::Timestamp(*v)),
                Self::Date(v) => Ok(Value::Timestamp(v.and_time(NaiveTime::MIN))),
                Self::Text(text) => parse_datetime(text)
                    .map(Value::Timestamp)
                    .ok_or_else(|| self.mismatch(target)),
                _ => Err(self.mismatch(target)),
            },
            ColumnType::Date => match self {
                Self::Date(v) => Ok(Value::Date(*v)),
                Self::Timestamp(v) => Ok(Value::Date(v.date())),
                Self::Text(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|_| self.mismatch(target)),
                _ => Err(self.mismatch(target)),
            },
        }
    }

    /// Read a stored property back according to the declared field type.
    pub(crate) fn from_sql(column_type: ColumnType, value: ValueRef<'_>) -> Result<Value> {
        let actual = value.data_type();
        let mismatch = || Error::ValueTypeMismatch {
            expected: column_type.name(),
            actual: sql_type_name(actual),
        };

        let value = match (column_type, value) {
            (_, ValueRef::Null) => Value::Null,
            (ColumnType::Integer, ValueRef::Integer(v)) => Value::Integer(
                i32::try_from(v).map_err(|_| Error::ValueOutOfRange { target: "i32" })?,
            ),
            (ColumnType::LongInteger, ValueRef::Integer(v)) => Value::LongInteger(v),
            (ColumnType::Double, ValueRef::Real(v)) => Value::Double(v),
            (ColumnType::Double, ValueRef::Integer(v)) => Value::Double(v as f64),
            (ColumnType::Boolean, ValueRef::Integer(v)) => Value::Boolean(v != 0),
            (ColumnType::Text, ValueRef::Text(bytes)) => {
                Value::Text(String::from_utf8_lossy(bytes).into_owned())
            }
            (ColumnType::DateTime, ValueRef::Text(bytes)) => Value::Timestamp(
                parse_datetime(&String::from_utf8_lossy(bytes)).ok_or_else(mismatch)?,
            ),
            (ColumnType::Date, ValueRef::Text(bytes)) => Value::Date(
                NaiveDate::parse_from_str(&String::from_utf8_lossy(bytes), DATE_FORMAT)
                    .map_err(|_| mismatch())?,
            ),
            _ => return Err(mismatch()),
        };
        Ok(value)
    }

    fn to_i64(&self, target: ColumnType) -> Result<i64> {
        match self {
            Self::Integer(v) => Ok(i64::from(*v)),
            Self::LongInteger(v) => Ok(*v),
            Self::Text(text) => text.trim().parse::<i64>().map_err(|_| self.mismatch(target)),
            _ => Err(self.mismatch(target)),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(v) => v.clone(),
            Self::Integer(v) => v.to_string(),
            Self::LongInteger(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::Timestamp(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Self::Date(v) => v.format(DATE_FORMAT).to_string(),
        }
    }

    fn mismatch(&self, target: ColumnType) -> Error {
        Error::ValueTypeMismatch {
            expected: target.name(),
            actual: self.type_name(),
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Text(v) => SqlValue::Text(v.clone()),
            Value::Integer(v) => SqlValue::Integer(i64::from(*v)),
            Value::LongInteger(v) => SqlValue::Integer(*v),
            Value::Double(v) => SqlValue::Real(*v),
            Value::Boolean(v) => SqlValue::Integer(i64::from(*v)),
            Value::Timestamp(v) => SqlValue::Text(v.format(DATETIME_FORMAT).to_string()),
            Value::Date(v) => SqlValue::Text(v.format(DATE_FORMAT).to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::LongInteger(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.naive_utc());
    }

    // GeoPackage DATETIME values carry a trailing `Z` without an offset.
    let text = text.strip_suffix('Z').unwrap_or(text);
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

fn sql_type_name(data_type: rusqlite::types::Type) -> &'static str {
    match data_type {
        rusqlite::types::Type::Null => "null",
        rusqlite::types::Type::Integer => "integer",
        rusqlite::types::Type::Real => "real",
        rusqlite::types::Type::Text => "text",
        rusqlite::types::Type::Blob => "blob",
    }
}
