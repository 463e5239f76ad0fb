//! Column data types declared in the knowledge base

use serde::{Deserialize, Serialize};
use sqlparser::ast::{CharacterLength, DataType, ExactNumberInfo, TimezoneInfo};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Internal representation of SQL column types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    // Numeric types
    SmallInt,
    Integer,
    BigInt,
    Decimal {
        precision: Option<u64>,
        scale: Option<u64>,
    },
    Real,
    DoublePrecision,

    // Character types
    Char {
        length: Option<u64>,
    },
    Varchar {
        length: Option<u64>,
    },
    Text,

    Blob,

    // Date/Time types
    Date,
    Time,
    Timestamp {
        with_timezone: bool,
    },

    Boolean,
    Uuid,
    Json,

    // Anything the parser does not recognise, kept as written
    Custom(String),
}

impl SqlType {
    /// Parse a type name as written in a knowledge base (e.g. `DECIMAL(10,2)`)
    pub fn parse(type_name: &str) -> Self {
        let dialect = GenericDialect {};
        let parsed = Parser::new(&dialect)
            .try_with_sql(type_name)
            .and_then(|mut parser| parser.parse_data_type());
        match parsed {
            Ok(data_type) => SqlType::from_ast(&data_type),
            Err(_) => SqlType::Custom(type_name.trim().to_string()),
        }
    }

    /// Convert from sqlparser's DataType to our internal SqlType
    pub fn from_ast(data_type: &DataType) -> Self {
        match data_type {
            DataType::TinyInt(_) | DataType::SmallInt(_) | DataType::Int2(_) => SqlType::SmallInt,
            DataType::Integer(_) | DataType::Int(_) | DataType::Int4(_) => SqlType::Integer,
            DataType::MediumInt(_) => SqlType::Integer,
            DataType::BigInt(_) | DataType::Int8(_) => SqlType::BigInt,

            DataType::Real | DataType::Float4 => SqlType::Real,
            DataType::Float(_) | DataType::Double | DataType::DoublePrecision | DataType::Float8 => {
                SqlType::DoublePrecision
            }

            DataType::Decimal(info) | DataType::Numeric(info) => {
                let (precision, scale) = match info {
                    ExactNumberInfo::None => (None, None),
                    ExactNumberInfo::Precision(p) => (Some(*p), None),
                    ExactNumberInfo::PrecisionAndScale(p, s) => (Some(*p), Some(*s)),
                };
                SqlType::Decimal { precision, scale }
            }

            DataType::Char(info) | DataType::Character(info) => SqlType::Char {
                length: char_length(info.as_ref()),
            },
            DataType::Varchar(info) | DataType::CharacterVarying(info) => SqlType::Varchar {
                length: char_length(info.as_ref()),
            },
            DataType::Text | DataType::String(_) => SqlType::Text,

            DataType::Bytea | DataType::Binary(_) | DataType::Varbinary(_) | DataType::Blob(_) => {
                SqlType::Blob
            }

            DataType::Date => SqlType::Date,
            DataType::Time(..) => SqlType::Time,
            DataType::Timestamp(_, tz) => SqlType::Timestamp {
                with_timezone: matches!(tz, TimezoneInfo::WithTimeZone),
            },
            DataType::Datetime(_) => SqlType::Timestamp {
                with_timezone: false,
            },

            DataType::Boolean | DataType::Bool => SqlType::Boolean,
            DataType::Uuid => SqlType::Uuid,
            DataType::JSON | DataType::JSONB => SqlType::Json,

            DataType::Custom(name, _) => {
                let type_name = name
                    .0
                    .iter()
                    .map(|i| i.value.clone())
                    .collect::<Vec<_>>()
                    .join(".");
                match type_name.to_lowercase().as_str() {
                    "serial" | "serial4" => SqlType::Integer,
                    "bigserial" | "serial8" => SqlType::BigInt,
                    _ => SqlType::Custom(type_name),
                }
            }

            other => SqlType::Custom(other.to_string()),
        }
    }

    /// Get a human-readable name for this type
    pub fn display_name(&self) -> String {
        match self {
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("DECIMAL({p},{s})"),
                (Some(p), None) => format!("DECIMAL({p})"),
                _ => "DECIMAL".to_string(),
            },
            SqlType::Real => "REAL".to_string(),
            SqlType::DoublePrecision => "DOUBLE PRECISION".to_string(),
            SqlType::Char { length: Some(l) } => format!("CHAR({l})"),
            SqlType::Char { length: None } => "CHAR".to_string(),
            SqlType::Varchar { length: Some(l) } => format!("VARCHAR({l})"),
            SqlType::Varchar { length: None } => "VARCHAR".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp {
                with_timezone: true,
            } => "TIMESTAMP WITH TIME ZONE".to_string(),
            SqlType::Timestamp { .. } => "TIMESTAMP".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Custom(name) => name.clone(),
        }
    }

    /// SQLite column affinity used when the sandbox materializes the schema
    pub fn sqlite_affinity(&self) -> &'static str {
        match self {
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt | SqlType::Boolean => "INTEGER",
            SqlType::Real | SqlType::DoublePrecision => "REAL",
            SqlType::Decimal { .. } => "NUMERIC",
            SqlType::Blob => "BLOB",
            SqlType::Char { .. }
            | SqlType::Varchar { .. }
            | SqlType::Text
            | SqlType::Date
            | SqlType::Time
            | SqlType::Timestamp { .. }
            | SqlType::Uuid
            | SqlType::Json
            | SqlType::Custom(_) => "TEXT",
        }
    }
}

impl Default for SqlType {
    fn default() -> Self {
        SqlType::Varchar { length: None }
    }
}

fn char_length(info: Option<&CharacterLength>) -> Option<u64> {
    info.and_then(|i| match i {
        CharacterLength::IntegerLength { length, .. } => Some(*length),
        CharacterLength::Max => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_type_names() {
        assert_eq!(SqlType::parse("INTEGER"), SqlType::Integer);
        assert_eq!(
            SqlType::parse("VARCHAR(50)"),
            SqlType::Varchar { length: Some(50) }
        );
        assert_eq!(
            SqlType::parse("DECIMAL(10,2)"),
            SqlType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(SqlType::parse("date"), SqlType::Date);
    }

    #[test]
    fn test_unparseable_type_is_kept_verbatim() {
        assert_eq!(SqlType::parse("%%%"), SqlType::Custom("%%%".to_string()));
    }

    #[test]
    fn test_display_and_affinity() {
        let decimal = SqlType::parse("NUMERIC(12, 2)");
        assert_eq!(decimal.display_name(), "DECIMAL(12,2)");
        assert_eq!(decimal.sqlite_affinity(), "NUMERIC");
        assert_eq!(SqlType::parse("VARCHAR(100)").sqlite_affinity(), "TEXT");
        assert_eq!(SqlType::default().display_name(), "VARCHAR");
    }
}
