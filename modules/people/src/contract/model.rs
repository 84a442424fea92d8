//! Wire schemas for people and their locations.
//!
//! `Person` is the writable variant (carries a password), `PersonOut` is the
//! output-safe variant with the same profile fields and no password.

use chrono::{Local, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HairColor {
    White,
    Brown,
    Black,
    Blonde,
    Red,
}

/// Calendar date strictly before today (local time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PastDate(NaiveDate);

impl PastDate {
    pub fn new(date: NaiveDate) -> Option<Self> {
        (date < Local::now().date_naive()).then_some(Self(date))
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl<'de> Deserialize<'de> for PastDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let date = NaiveDate::deserialize(deserializer)?;
        Self::new(date).ok_or_else(|| {
            de::Error::custom(format!("date should be in the past, got {date}"))
        })
    }
}

/// Birthday used when the field is absent (explicit `null` stays null).
pub fn default_birthday() -> Option<PastDate> {
    NaiveDate::from_ymd_opt(2000, 1, 1).map(PastDate)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "first_name": "Facundo",
    "last_name": "García Martoni",
    "age": 21,
    "hair_color": "blonde",
    "is_married": false,
    "email": "facundo@example.com",
    "birthday": "2003-04-12",
    "credit_card": "4111111111111111",
    "password": "holasoyfacundo"
}))]
pub struct Person {
    #[validate(length(min = 1, max = 50))]
    #[schema(min_length = 1, max_length = 50, example = "Facundo")]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    #[schema(min_length = 1, max_length = 50, example = "García Martoni")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient::integer")]
    #[validate(range(exclusive_min = 0, max = 115))]
    #[schema(exclusive_minimum = 0, maximum = 115, example = 21)]
    pub age: i64,
    #[serde(default)]
    pub hair_color: Option<HairColor>,
    #[serde(default, deserialize_with = "lenient::optional_bool")]
    #[schema(example = false)]
    pub is_married: Option<bool>,
    #[serde(default)]
    #[validate(email)]
    #[schema(format = Email, example = "facundo@example.com")]
    pub email: Option<String>,
    #[serde(default = "default_birthday")]
    #[schema(value_type = Option<String>, format = Date, default = "2000-01-01", example = "2003-04-12")]
    pub birthday: Option<PastDate>,
    #[serde(default)]
    #[validate(credit_card)]
    #[schema(example = "4111111111111111")]
    pub credit_card: Option<String>,
    #[validate(length(min = 8))]
    #[schema(min_length = 8, write_only, example = "holasoyfacundo")]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "first_name": "Facundo",
    "last_name": "García Martoni",
    "age": 21,
    "hair_color": "blonde",
    "is_married": false,
    "email": "facundo@example.com",
    "birthday": "2003-04-12",
    "credit_card": "4111111111111111"
}))]
pub struct PersonOut {
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub hair_color: Option<HairColor>,
    pub is_married: Option<bool>,
    pub email: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub birthday: Option<PastDate>,
    pub credit_card: Option<String>,
}

impl From<Person> for PersonOut {
    fn from(p: Person) -> Self {
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            age: p.age,
            hair_color: p.hair_color,
            is_married: p.is_married,
            email: p.email,
            birthday: p.birthday,
            credit_card: p.credit_card,
        }
    }
}

/// Scalar coercion for JSON bodies: integers also arrive as whole floats or
/// numeric strings, booleans as `"true"`/`"false"`/`"1"`/`"0"`.
mod lenient {
    use serde::de::{self, Deserializer, Unexpected, Visitor};
    use std::fmt;

    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(IntegerVisitor)
    }

    pub fn optional_bool<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<bool>, D::Error> {
        deserializer.deserialize_any(OptionalBoolVisitor)
    }

    struct IntegerVisitor;

    impl<'de> Visitor<'de> for IntegerVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            // whole numbers within i64 range only
            if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    struct OptionalBoolVisitor;

    impl<'de> Visitor<'de> for OptionalBoolVisitor {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean or null")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Option<bool>, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Option<bool>, E> {
            Ok(None)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Option<bool>, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Option<bool>, E> {
            match v {
                0 => Ok(Some(false)),
                1 => Ok(Some(true)),
                _ => Err(E::invalid_value(Unexpected::Signed(v), &self)),
            }
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Option<bool>, E> {
            match v {
                0 => Ok(Some(false)),
                1 => Ok(Some(true)),
                _ => Err(E::invalid_value(Unexpected::Unsigned(v), &self)),
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Option<bool>, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(E::invalid_value(Unexpected::Str(v), &self)),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "city": "Guadalajara",
    "state": "Jalisco",
    "country": "México"
}))]
pub struct Location {
    #[schema(example = "Guadalajara")]
    pub city: String,
    #[schema(example = "Jalisco")]
    pub state: String,
    #[schema(example = "México")]
    pub country: String,
}
