use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::contract::model::{Location, Person, PersonOut};
use crate::domain::error::DomainError;

/// Stateless people service. Every call works on the values it is handed.
#[derive(Debug, Default)]
pub struct Service;

impl Service {
    pub fn new() -> Self {
        Self
    }

    pub fn create_person(&self, person: Person) -> PersonOut {
        PersonOut::from(person)
    }

    /// Flat view of a person overlaid with a location. Location fields win
    /// on name clashes.
    pub fn update_person(
        &self,
        person: Person,
        location: Location,
    ) -> Result<Map<String, Value>, DomainError> {
        overlay(&person, &location)
    }
}

/// Serialize both values to objects and insert `over`'s fields into `base`'s.
fn overlay<B: Serialize, O: Serialize>(base: &B, over: &O) -> Result<Map<String, Value>, DomainError> {
    let mut merged = to_object("person", base)?;
    for (key, value) in to_object("location", over)? {
        if merged.insert(key.clone(), value).is_some() {
            debug!(field = %key, "location field overrides person field");
        }
    }
    Ok(merged)
}

fn to_object<T: Serialize>(what: &'static str, value: &T) -> Result<Map<String, Value>, DomainError> {
    match serde_json::to_value(value).map_err(|e| DomainError::serialization(what, e))? {
        Value::Object(map) => Ok(map),
        _ => Err(DomainError::NotAnObject { what }),
    }
}
