use std::collections::BTreeMap;

use utoipa::openapi::{schema::Schema, RefOr};

/// Outcome of adding one component schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    Identical,
    /// Different content under an existing name; the first one is kept.
    Conflict,
}

#[derive(Debug, Default, Clone)]
pub struct ComponentsRegistry {
    /// Component name -> schema (serialized to `components.schemas`).
    pub schemas: BTreeMap<String, RefOr<Schema>>,
}

impl ComponentsRegistry {
    pub fn register_schema(&mut self, name: impl Into<String>, schema: RefOr<Schema>) -> Registration {
        let name = name.into();
        let Some(existing) = self.schemas.get(&name) else {
            self.schemas.insert(name, schema);
            return Registration::Inserted;
        };

        let same = match (serde_json::to_value(existing), serde_json::to_value(&schema)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            Registration::Identical
        } else {
            Registration::Conflict
        }
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::openapi::schema::{ObjectBuilder, Type};

    fn object(prop: &str) -> RefOr<Schema> {
        RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .property(prop, ObjectBuilder::new().schema_type(Type::String))
                .build(),
        ))
    }

    #[test]
    fn first_registration_wins() {
        let mut reg = ComponentsRegistry::default();
        assert_eq!(reg.register_schema("A", object("x")), Registration::Inserted);
        assert_eq!(reg.register_schema("A", object("x")), Registration::Identical);
        assert_eq!(reg.register_schema("A", object("y")), Registration::Conflict);

        let kept = serde_json::to_value(&reg.schemas["A"]).unwrap();
        assert!(kept["properties"].get("x").is_some());
        assert!(reg.has_schema("A"));
        assert!(!reg.has_schema("B"));
    }
}
