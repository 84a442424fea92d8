use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::contract::model::{Location, Person};

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"Hola": "mundo"}))]
pub struct Greeting {
    #[serde(rename = "Hola")]
    pub hola: String,
}

impl Default for Greeting {
    fn default() -> Self {
        Self {
            hola: "mundo".to_owned(),
        }
    }
}

/// Query string of `GET /person/detail`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShowPersonQuery {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    pub age: i64,
}

/// Response of `GET /person/detail`; `name` serializes as null when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"name": "Rocío", "age": 25}))]
pub struct PersonDetail {
    pub name: Option<String>,
    pub age: i64,
}

impl From<ShowPersonQuery> for PersonDetail {
    fn from(q: ShowPersonQuery) -> Self {
        Self {
            name: q.name,
            age: q.age,
        }
    }
}

/// `{person_id}` path segment shared by the `/person/...` routes.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct PersonPath {
    #[validate(range(exclusive_min = 0))]
    pub person_id: i64,
}

/// Body of `PUT /person/{person_id}`: both schemas side by side.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePersonReq {
    #[validate(nested)]
    pub person: Person,
    #[validate(nested)]
    pub location: Location,
}
