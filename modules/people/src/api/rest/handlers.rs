use std::sync::Arc;

use axum::{response::Json, Extension};
use modkit::{ProblemResponse, ValidJson, ValidPath, ValidQuery};
use serde_json::{Map, Value};
use tracing::info;

use crate::api::rest::dto::{Greeting, PersonDetail, PersonPath, ShowPersonQuery, UpdatePersonReq};
use crate::contract::model::{Location, Person, PersonOut};
use crate::domain::service::Service;

pub async fn home() -> Json<Greeting> {
    info!("Greeting caller");
    Json(Greeting::default())
}

/// Echo a new person back without the password
pub async fn create_person(
    Extension(svc): Extension<Arc<Service>>,
    ValidJson(person): ValidJson<Person>,
) -> Json<PersonOut> {
    info!(first_name = %person.first_name, age = person.age, "Creating person");
    Json(svc.create_person(person))
}

pub async fn show_person(ValidQuery(query): ValidQuery<ShowPersonQuery>) -> Json<PersonDetail> {
    info!(name = ?query.name, age = query.age, "Showing person detail");
    Json(PersonDetail::from(query))
}

/// Existence check keyed by the id itself
pub async fn show_person_by_id(
    ValidPath(path): ValidPath<PersonPath>,
) -> Json<Map<String, Value>> {
    info!(person_id = path.person_id, "Showing person by id");
    let mut body = Map::new();
    body.insert(path.person_id.to_string(), Value::from("It exists"));
    Json(body)
}

pub async fn update_location(
    ValidPath(path): ValidPath<PersonPath>,
    ValidJson(location): ValidJson<Location>,
) -> Json<Location> {
    info!(person_id = path.person_id, city = %location.city, "Updating location");
    Json(location)
}

/// Merge person and location into one flat object
pub async fn update_person(
    Extension(svc): Extension<Arc<Service>>,
    ValidPath(path): ValidPath<PersonPath>,
    ValidJson(req): ValidJson<UpdatePersonReq>,
) -> Result<Json<Map<String, Value>>, ProblemResponse> {
    info!(person_id = path.person_id, "Updating person");
    let merged = svc.update_person(req.person, req.location)?;
    Ok(Json(merged))
}
