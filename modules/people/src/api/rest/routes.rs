use axum::{Extension, Router};
use modkit::api::{Missing, OpenApiRegistry, OperationBuilder};
use std::sync::Arc;

use crate::api::rest::{dto, handlers};
use crate::contract::model;
use crate::domain::service::Service;

const PERSON_ID_DESC: &str = "This is the person id. It's required and it must be greater than 0";

pub fn register_routes(
    mut router: Router,
    openapi: &dyn OpenApiRegistry,
    service: Arc<Service>,
) -> anyhow::Result<Router> {
    // GET / - Greeting
    router = OperationBuilder::<Missing, Missing, ()>::get("/")
        .operation_id("people.home")
        .summary("Say hello")
        .tag("home")
        .handler(handlers::home)
        .json_response_with_schema::<dto::Greeting>(openapi, 200, "Greeting")
        .problem_response(openapi, 500, "Internal Server Error")
        .register(router, openapi);

    // POST /person/new - Create a person
    router = OperationBuilder::<Missing, Missing, ()>::post("/person/new")
        .operation_id("people.create_person")
        .summary("Create person")
        .description("Validate a person and return it without the password")
        .tag("people")
        .json_request::<model::Person>(openapi, "Person to create")
        .handler(handlers::create_person)
        .json_response_with_schema::<model::PersonOut>(openapi, 200, "Created person")
        .standard_errors(openapi)
        .register(router, openapi);

    // GET /person/detail - Person detail from the query string
    router = OperationBuilder::<Missing, Missing, ()>::get("/person/detail")
        .operation_id("people.show_person")
        .summary("Show person")
        .description("Echo the person name and age given in the query string")
        .tag("people")
        .query_param(
            "name",
            false,
            "This is the person name. It's between 1 and 50 characters",
        )
        .query_param_typed("age", true, "This is the person age. It's required", "integer")
        .handler(handlers::show_person)
        .json_response_with_schema::<dto::PersonDetail>(openapi, 200, "Person detail")
        .standard_errors(openapi)
        .register(router, openapi);

    // GET /person/details/{person_id} - Existence check
    router = OperationBuilder::<Missing, Missing, ()>::get("/person/details/{person_id}")
        .operation_id("people.show_person_by_id")
        .summary("Show person by id")
        .tag("people")
        .path_param_typed("person_id", PERSON_ID_DESC, "integer")
        .handler(handlers::show_person_by_id)
        .json_response(200, "Object keyed by the person id")
        .standard_errors(openapi)
        .register(router, openapi);

    // PUT /person/details/{person_id} - Update a location
    router = OperationBuilder::<Missing, Missing, ()>::put("/person/details/{person_id}")
        .operation_id("people.update_location")
        .summary("Update location")
        .tag("people")
        .path_param_typed("person_id", PERSON_ID_DESC, "integer")
        .json_request::<model::Location>(openapi, "New location")
        .handler(handlers::update_location)
        .json_response_with_schema::<model::Location>(openapi, 200, "Updated location")
        .standard_errors(openapi)
        .register(router, openapi);

    // PUT /person/{person_id} - Update a person together with its location
    router = OperationBuilder::<Missing, Missing, ()>::put("/person/{person_id}")
        .operation_id("people.update_person")
        .summary("Update person")
        .description("Merge person and location into one object; location fields win")
        .tag("people")
        .path_param_typed("person_id", PERSON_ID_DESC, "integer")
        .json_request::<dto::UpdatePersonReq>(openapi, "Person and location")
        .handler(handlers::update_person)
        .json_response(200, "Merged person and location")
        .standard_errors(openapi)
        .register(router, openapi);

    router = router.layer(Extension(service));

    Ok(router)
}
