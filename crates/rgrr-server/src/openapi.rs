//! OpenAPI 3.0 description of the REST API, served at `/swagger.json`.

use serde_json::{Map, Value, json};

use crate::handlers::MAX_BIN_COUNT;

/// OpenAPI version string of the document.
pub const OPENAPI_VERSION: &str = "3.0.2";

/// Build the OpenAPI document for every route in [`build_router`].
///
/// [`build_router`]: crate::router::build_router
pub fn document() -> Value {
    json!({
        "openapi": OPENAPI_VERSION,
        "info": {
            "title": "RGRR API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Rich-get-richer resource distribution simulations",
        },
        "paths": {
            "/health": health_path(),
            "/simulations": simulations_path(),
            "/simulations/{id}": simulation_path(),
            "/simulations/{id}/run": run_path(),
            "/simulations/{id}/histograms": histograms_path(),
            "/simulations/{id}/distributions": result_path(
                "Raw resources of every node, one array per epoch",
                "Distributions",
            ),
            "/simulations/{id}/stats": result_path("Per-epoch summary statistics", "Statistics"),
        },
        "components": {
            "schemas": {
                "SimulationRequest": request_schema(),
                "Operation": operation_schema(),
                "Error": {
                    "type": "object",
                    "properties": {
                        "error": { "type": "string" },
                        "status": { "type": "integer" },
                    },
                },
            },
        },
    })
}

fn health_path() -> Value {
    json!({
        "get": {
            "summary": "Liveness and simulation count",
            "responses": { "200": { "description": "Server is up" } },
        },
    })
}

fn simulations_path() -> Value {
    json!({
        "post": {
            "summary": "Create a simulation",
            "requestBody": {
                "required": true,
                "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/SimulationRequest" },
                } },
            },
            "responses": {
                "201": { "description": "Simulation created" },
                "400": error_response("Invalid configuration"),
            },
        },
        "get": {
            "summary": "List simulation ids",
            "responses": { "200": { "description": "Ids in ascending order" } },
        },
    })
}

fn simulation_path() -> Value {
    json!({
        "get": {
            "summary": "Configuration echo and lifecycle",
            "parameters": [id_parameter()],
            "responses": {
                "200": { "description": "Simulation" },
                "400": error_response("Invalid id"),
                "404": error_response("Simulation not found"),
            },
        },
    })
}

fn run_path() -> Value {
    let wait = json!({
        "in": "query",
        "name": "wait",
        "schema": { "type": "boolean", "default": true },
        "description": "Wait for the terminal status",
    });
    json!({
        "post": {
            "summary": "Execute a simulation",
            "parameters": [id_parameter(), wait],
            "responses": {
                "200": { "description": "Run completed" },
                "202": { "description": "Run triggered (wait=false)" },
                "400": error_response("Invalid id or query"),
                "404": error_response("Simulation not found"),
                "500": error_response("Run failed"),
            },
        },
    })
}

fn histograms_path() -> Value {
    let bin_count = json!({
        "in": "query",
        "name": "bin_count",
        "schema": { "type": "integer", "minimum": 1, "maximum": MAX_BIN_COUNT },
    });
    let normalization = json!({
        "in": "query",
        "name": "normalization",
        "schema": { "type": "string", "enum": ["count", "density"] },
    });
    json!({
        "get": {
            "summary": "Per-epoch histograms over shared bin edges",
            "parameters": [id_parameter(), bin_count, normalization],
            "responses": result_responses("Histograms"),
        },
    })
}

fn result_path(summary: &str, found: &str) -> Value {
    json!({
        "get": {
            "summary": summary,
            "parameters": [id_parameter()],
            "responses": result_responses(found),
        },
    })
}

fn request_schema() -> Value {
    json!({
        "type": "object",
        "required": ["nodes", "epochs"],
        "properties": {
            "nodes": { "type": "integer", "minimum": 1 },
            "epochs": { "type": "integer", "minimum": 0 },
            "resources_per_node": { "type": "integer", "minimum": 0, "default": 0 },
            "operations": {
                "type": "array",
                "items": { "$ref": "#/components/schemas/Operation" },
            },
            "seed": { "type": "integer", "minimum": 0 },
        },
    })
}

fn operation_schema() -> Value {
    let tax = json!({
        "type": "object",
        "required": ["type", "tax_rate"],
        "properties": {
            "type": { "type": "string", "enum": ["tax"] },
            "tax_rate": { "type": "number", "minimum": 0, "maximum": 1 },
        },
    });
    let expenditure = json!({
        "type": "object",
        "required": ["type", "expenditure"],
        "properties": {
            "type": { "type": "string", "enum": ["expenditure"] },
            "expenditure": { "type": "number", "minimum": 0 },
        },
    });
    json!({
        "oneOf": [
            attachment("preferential", &[]),
            attachment("random", &[]),
            attachment("uniform", &[]),
            attachment("specific", &["target_node"]),
            tax,
            expenditure,
        ],
        "discriminator": { "propertyName": "type" },
    })
}

fn id_parameter() -> Value {
    json!({
        "in": "path",
        "name": "id",
        "required": true,
        "schema": { "type": "string", "format": "uuid" },
        "description": "Simulation id",
    })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { "application/json": {
            "schema": { "$ref": "#/components/schemas/Error" },
        } },
    })
}

fn result_responses(found: &str) -> Value {
    json!({
        "200": { "description": found },
        "400": error_response("Invalid id or query"),
        "404": error_response("Simulation not found"),
        "409": error_response("Simulation has not completed"),
    })
}

fn attachment(kind: &str, extra: &[&str]) -> Value {
    let mut required = vec!["type", "resources_added"];
    required.extend_from_slice(extra);
    let mut properties = Map::new();
    properties.insert("type".to_owned(), json!({ "type": "string", "enum": [kind] }));
    for field in std::iter::once(&"resources_added").chain(extra) {
        properties.insert((*field).to_owned(), json!({ "type": "integer", "minimum": 0 }));
    }
    json!({ "type": "object", "required": required, "properties": properties })
}
