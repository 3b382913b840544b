//! The normative OpenAPI document for the HTTP API

use serde_json::{json, Value};

/// Build the OpenAPI 3 document as JSON.
pub fn document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "loko API",
            "description": "Architecture documentation API over a loko project tree.",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/health": {
                "get": {
                    "summary": "Liveness check",
                    "responses": {"200": {"description": "Service is up"}}
                }
            },
            "/api/v1/project": {
                "get": {
                    "summary": "Project metadata",
                    "responses": {
                        "200": {
                            "description": "Project name, version and counters",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Project"}}}
                        }
                    }
                }
            },
            "/api/v1/systems": {
                "get": {
                    "summary": "List systems",
                    "responses": {"200": {"description": "System summaries"}}
                }
            },
            "/api/v1/systems/{id}": {
                "get": {
                    "summary": "One system with containers and components",
                    "parameters": [{
                        "name": "id", "in": "path", "required": true,
                        "schema": {"type": "string"}
                    }],
                    "responses": {
                        "200": {"description": "System detail"},
                        "404": {"description": "Unknown system ID"}
                    }
                }
            },
            "/api/v1/build": {
                "post": {
                    "summary": "Start a documentation build",
                    "responses": {"202": {"description": "Build accepted; poll the status URL"}}
                }
            },
            "/api/v1/build/{id}": {
                "get": {
                    "summary": "Build status",
                    "parameters": [{
                        "name": "id", "in": "path", "required": true,
                        "schema": {"type": "string"}
                    }],
                    "responses": {
                        "200": {"description": "Status record with progress messages"},
                        "404": {"description": "Unknown build ID"}
                    }
                }
            },
            "/api/v1/validate": {
                "get": {
                    "summary": "Validate the architecture",
                    "parameters": [
                        {"name": "strict", "in": "query", "schema": {"type": "boolean"}},
                        {"name": "check_drift", "in": "query", "schema": {"type": "boolean"}}
                    ],
                    "responses": {"200": {"description": "Validation report"}}
                }
            }
        },
        "components": {
            "schemas": {
                "Project": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "version": {"type": "string"},
                        "systems": {"type": "integer"},
                        "source_dir": {"type": "string"},
                        "output_dir": {"type": "string"}
                    }
                }
            },
            "securitySchemes": {
                "bearer": {"type": "http", "scheme": "bearer"}
            }
        }
    })
}

pub fn as_yaml() -> String {
    serde_yaml::to_string(&document()).unwrap_or_default()
}
