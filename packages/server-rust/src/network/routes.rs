//! Static REST route table: every method + path maps to exactly one topic.

use axum::http::StatusCode;
use axum::routing::MethodFilter;
use dossier_core::{TopicError, TopicName};
use serde_json::{json, Map, Value};

/// REST path segment -> topic resource.
pub const RESOURCES: &[(&str, &str)] = &[
    ("documents", "documents"),
    ("type-documents", "typeDocuments"),
    ("processes", "processes"),
    ("process-documents", "processDocuments"),
    ("statuses", "statuses"),
    ("entities", "entities"),
    ("invoices", "invoices"),
];

/// Relational lookups: (REST path segment, sub-path, topic resource,
/// operation, payload field).
pub const LOOKUPS: &[(&str, &str, &str, &str, &str)] = &[
    ("documents", "by-process", "documents", "find-by-process", "process_id"),
    (
        "process-documents",
        "by-process",
        "processDocuments",
        "find-by-process",
        "process_id",
    ),
    ("invoices", "by-entity", "invoices", "find-by-entity", "entity_id"),
    ("processes", "by-entity", "processes", "find-by-entity", "entity_id"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    #[must_use]
    pub fn filter(self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Delete => MethodFilter::DELETE,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// How a route turns the HTTP request into a topic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// JSON body forwarded as-is.
    Create,
    /// Empty object.
    FindAll,
    /// `{"id": <path id>}`.
    FindById,
    /// JSON body with `"id"` set from the path.
    Update,
    /// `{"id": <path id>}`.
    Delete,
    /// `{<field>: <path id>}`.
    Lookup(&'static str),
}

impl Action {
    /// Whether the path carries an `{id}` segment.
    #[must_use]
    pub fn takes_id(self) -> bool {
        !matches!(self, Self::Create | Self::FindAll)
    }

    /// Whether the request body is read.
    #[must_use]
    pub fn takes_body(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }

    /// Status code of a successful reply.
    #[must_use]
    pub fn success_status(self) -> StatusCode {
        match self {
            Self::Create => StatusCode::CREATED,
            _ => StatusCode::OK,
        }
    }

    /// Builds the topic payload. `body` must already be a JSON object when
    /// the action takes one.
    #[must_use]
    pub fn payload(self, id: Option<u64>, body: Map<String, Value>) -> Value {
        match (self, id) {
            (Self::Create, _) => Value::Object(body),
            (Self::FindAll, _) => json!({}),
            (Self::Update, Some(id)) => {
                let mut body = body;
                body.insert("id".to_string(), Value::from(id));
                Value::Object(body)
            }
            (Self::FindById | Self::Delete, Some(id)) => json!({ "id": id }),
            (Self::Lookup(field), Some(id)) => {
                let mut payload = Map::new();
                payload.insert(field.to_string(), Value::from(id));
                Value::Object(payload)
            }
            (_, None) => json!({}),
        }
    }
}

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub verb: Verb,
    pub path: String,
    pub topic: TopicName,
    pub action: Action,
}

/// Builds the full route table: five CRUD routes per resource plus the
/// relational lookups.
///
/// # Errors
///
/// Returns `TopicError` if a resource or operation name is malformed.
pub fn route_table() -> Result<Vec<Route>, TopicError> {
    let mut routes = Vec::with_capacity(RESOURCES.len() * 5 + LOOKUPS.len());
    for (segment, resource) in RESOURCES {
        let collection = format!("/api/{segment}");
        let item = format!("/api/{segment}/{{id}}");
        for (verb, path, operation, action) in [
            (Verb::Post, &collection, "create", Action::Create),
            (Verb::Get, &collection, "find-all", Action::FindAll),
            (Verb::Get, &item, "find-by-id", Action::FindById),
            (Verb::Put, &item, "update", Action::Update),
            (Verb::Delete, &item, "delete", Action::Delete),
        ] {
            routes.push(Route {
                verb,
                path: path.clone(),
                topic: TopicName::from_parts(resource, operation)?,
                action,
            });
        }
    }
    for (segment, sub, resource, operation, field) in LOOKUPS {
        routes.push(Route {
            verb: Verb::Get,
            path: format!("/api/{segment}/{sub}/{{id}}"),
            topic: TopicName::from_parts(resource, operation)?,
            action: Action::Lookup(*field),
        });
    }
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_method_and_path_is_unique() {
        let routes = route_table().unwrap();
        assert_eq!(routes.len(), 7 * 5 + 4);
        let keys: HashSet<(&str, &str)> = routes
            .iter()
            .map(|r| (r.verb.as_str(), r.path.as_str()))
            .collect();
        assert_eq!(keys.len(), routes.len());
        let topics: HashSet<&TopicName> = routes.iter().map(|r| &r.topic).collect();
        assert_eq!(topics.len(), routes.len());
    }

    #[test]
    fn kebab_paths_map_to_camel_case_topics() {
        let routes = route_table().unwrap();
        let route = routes
            .iter()
            .find(|r| r.verb == Verb::Get && r.path == "/api/type-documents/{id}")
            .unwrap();
        assert_eq!(route.topic.as_str(), "typeDocuments.find-by-id");

        let lookup = routes
            .iter()
            .find(|r| r.path == "/api/process-documents/by-process/{id}")
            .unwrap();
        assert_eq!(lookup.topic.as_str(), "processDocuments.find-by-process");
        assert_eq!(lookup.action, Action::Lookup("process_id"));
    }

    #[test]
    fn payloads_carry_the_path_id() {
        let mut body = Map::new();
        body.insert("name".to_string(), json!("Acme"));
        body.insert("id".to_string(), json!(42));

        assert_eq!(
            Action::Update.payload(Some(7), body.clone()),
            json!({"id": 7, "name": "Acme"})
        );
        assert_eq!(Action::Delete.payload(Some(7), Map::new()), json!({"id": 7}));
        assert_eq!(
            Action::Lookup("entity_id").payload(Some(3), Map::new()),
            json!({"entity_id": 3})
        );
        assert_eq!(Action::Create.payload(None, body.clone()), Value::Object(body));
        assert_eq!(Action::Create.success_status(), StatusCode::CREATED);
        assert_eq!(Action::Delete.success_status(), StatusCode::OK);
    }
}
