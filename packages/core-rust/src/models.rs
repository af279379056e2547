//! Entity models owned by the persistence store.
//!
//! The correlation layer never looks inside these; they cross the transport
//! as opaque JSON. Foreign keys are plain ids checked by the service façades.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Common shape of every persisted record.
pub trait Record: Clone + Send + Sync + Serialize + serde::de::DeserializeOwned + 'static {
    /// Human-readable entity name used in error messages ("Document", ...).
    const ENTITY: &'static str;

    /// Fields that must be present on create.
    const REQUIRED_FIELDS: &'static [&'static str];

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);

    /// Value that must be unique across all records of this type, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDocument {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for TypeDocument {
    const ENTITY: &'static str = "TypeDocument";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.name.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for Status {
    const ENTITY: &'static str = "Status";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.name.to_lowercase())
    }
}

/// A legal party (customer, supplier) that owns processes and invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub tax_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Record for Entity {
    const ENTITY: &'static str = "Entity";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "tax_id"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.tax_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub entity_id: u64,
    pub status_id: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub started_on: Option<NaiveDate>,
}

impl Record for Process {
    const ENTITY: &'static str = "Process";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "entity_id", "status_id"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    /// External document number, unique.
    pub number: String,
    pub type_document_id: u64,
    pub process_id: u64,
    pub status_id: u64,
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Record for Document {
    const ENTITY: &'static str = "Document";
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["title", "number", "type_document_id", "process_id", "status_id"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.number.clone())
    }
}

/// Link between a process and a document attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDocument {
    #[serde(default)]
    pub id: u64,
    pub process_id: u64,
    pub document_id: u64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Record for ProcessDocument {
    const ENTITY: &'static str = "ProcessDocument";
    const REQUIRED_FIELDS: &'static [&'static str] = &["process_id", "document_id"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("{}:{}", self.process_id, self.document_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub id: u64,
    pub number: String,
    pub entity_id: u64,
    #[serde(default)]
    pub process_id: Option<u64>,
    pub status_id: u64,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub issued_on: NaiveDate,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Record for Invoice {
    const ENTITY: &'static str = "Invoice";
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["number", "entity_id", "status_id", "amount", "issued_on"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.number.clone())
    }
}
