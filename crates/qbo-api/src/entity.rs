//! Entity types accepted by `create` and their QBO field mapping
//!
//! Callers send loose JSON (`name`, `email`, `unitPrice`, ...). This module
//! turns it into the PascalCase shapes QBO expects. Mapping is pure: unknown
//! keys are ignored and missing or wrongly typed values are left unset, so
//! the downstream API decides what is required.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

/// Entity type name that is not one of the supported kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported entity type: {0}")]
pub struct UnsupportedEntity(pub String);

/// The closed set of creatable entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Customer,
    Item,
    Invoice,
}

impl EntityKind {
    /// Lowercase name, also the REST path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Item => "item",
            Self::Invoice => "invoice",
        }
    }

    /// Key the created object sits under in the REST response.
    pub fn response_key(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Item => "Item",
            Self::Invoice => "Invoice",
        }
    }
}

impl FromStr for EntityKind {
    type Err = UnsupportedEntity;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "item" => Ok(Self::Item),
            "invoice" => Ok(Self::Invoice),
            _ => Err(UnsupportedEntity(s.to_string())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Customer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email_addr: Option<EmailAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_phone: Option<TelephoneNumber>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailAddress {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelephoneNumber {
    pub free_form_number: String,
}

/// Items are always created as inventory items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Invoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_ref: Option<Reference>,
}

/// QBO reference type: `{"value": "<id>"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub value: String,
}

/// A mapped entity, ready to serialize as a create request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Customer(Customer),
    Item(Item),
    Invoice(Invoice),
}

impl Entity {
    pub fn from_payload(kind: EntityKind, payload: &Map<String, Value>) -> Self {
        match kind {
            EntityKind::Customer => Self::Customer(Customer {
                display_name: string_field(payload, "name"),
                primary_email_addr: string_field(payload, "email")
                    .map(|address| EmailAddress { address }),
                primary_phone: string_field(payload, "phone")
                    .map(|free_form_number| TelephoneNumber { free_form_number }),
            }),
            EntityKind::Item => Self::Item(Item {
                name: string_field(payload, "name"),
                item_type: "Inventory".to_string(),
                unit_price: payload.get("unitPrice").and_then(Value::as_f64),
            }),
            EntityKind::Invoice => Self::Invoice(Invoice {
                customer_ref: id_field(payload, "customerId").map(|value| Reference { value }),
            }),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Customer(_) => EntityKind::Customer,
            Self::Item(_) => EntityKind::Item,
            Self::Invoice(_) => EntityKind::Invoice,
        }
    }
}

fn string_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Ids may arrive as strings or bare numbers; QBO wants strings.
fn id_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
