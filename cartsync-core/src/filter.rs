//! Field allow-list applied to retailer records before submission.
//!
//! Raw records carry payment, address and account data the inventory service
//! has no business seeing. Only the fields listed here cross the boundary;
//! [`ImportRecord`] can only be built through [`filter_record`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::RecordDetail;

/// Record-level fields the inventory service accepts.
pub const RECORD_FIELDS: &[&str] = &[
    "orderId",
    "orderDate",
    "orderTotal",
    "currency",
    "seller",
    "items",
];

/// Line-item fields the inventory service accepts.
pub const ITEM_FIELDS: &[&str] = &[
    "name",
    "productId",
    "quantity",
    "unitPrice",
    "productUrl",
    "imageUrl",
];

/// A record reduced to allow-listed fields. Serializes as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ImportRecord(Map<String, Value>);

impl ImportRecord {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Keep only allow-listed fields of `record`, including inside each line item.
///
/// Line items keep their order; entries that are not JSON objects are dropped.
pub fn filter_record(record: &RecordDetail) -> ImportRecord {
    let mut out = Map::new();
    for &key in RECORD_FIELDS {
        let Some(value) = record.get(key) else { continue };
        if key == "items" {
            out.insert(key.to_string(), Value::Array(filter_items(value)));
        } else {
            out.insert(key.to_string(), value.clone());
        }
    }
    ImportRecord(out)
}

fn filter_items(value: &Value) -> Vec<Value> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let kept: Map<String, Value> = ITEM_FIELDS
                .iter()
                .filter_map(|&key| item.get(key).map(|v| (key.to_string(), v.clone())))
                .collect();
            Value::Object(kept)
        })
        .collect()
}
