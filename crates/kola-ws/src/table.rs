//! A single mirrored table and its snapshot/delta reconciliation.

use crate::message::{Record, TableAction};
use kola_core::decimal_from_json;
use serde_json::Value;
use tracing::{debug, warn};

/// Table that is never truncated.
pub const ORDER_TABLE: &str = "order";

/// Local image of one server table.
#[derive(Debug, Clone)]
pub struct MirrorTable {
    name: String,
    keys: Vec<String>,
    records: Vec<Record>,
    seeded: bool,
    max_len: usize,
}

impl MirrorTable {
    #[must_use]
    pub fn new(name: impl Into<String>, max_len: usize) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            records: Vec::new(),
            seeded: false,
            max_len,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True once a `partial` was received.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Forget the image, readiness has to be earned again.
    pub fn reset(&mut self) {
        self.records.clear();
        self.seeded = false;
    }

    pub fn apply(&mut self, action: TableAction, data: Vec<Record>, keys: Vec<String>) {
        match action {
            TableAction::Partial => self.partial(data, keys),
            TableAction::Insert => self.insert(data),
            TableAction::Update => self.update(data),
            TableAction::Delete => self.delete(data),
        }
    }

    /// Replace the image and register the key fields.
    pub fn partial(&mut self, data: Vec<Record>, keys: Vec<String>) {
        debug!(table = %self.name, rows = data.len(), ?keys, "Partial received");
        self.records = data;
        self.keys = keys;
        self.seeded = true;
        self.trim();
    }

    pub fn insert(&mut self, data: Vec<Record>) {
        self.records.extend(data);
        self.trim();
    }

    /// Merge each delta into the record sharing its key fields.
    pub fn update(&mut self, data: Vec<Record>) {
        for delta in data {
            let Some(idx) = self.position(&delta) else {
                // Updates can outrun the partial for freshly created rows.
                debug!(table = %self.name, "Update for unknown record ignored");
                continue;
            };

            let record = &mut self.records[idx];
            for (field, value) in delta {
                record.insert(field, value);
            }

            if self.name == ORDER_TABLE && is_done(&self.records[idx]) {
                self.records.remove(idx);
            }
        }
    }

    pub fn delete(&mut self, data: Vec<Record>) {
        for needle in data {
            match self.position(&needle) {
                Some(idx) => {
                    self.records.remove(idx);
                }
                None => warn!(table = %self.name, "Delete for unknown record"),
            }
        }
    }

    fn position(&self, needle: &Record) -> Option<usize> {
        if self.keys.is_empty() {
            return None;
        }
        self.records.iter().position(|record| {
            self.keys
                .iter()
                .all(|key| record.get(key).is_some() && record.get(key) == needle.get(key))
        })
    }

    /// Drop the oldest half once over capacity, never below the cap.
    fn trim(&mut self) {
        if self.name == ORDER_TABLE || self.records.len() <= self.max_len {
            return;
        }
        let overflow = self.records.len() - self.max_len;
        let drop = overflow.max(self.max_len / 2);
        self.records.drain(..drop);
        debug!(table = %self.name, dropped = drop, kept = self.records.len(), "Table truncated");
    }
}

fn is_done(record: &Record) -> bool {
    record
        .get("leavesQty")
        .and_then(decimal_from_json)
        .is_some_and(|leaves| leaves <= rust_decimal::Decimal::ZERO)
}

/// Read a string field.
pub fn field_str<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}
