//! 📦 Common data structures: the building blocks of bulkstream
//!
//! 🎬 COLD OPEN. INT. BUFFER. 3:47 AM
//!
//! A record arrives. It has an index, a type, an id, and a body. It does not
//! know it is about to be split in two, filed into a queue next to a thousand
//! strangers, and shipped off to a cluster in one enormous envelope. Relatable.
//!
//! This module holds the humble types that ferry records from "somebody pushed
//! me" to "the bulk API accepted me":
//! - [`Record`]: one validated unit of work.
//! - [`BatchEntry`]: half of a record, as the bulk protocol sees it. Command first, payload second.
//! - [`BulkBatch`]: the envelope. Always an even number of entries. Always.
//! - [`Chunk`]: whatever the caller handed us, before we judged it.
//!
//! 🦆

use serde::Serialize;
use serde_json::{Value, json};

/// 🎯 A single record to index, after validation has had its way with it.
///
/// Every routing field is a non-empty string by the time one of these exists.
/// The writer never builds a `Record` out of malformed input, so holding one is proof
/// that the chunk survived parsing, validation, and our general suspicion of JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 📡 Target index. Where this document will live for the rest of its indexed life.
    pub index: String,
    /// 🏷️ Target type. `type` is a keyword, so `doc_type` it is. The borrow checker sends its regards.
    pub doc_type: String,
    /// 📎 The document's social security number within (index, type).
    pub id: String,
    /// 📦 The document body. Opaque. We do not read it. We do not judge it.
    pub data: Value,
}

impl Record {
    /// 🏗️ Build a record from parts. No validation here, that is the writer's job.
    pub fn new(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
            data,
        }
    }

    /// 🔪 Split the record into its bulk protocol pair: command descriptor, then payload.
    pub fn into_entries(self) -> [BatchEntry; 2] {
        [
            BatchEntry::Command {
                index: CommandDescriptor {
                    index: self.index,
                    doc_type: self.doc_type,
                    id: self.id,
                },
            },
            BatchEntry::Payload(self.data),
        ]
    }
}

/// 📋 Routing metadata that precedes a payload in a bulk batch.
///
/// Serializes with the underscore names the bulk API expects: `_index`, `_type`, `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDescriptor {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
}

/// 🧩 One element of the buffer. Records always occupy two of these, in this order:
///
/// ```text
/// {"index":{"_index":"people","_type":"person","_id":"1"}}   <- Command
/// {"name":"Ada"}                                            <- Payload
/// ```
///
/// The `index` field on `Command` is the bulk *action* name, not the index name.
/// Elasticsearch chose "index" for both. What's the DEAL with that?
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Command { index: CommandDescriptor },
    Payload(Value),
}

impl BatchEntry {
    /// 🔍 The command descriptor, if this entry is the first half of a pair.
    pub fn as_command(&self) -> Option<&CommandDescriptor> {
        match self {
            BatchEntry::Command { index } => Some(index),
            BatchEntry::Payload(_) => None,
        }
    }
}

/// 📦 A `BulkBatch`: the envelope handed to the downstream `bulk()` call.
///
/// Entries alternate command, payload, command, payload. Length is `2 * record_count()`.
/// You can't just send one document at a time. That would be like mailing
/// individual grains of rice. Technically possible. Deeply inefficient.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BulkBatch {
    pub entries: Vec<BatchEntry>,
}

impl BulkBatch {
    pub fn new(entries: Vec<BatchEntry>) -> Self {
        Self { entries }
    }

    /// 📊 Number of complete records (command + payload pairs) in the batch.
    pub fn record_count(&self) -> usize {
        self.entries.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 🔄 The ids of the records in this batch, in order. Handy for logs and assertions.
    pub fn ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(BatchEntry::as_command)
            .map(|command| command.id.as_str())
            .collect()
    }
}

/// 📨 Whatever the caller pushed at the writer, before parsing and validation.
///
/// Either already-structured JSON or a textual encoding of it. Both roads lead to
/// the same validation rules; the textual road has one more pothole (parsing).
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// 🧱 An already-decoded value. Hopefully an object. We'll see.
    Structured(Value),
    /// 📜 A JSON document as text, e.g. one line of an NDJSON file.
    Encoded(String),
}

impl From<Value> for Chunk {
    fn from(value: Value) -> Self {
        Chunk::Structured(value)
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Encoded(text)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Encoded(text.to_string())
    }
}

impl From<Record> for Chunk {
    fn from(record: Record) -> Self {
        Chunk::Structured(json!({
            "_index": record.index,
            "_type": record.doc_type,
            "_id": record.id,
            "data": record.data,
        }))
    }
}
