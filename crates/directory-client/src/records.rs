//! Directory records moved by replication.
//!
//! Each record carries its natural identity as typed fields; everything else
//! is kept as an opaque attribute map and forwarded untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque attributes carried alongside a record's identity.
pub type Attributes = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub name: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationType {
    pub object_type: String,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// One unit of directory state read from an export stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportRecord {
    ObjectType(ObjectType),
    RelationType(RelationType),
    Permission(Permission),
    Object(Object),
    Relation(Relation),
}

/// Discriminant of [`ExportRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    ObjectType,
    RelationType,
    Permission,
    Object,
    Relation,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::ObjectType,
        RecordKind::RelationType,
        RecordKind::Permission,
        RecordKind::Object,
        RecordKind::Relation,
    ];

    /// Bit of this kind in [`ExportOptions`].
    pub const fn bit(self) -> u32 {
        match self {
            RecordKind::ObjectType => 1,
            RecordKind::RelationType => 1 << 1,
            RecordKind::Permission => 1 << 2,
            RecordKind::Object => 1 << 3,
            RecordKind::Relation => 1 << 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::ObjectType => "object_type",
            RecordKind::RelationType => "relation_type",
            RecordKind::Permission => "permission",
            RecordKind::Object => "object",
            RecordKind::Relation => "relation",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExportRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ExportRecord::ObjectType(_) => RecordKind::ObjectType,
            ExportRecord::RelationType(_) => RecordKind::RelationType,
            ExportRecord::Permission(_) => RecordKind::Permission,
            ExportRecord::Object(_) => RecordKind::Object,
            ExportRecord::Relation(_) => RecordKind::Relation,
        }
    }

    /// Natural identity of the record; upserts with the same key replace each other.
    pub fn key(&self) -> String {
        match self {
            ExportRecord::ObjectType(t) => format!("object_type:{}", t.name),
            ExportRecord::RelationType(r) => {
                format!("relation_type:{}#{}", r.object_type, r.name)
            }
            ExportRecord::Permission(p) => format!("permission:{}", p.name),
            ExportRecord::Object(o) => format!("object:{}:{}", o.object_type, o.id),
            ExportRecord::Relation(r) => format!(
                "relation:{}:{}#{}@{}:{}",
                r.object_type, r.object_id, r.relation, r.subject_type, r.subject_id
            ),
        }
    }
}

/// Bitmask of record kinds requested from an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportOptions(u32);

impl ExportOptions {
    pub const NONE: ExportOptions = ExportOptions(0);
    pub const ALL: ExportOptions = ExportOptions(
        RecordKind::ObjectType.bit()
            | RecordKind::RelationType.bit()
            | RecordKind::Permission.bit()
            | RecordKind::Object.bit()
            | RecordKind::Relation.bit(),
    );

    pub fn with(self, kind: RecordKind) -> Self {
        ExportOptions(self.0 | kind.bit())
    }

    pub fn contains(self, kind: RecordKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Request body of the streaming export call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub options: ExportOptions,
    /// Replication watermark; zero requests the full data set.
    pub start_from: u64,
    /// Server-side batching hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl ExportRequest {
    /// Full export of every record kind.
    pub fn full() -> Self {
        Self {
            options: ExportOptions::ALL,
            start_from: 0,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = (page_size > 0).then_some(page_size);
        self
    }
}

/// Whether an import line writes or removes its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpCode {
    Set,
    Delete,
}

/// One line of a bulk import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub op_code: OpCode,
    pub msg: ExportRecord,
}

/// Totals returned by a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub upserts: u64,
    pub deletes: u64,
}
