//! Decoded shapes for the well-known Bolt structures (spec.md §6), plus the registration of
//! their tags into a [`Registry`].
//!
//! Typed record accessors sit outside this crate's scope, but the decoded shapes themselves —
//! field counts and names — are pinned down by spec.md §6, so they live here as plain structs
//! with `TryFrom<Structure>` impls.

use crate::packstream::{Dict, Registry, Structure, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure converting a decoded [`Structure`] into one of the well-known graph/temporal/spatial
/// shapes. The registry already guarantees the field *count* is one of the registered options;
/// this error covers a field being the wrong *type*.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {struct_name}: {reason}")]
pub struct GraphConversionError {
    struct_name: &'static str,
    reason: String,
}

fn err(struct_name: &'static str, reason: impl Into<String>) -> GraphConversionError {
    GraphConversionError {
        struct_name,
        reason: reason.into(),
    }
}

fn field(
    fields: &[Value],
    idx: usize,
    struct_name: &'static str,
) -> Result<&Value, GraphConversionError> {
    fields
        .get(idx)
        .ok_or_else(|| err(struct_name, format!("missing field {idx}")))
}

fn as_int(v: &Value, struct_name: &'static str) -> Result<i64, GraphConversionError> {
    v.as_int()
        .ok_or_else(|| err(struct_name, "expected an integer field"))
}

fn as_float(v: &Value, struct_name: &'static str) -> Result<f64, GraphConversionError> {
    match v {
        Value::Float(f) => Ok(*f),
        _ => Err(err(struct_name, "expected a float field")),
    }
}

fn as_string(v: &Value, struct_name: &'static str) -> Result<String, GraphConversionError> {
    v.as_str()
        .map(str::to_owned)
        .ok_or_else(|| err(struct_name, "expected a string field"))
}

fn as_dict(v: &Value, struct_name: &'static str) -> Result<Dict, GraphConversionError> {
    v.as_dict()
        .cloned()
        .ok_or_else(|| err(struct_name, "expected a dictionary field"))
}

fn as_list(v: &Value, struct_name: &'static str) -> Result<Vec<Value>, GraphConversionError> {
    v.as_list()
        .map(<[Value]>::to_vec)
        .ok_or_else(|| err(struct_name, "expected a list field"))
}

fn as_label_list(v: &Value, struct_name: &'static str) -> Result<Vec<String>, GraphConversionError> {
    as_list(v, struct_name)?
        .iter()
        .map(|item| as_string(item, struct_name))
        .collect()
}

/// A graph node: `Node` tag `0x4E`, 3 fields pre-v5 (no element id) or 4 at v5+.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: Dict,
    /// Present once the wire form carries a trailing element-id field (determined by field
    /// count on the wire, not a separate flag, per spec.md §6).
    pub element_id: Option<String>,
}

impl TryFrom<Structure> for Node {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Node";
        let id = as_int(field(&s.fields, 0, NAME)?, NAME)?;
        let labels = as_label_list(field(&s.fields, 1, NAME)?, NAME)?;
        let properties = as_dict(field(&s.fields, 2, NAME)?, NAME)?;
        let element_id = match s.fields.get(3) {
            Some(v) => Some(as_string(v, NAME)?),
            None => None,
        };
        Ok(Self {
            id,
            labels,
            properties,
            element_id,
        })
    }
}

/// A graph relationship: `Relationship` tag `0x52`, 5 fields pre-v5 or 8 at v5+ (trailing
/// element ids for the relationship, its start node, and its end node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
    pub rel_type: String,
    pub properties: Dict,
    pub element_id: Option<String>,
    pub start_node_element_id: Option<String>,
    pub end_node_element_id: Option<String>,
}

impl TryFrom<Structure> for Relationship {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Relationship";
        let id = as_int(field(&s.fields, 0, NAME)?, NAME)?;
        let start_node_id = as_int(field(&s.fields, 1, NAME)?, NAME)?;
        let end_node_id = as_int(field(&s.fields, 2, NAME)?, NAME)?;
        let rel_type = as_string(field(&s.fields, 3, NAME)?, NAME)?;
        let properties = as_dict(field(&s.fields, 4, NAME)?, NAME)?;
        let (element_id, start_node_element_id, end_node_element_id) = match s.fields.get(5) {
            Some(v) => (
                Some(as_string(v, NAME)?),
                Some(as_string(field(&s.fields, 6, NAME)?, NAME)?),
                Some(as_string(field(&s.fields, 7, NAME)?, NAME)?),
            ),
            None => (None, None, None),
        };
        Ok(Self {
            id,
            start_node_id,
            end_node_id,
            rel_type,
            properties,
            element_id,
            start_node_element_id,
            end_node_element_id,
        })
    }
}

/// A relationship within a [`Path`], whose endpoints are resolved by index rather than by id:
/// `UnboundRelationship` tag `0x72`, 3 fields pre-v5 or 4 at v5+.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnboundRelationship {
    pub id: i64,
    pub rel_type: String,
    pub properties: Dict,
    pub element_id: Option<String>,
}

impl TryFrom<Structure> for UnboundRelationship {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "UnboundRelationship";
        let id = as_int(field(&s.fields, 0, NAME)?, NAME)?;
        let rel_type = as_string(field(&s.fields, 1, NAME)?, NAME)?;
        let properties = as_dict(field(&s.fields, 2, NAME)?, NAME)?;
        let element_id = match s.fields.get(3) {
            Some(v) => Some(as_string(v, NAME)?),
            None => None,
        };
        Ok(Self {
            id,
            rel_type,
            properties,
            element_id,
        })
    }
}

/// A walk through the graph: `Path` tag `0x50`, 3 fields (`nodes`, `rels`, `indices`).
///
/// `indices` is an alternating rel-index/node-index sequence; traversal is resolved lazily by
/// [`Path::node_at`]/[`Path::relationship_at`] rather than with back-pointers, per spec.md §9.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<UnboundRelationship>,
    pub indices: Vec<i64>,
}

impl TryFrom<Structure> for Path {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Path";
        let raw_nodes = as_list(field(&s.fields, 0, NAME)?, NAME)?;
        let nodes = raw_nodes
            .into_iter()
            .map(|v| match v {
                Value::Structure(inner) => Node::try_from(inner),
                _ => Err(err(NAME, "expected node structures")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let raw_rels = as_list(field(&s.fields, 1, NAME)?, NAME)?;
        let relationships = raw_rels
            .into_iter()
            .map(|v| match v {
                Value::Structure(inner) => UnboundRelationship::try_from(inner),
                _ => Err(err(NAME, "expected unbound relationship structures")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let indices = as_list(field(&s.fields, 2, NAME)?, NAME)?
            .iter()
            .map(|v| as_int(v, NAME))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            nodes,
            relationships,
            indices,
        })
    }
}

impl Path {
    /// Resolves the node at 0-based position `hop` in the path (hop 0 is the start node).
    #[must_use]
    pub fn node_at(&self, hop: usize) -> Option<&Node> {
        if hop == 0 {
            return self.nodes.first();
        }
        let node_index = *self.indices.get(2 * hop - 1)?;
        self.nodes.get(node_index.unsigned_abs() as usize)
    }

    /// Resolves the relationship traversed to reach hop `hop` (1-based), honoring the sign of
    /// its index (negative means traversed in reverse).
    #[must_use]
    pub fn relationship_at(&self, hop: usize) -> Option<(&UnboundRelationship, bool)> {
        let rel_index = *self.indices.get(2 * (hop - 1))?;
        let reversed = rel_index < 0;
        let idx = (rel_index.unsigned_abs() - 1) as usize;
        self.relationships.get(idx).map(|r| (r, reversed))
    }
}

/// `Date` tag `0x44`, 1 field: days since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Date {
    pub days_since_epoch: i64,
}

impl TryFrom<Structure> for Date {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Date";
        Ok(Self {
            days_since_epoch: as_int(field(&s.fields, 0, NAME)?, NAME)?,
        })
    }
}

impl Date {
    /// Converts to a [`time::Date`], anchored at the Unix epoch.
    #[must_use]
    pub fn to_time_date(self) -> Option<time::Date> {
        let epoch = time::Date::from_calendar_date(1970, time::Month::January, 1).ok()?;
        epoch
            .checked_add(time::Duration::days(self.days_since_epoch))
    }
}

/// `Time` tag `0x54`, 2 fields: nanoseconds since midnight, UTC offset in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub nanoseconds_since_midnight: i64,
    pub utc_offset_seconds: i64,
}

impl TryFrom<Structure> for Time {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Time";
        Ok(Self {
            nanoseconds_since_midnight: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            utc_offset_seconds: as_int(field(&s.fields, 1, NAME)?, NAME)?,
        })
    }
}

/// `LocalTime` tag `0x74`, 1 field: nanoseconds since midnight, no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTime {
    pub nanoseconds_since_midnight: i64,
}

impl TryFrom<Structure> for LocalTime {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "LocalTime";
        Ok(Self {
            nanoseconds_since_midnight: as_int(field(&s.fields, 0, NAME)?, NAME)?,
        })
    }
}

/// `DateTime` tag `0x49`, 3 fields: UTC seconds, nanoseconds, UTC offset in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTime {
    pub seconds: i64,
    pub nanoseconds: i64,
    pub utc_offset_seconds: i64,
}

impl TryFrom<Structure> for DateTime {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "DateTime";
        Ok(Self {
            seconds: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            nanoseconds: as_int(field(&s.fields, 1, NAME)?, NAME)?,
            utc_offset_seconds: as_int(field(&s.fields, 2, NAME)?, NAME)?,
        })
    }
}

/// `DateTimeZoneId` tag `0x69`, 3 fields: UTC seconds, nanoseconds, IANA zone id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTimeZoneId {
    pub seconds: i64,
    pub nanoseconds: i64,
    pub zone_id: String,
}

impl TryFrom<Structure> for DateTimeZoneId {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "DateTimeZoneId";
        Ok(Self {
            seconds: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            nanoseconds: as_int(field(&s.fields, 1, NAME)?, NAME)?,
            zone_id: as_string(field(&s.fields, 2, NAME)?, NAME)?,
        })
    }
}

/// `LocalDateTime` tag `0x64`, 2 fields: seconds, nanoseconds (no zone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDateTime {
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl TryFrom<Structure> for LocalDateTime {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "LocalDateTime";
        Ok(Self {
            seconds: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            nanoseconds: as_int(field(&s.fields, 1, NAME)?, NAME)?,
        })
    }
}

/// Legacy (pre-v5, non-UTC-adjusted) `DateTime`: tag `0x46`, 3 fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyDateTime {
    pub seconds: i64,
    pub nanoseconds: i64,
    pub utc_offset_seconds: i64,
}

impl TryFrom<Structure> for LegacyDateTime {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "LegacyDateTime";
        Ok(Self {
            seconds: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            nanoseconds: as_int(field(&s.fields, 1, NAME)?, NAME)?,
            utc_offset_seconds: as_int(field(&s.fields, 2, NAME)?, NAME)?,
        })
    }
}

/// Legacy (pre-v5) `DateTimeZoneId`: tag `0x66`, 3 fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDateTimeZoneId {
    pub seconds: i64,
    pub nanoseconds: i64,
    pub zone_id: String,
}

impl TryFrom<Structure> for LegacyDateTimeZoneId {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "LegacyDateTimeZoneId";
        Ok(Self {
            seconds: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            nanoseconds: as_int(field(&s.fields, 1, NAME)?, NAME)?,
            zone_id: as_string(field(&s.fields, 2, NAME)?, NAME)?,
        })
    }
}

/// `Duration` tag `0x45`, 4 fields: months, days, seconds, nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl TryFrom<Structure> for Duration {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Duration";
        Ok(Self {
            months: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            days: as_int(field(&s.fields, 1, NAME)?, NAME)?,
            seconds: as_int(field(&s.fields, 2, NAME)?, NAME)?,
            nanoseconds: as_int(field(&s.fields, 3, NAME)?, NAME)?,
        })
    }
}

/// `Point2D` tag `0x58`, 3 fields: SRID, x, y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub srid: i64,
    pub x: f64,
    pub y: f64,
}

impl TryFrom<Structure> for Point2D {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Point2D";
        Ok(Self {
            srid: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            x: as_float(field(&s.fields, 1, NAME)?, NAME)?,
            y: as_float(field(&s.fields, 2, NAME)?, NAME)?,
        })
    }
}

/// `Point3D` tag `0x59`, 4 fields: SRID, x, y, z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub srid: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TryFrom<Structure> for Point3D {
    type Error = GraphConversionError;
    fn try_from(s: Structure) -> Result<Self, Self::Error> {
        const NAME: &str = "Point3D";
        Ok(Self {
            srid: as_int(field(&s.fields, 0, NAME)?, NAME)?,
            x: as_float(field(&s.fields, 1, NAME)?, NAME)?,
            y: as_float(field(&s.fields, 2, NAME)?, NAME)?,
            z: as_float(field(&s.fields, 3, NAME)?, NAME)?,
        })
    }
}

pub mod tags {
    pub const NODE: u8 = 0x4E;
    pub const RELATIONSHIP: u8 = 0x52;
    pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
    pub const PATH: u8 = 0x50;
    pub const DATE: u8 = 0x44;
    pub const TIME: u8 = 0x54;
    pub const LOCAL_TIME: u8 = 0x74;
    pub const DATE_TIME: u8 = 0x49;
    pub const DATE_TIME_ZONE_ID: u8 = 0x69;
    pub const LOCAL_DATE_TIME: u8 = 0x64;
    pub const LEGACY_DATE_TIME: u8 = 0x46;
    pub const LEGACY_DATE_TIME_ZONE_ID: u8 = 0x66;
    pub const DURATION: u8 = 0x45;
    pub const POINT_2D: u8 = 0x58;
    pub const POINT_3D: u8 = 0x59;
}

/// Registers every well-known Bolt structure tag and its legal field counts into `registry`.
///
/// The pool initializes the process-global registry with this before opening any connection,
/// per spec.md §4.1.
pub fn register_builtin(registry: &Registry) {
    use tags::*;
    let _ = registry.register(NODE, vec![3, 4]);
    let _ = registry.register(RELATIONSHIP, vec![5, 8]);
    let _ = registry.register(UNBOUND_RELATIONSHIP, vec![3, 4]);
    let _ = registry.register(PATH, vec![3]);
    let _ = registry.register(DATE, vec![1]);
    let _ = registry.register(TIME, vec![2]);
    let _ = registry.register(LOCAL_TIME, vec![1]);
    let _ = registry.register(DATE_TIME, vec![3]);
    let _ = registry.register(DATE_TIME_ZONE_ID, vec![3]);
    let _ = registry.register(LOCAL_DATE_TIME, vec![2]);
    let _ = registry.register(LEGACY_DATE_TIME, vec![3]);
    let _ = registry.register(LEGACY_DATE_TIME_ZONE_ID, vec![3]);
    let _ = registry.register(DURATION, vec![4]);
    let _ = registry.register(POINT_2D, vec![3]);
    let _ = registry.register(POINT_3D, vec![4]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packstream::{decode, encode};

    #[test]
    fn node_decodes_with_element_id() {
        let registry = Registry::new();
        register_builtin(&registry);
        let s = Structure::new(
            tags::NODE,
            vec![
                Value::Int(42),
                Value::List(vec![Value::String("Person".into())]),
                Value::Dict(Dict::new().with("name", Value::String("Alice".into()))),
                Value::String("node42".into()),
            ],
        );
        let bytes = encode(&Value::Structure(s));
        let (value, _) = decode(&bytes, &registry).unwrap();
        let Value::Structure(s) = value else {
            panic!("expected structure")
        };
        let node = Node::try_from(s).unwrap();
        assert_eq!(node.id, 42);
        assert_eq!(node.labels, vec!["Person".to_string()]);
        assert_eq!(node.element_id.as_deref(), Some("node42"));
        assert_eq!(
            node.properties.get("name"),
            Some(&Value::String("Alice".into()))
        );
    }

    #[test]
    fn path_resolves_hops_by_index() {
        let n0 = Node {
            id: 0,
            labels: vec![],
            properties: Dict::new(),
            element_id: None,
        };
        let n1 = Node {
            id: 1,
            labels: vec![],
            properties: Dict::new(),
            element_id: None,
        };
        let r0 = UnboundRelationship {
            id: 10,
            rel_type: "KNOWS".into(),
            properties: Dict::new(),
            element_id: None,
        };
        let path = Path {
            nodes: vec![n0.clone(), n1.clone()],
            relationships: vec![r0.clone()],
            indices: vec![1, 1],
        };
        assert_eq!(path.node_at(0), Some(&n0));
        assert_eq!(path.node_at(1), Some(&n1));
        let (rel, reversed) = path.relationship_at(1).unwrap();
        assert_eq!(rel, &r0);
        assert!(!reversed);
    }
}
