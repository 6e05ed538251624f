//! Schema tree for parquet files.
//!
//! Columns are stored in an arena owned by [`Schema`] and refer to each other
//! by [`ColumnId`]. Parent links are ids as well, so the tree has a single
//! owner.
mod field;
mod printer;

pub use field::{FieldDef, FieldDefKind};

use rivet_error::{Result, RivetError};
use tracing::warn;

use crate::format;
use crate::types::{ConvertedType, LogicalType, PhysicalType, Repetition, TimeUnit};

/// Index of a column in the schema arena.
pub type ColumnId = usize;

/// How a group should be interpreted when assembling records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    Struct,
    /// A list. `wrapper` is the repeated node, `element` holds the items.
    ///
    /// For two level lists the wrapper is also the element.
    List { wrapper: ColumnId, element: ColumnId },
    /// A map with a repeated `wrapper` holding the key and value columns.
    Map {
        wrapper: ColumnId,
        key: ColumnId,
        value: ColumnId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatColumn {
    pub physical_type: PhysicalType,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    /// Position of this leaf in the file's column order.
    pub leaf_index: usize,
}

impl FlatColumn {
    pub fn type_length(&self) -> Option<usize> {
        self.physical_type.type_length()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedColumn {
    pub children: Vec<ColumnId>,
    pub kind: NestedKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Flat(FlatColumn),
    Nested(NestedColumn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// None only for the root.
    pub repetition: Option<Repetition>,
    pub logical_type: Option<LogicalType>,
    pub converted_type: Option<ConvertedType>,
    pub field_id: Option<i32>,
    pub parent: Option<ColumnId>,
    /// Names from the first level below the root down to this column.
    pub path: Vec<String>,
    pub max_def_level: i16,
    pub max_rep_level: i16,
    pub kind: ColumnKind,
}

impl Column {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, ColumnKind::Flat(_))
    }

    pub fn flat(&self) -> Option<&FlatColumn> {
        match &self.kind {
            ColumnKind::Flat(f) => Some(f),
            ColumnKind::Nested(_) => None,
        }
    }

    pub fn nested(&self) -> Option<&NestedColumn> {
        match &self.kind {
            ColumnKind::Flat(_) => None,
            ColumnKind::Nested(n) => Some(n),
        }
    }

    pub fn children(&self) -> &[ColumnId] {
        match &self.kind {
            ColumnKind::Flat(_) => &[],
            ColumnKind::Nested(n) => &n.children,
        }
    }

    /// Dot separated path.
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }

    pub fn is_repeated(&self) -> bool {
        self.repetition == Some(Repetition::Repeated)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
    /// Leaf column ids in file order.
    leaves: Vec<ColumnId>,
}

impl Schema {
    /// Id of the root column.
    pub const ROOT: ColumnId = 0;

    /// Build a schema from caller provided fields.
    ///
    /// Logical types and nested shapes are validated, errors are returned as
    /// schema violations.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let root = FieldDef::group(name, Repetition::Required, fields);
        SchemaBuilder { strict: true }.build(root)
    }

    /// Build a schema from the flattened schema elements in the file footer.
    ///
    /// Elements are consumed depth first. Unknown or invalid logical types are
    /// ignored with a warning so that the column can still be read as its
    /// physical type.
    pub fn try_from_thrift(elements: &[format::SchemaElement]) -> Result<Self> {
        if elements.is_empty() {
            return Err(RivetError::invalid_format("Schema has no elements"));
        }

        let mut pos = 0;
        let root = field_from_elements(elements, &mut pos)?;
        if pos != elements.len() {
            return Err(RivetError::invalid_format(format!(
                "Schema elements do not form a single tree, {} elements left over",
                elements.len() - pos
            )));
        }
        if !matches!(root.kind, FieldDefKind::Group(_)) {
            return Err(RivetError::invalid_format("Schema root must be a group"));
        }

        SchemaBuilder { strict: false }.build(root)
    }

    /// Flatten the schema into thrift schema elements, depth first.
    pub fn to_thrift(&self) -> Vec<format::SchemaElement> {
        let mut out = Vec::with_capacity(self.columns.len());
        self.push_thrift(Self::ROOT, &mut out);
        out
    }

    fn push_thrift(&self, id: ColumnId, out: &mut Vec<format::SchemaElement>) {
        let col = &self.columns[id];
        let converted = col
            .converted_type
            .or_else(|| col.logical_type.and_then(|l| l.to_converted()));

        let mut elem = format::SchemaElement {
            name: col.name.clone(),
            repetition_type: col.repetition.map(|r| r.thrift_code()),
            converted_type: converted.map(|c| c.thrift_code()),
            field_id: col.field_id,
            logical_type: col.logical_type.map(logical_to_thrift),
            ..Default::default()
        };

        match &col.kind {
            ColumnKind::Flat(flat) => {
                elem.type_ = Some(flat.physical_type.thrift_code());
                elem.type_length = flat.type_length().map(|l| l as i32);
                elem.precision = flat.precision;
                elem.scale = flat.scale;
                out.push(elem);
            }
            ColumnKind::Nested(nested) => {
                elem.num_children = Some(nested.children.len() as i32);
                out.push(elem);
                for &child in &nested.children {
                    self.push_thrift(child, out);
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.columns[Self::ROOT].name
    }

    pub fn root(&self) -> &Column {
        &self.columns[Self::ROOT]
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        &self.columns[id]
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Get a leaf by its leaf index.
    pub fn leaf(&self, leaf_index: usize) -> Option<&Column> {
        self.leaves.get(leaf_index).map(|&id| &self.columns[id])
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Column> {
        self.leaves.iter().map(|&id| &self.columns[id])
    }

    /// Column ids of the fields directly below the root.
    pub fn top_level(&self) -> &[ColumnId] {
        self.columns[Self::ROOT].children()
    }

    /// Find a top level field by name.
    pub fn find(&self, name: &str) -> Option<ColumnId> {
        self.top_level()
            .iter()
            .copied()
            .find(|&id| self.columns[id].name == name)
    }
}

/// Consume one field (and its subtree) from `elements` starting at `pos`.
fn field_from_elements(elements: &[format::SchemaElement], pos: &mut usize) -> Result<FieldDef> {
    let elem = elements.get(*pos).ok_or_else(|| {
        RivetError::invalid_format("Schema element declares children that don't exist")
    })?;
    *pos += 1;

    let repetition = match elem.repetition_type {
        Some(code) => Repetition::try_from_thrift(code)?,
        None => Repetition::Required,
    };

    let converted_type = match elem.converted_type {
        Some(code) => match ConvertedType::try_from_thrift(code) {
            Ok(c) => Some(c),
            Err(_) => {
                warn!(column = %elem.name, code, "ignoring unknown converted type");
                None
            }
        },
        None => None,
    };

    let logical_type = match elem.logical_type {
        Some(format::LogicalType::Unrecognized(id)) => {
            warn!(column = %elem.name, id, "ignoring unrecognized logical type");
            None
        }
        Some(l) => Some(logical_from_thrift(l)),
        None => None,
    };
    // The converted type is only kept for files without logical types.
    let converted_type = if logical_type.is_some() {
        None
    } else {
        converted_type
    };

    let num_children = elem.num_children.unwrap_or(0);
    if num_children < 0 {
        return Err(RivetError::invalid_format(format!(
            "Negative child count for schema element {}",
            elem.name
        )));
    }

    let kind = match elem.type_ {
        Some(code) if num_children == 0 => FieldDefKind::Primitive {
            physical_type: PhysicalType::try_from_thrift(code, elem.type_length)?,
            precision: elem.precision,
            scale: elem.scale,
        },
        _ => {
            let mut children = Vec::with_capacity(num_children as usize);
            for _ in 0..num_children {
                children.push(field_from_elements(elements, pos)?);
            }
            FieldDefKind::Group(children)
        }
    };

    Ok(FieldDef {
        name: elem.name.clone(),
        repetition,
        logical_type,
        converted_type,
        field_id: elem.field_id,
        kind,
    })
}

fn time_unit_from_thrift(unit: format::TimeUnit) -> TimeUnit {
    match unit {
        format::TimeUnit::Millis => TimeUnit::Millis,
        format::TimeUnit::Micros => TimeUnit::Micros,
        format::TimeUnit::Nanos => TimeUnit::Nanos,
    }
}

fn time_unit_to_thrift(unit: TimeUnit) -> format::TimeUnit {
    match unit {
        TimeUnit::Millis => format::TimeUnit::Millis,
        TimeUnit::Micros => format::TimeUnit::Micros,
        TimeUnit::Nanos => format::TimeUnit::Nanos,
    }
}

fn logical_from_thrift(l: format::LogicalType) -> LogicalType {
    match l {
        format::LogicalType::String => LogicalType::String,
        format::LogicalType::Map => LogicalType::Map,
        format::LogicalType::List => LogicalType::List,
        format::LogicalType::Enum => LogicalType::Enum,
        format::LogicalType::Decimal { scale, precision } => {
            LogicalType::Decimal { scale, precision }
        }
        format::LogicalType::Date => LogicalType::Date,
        format::LogicalType::Time {
            is_adjusted_to_utc,
            unit,
        } => LogicalType::Time {
            is_adjusted_to_utc,
            unit: time_unit_from_thrift(unit),
        },
        format::LogicalType::Timestamp {
            is_adjusted_to_utc,
            unit,
        } => LogicalType::Timestamp {
            is_adjusted_to_utc,
            unit: time_unit_from_thrift(unit),
        },
        format::LogicalType::Integer {
            bit_width,
            is_signed,
        } => LogicalType::Integer {
            bit_width,
            is_signed,
        },
        format::LogicalType::Json => LogicalType::Json,
        format::LogicalType::Bson => LogicalType::Bson,
        format::LogicalType::Uuid => LogicalType::Uuid,
        format::LogicalType::Float16 => LogicalType::Float16,
        format::LogicalType::Unknown | format::LogicalType::Unrecognized(_) => LogicalType::Unknown,
    }
}

fn logical_to_thrift(l: LogicalType) -> format::LogicalType {
    match l {
        LogicalType::String => format::LogicalType::String,
        LogicalType::Map => format::LogicalType::Map,
        LogicalType::List => format::LogicalType::List,
        LogicalType::Enum => format::LogicalType::Enum,
        LogicalType::Decimal { scale, precision } => {
            format::LogicalType::Decimal { scale, precision }
        }
        LogicalType::Date => format::LogicalType::Date,
        LogicalType::Time {
            is_adjusted_to_utc,
            unit,
        } => format::LogicalType::Time {
            is_adjusted_to_utc,
            unit: time_unit_to_thrift(unit),
        },
        LogicalType::Timestamp {
            is_adjusted_to_utc,
            unit,
        } => format::LogicalType::Timestamp {
            is_adjusted_to_utc,
            unit: time_unit_to_thrift(unit),
        },
        LogicalType::Integer {
            bit_width,
            is_signed,
        } => format::LogicalType::Integer {
            bit_width,
            is_signed,
        },
        LogicalType::Unknown => format::LogicalType::Unknown,
        LogicalType::Json => format::LogicalType::Json,
        LogicalType::Bson => format::LogicalType::Bson,
        LogicalType::Uuid => format::LogicalType::Uuid,
        LogicalType::Float16 => format::LogicalType::Float16,
    }
}

/// Builds the column arena from a tree of field definitions.
struct SchemaBuilder {
    /// Error on invalid logical types/nested shapes instead of warning.
    strict: bool,
}

impl SchemaBuilder {
    fn build(&self, root: FieldDef) -> Result<Schema> {
        let mut schema = Schema {
            columns: Vec::new(),
            leaves: Vec::new(),
        };
        self.add(&mut schema, root, None)?;
        Ok(schema)
    }

    fn violation(&self, column: &str, msg: String) -> Result<()> {
        if self.strict {
            return Err(RivetError::schema_violation(format!("{column}: {msg}")));
        }
        warn!(%column, %msg, "treating column as plain group");
        Ok(())
    }

    fn add(
        &self,
        schema: &mut Schema,
        def: FieldDef,
        parent: Option<ColumnId>,
    ) -> Result<ColumnId> {
        let id = schema.columns.len();
        let logical_type = def.effective_logical_type();

        let (repetition, path, mut max_def, mut max_rep) = match parent {
            None => (None, Vec::new(), 0, 0),
            Some(parent) => {
                let p = &schema.columns[parent];
                let mut path = p.path.clone();
                path.push(def.name.clone());
                (Some(def.repetition), path, p.max_def_level, p.max_rep_level)
            }
        };
        match repetition {
            Some(Repetition::Optional) => max_def += 1,
            Some(Repetition::Repeated) => {
                max_def += 1;
                max_rep += 1;
            }
            _ => (),
        }

        match def.kind {
            FieldDefKind::Primitive {
                physical_type,
                precision,
                scale,
            } => {
                let mut logical_type = logical_type;
                if let Some(logical) = logical_type {
                    if let Err(e) = logical.validate_physical(physical_type) {
                        if self.strict {
                            return Err(e);
                        }
                        warn!(
                            column = %def.name,
                            %logical,
                            %physical_type,
                            "ignoring invalid logical type"
                        );
                        logical_type = None;
                    }
                }

                let leaf_index = schema.leaves.len();
                schema.leaves.push(id);
                schema.columns.push(Column {
                    name: def.name,
                    repetition,
                    logical_type,
                    converted_type: def.converted_type,
                    field_id: def.field_id,
                    parent,
                    path,
                    max_def_level: max_def,
                    max_rep_level: max_rep,
                    kind: ColumnKind::Flat(FlatColumn {
                        physical_type,
                        precision,
                        scale,
                        leaf_index,
                    }),
                });
            }
            FieldDefKind::Group(children) => {
                schema.columns.push(Column {
                    name: def.name,
                    repetition,
                    logical_type,
                    converted_type: def.converted_type,
                    field_id: def.field_id,
                    parent,
                    path,
                    max_def_level: max_def,
                    max_rep_level: max_rep,
                    kind: ColumnKind::Nested(NestedColumn {
                        children: Vec::new(),
                        kind: NestedKind::Struct,
                    }),
                });

                let mut child_ids = Vec::with_capacity(children.len());
                for child in children {
                    child_ids.push(self.add(schema, child, Some(id))?);
                }

                let kind = self.resolve_kind(schema, id, &child_ids)?;
                schema.columns[id].kind = ColumnKind::Nested(NestedColumn {
                    children: child_ids,
                    kind,
                });
            }
        }

        Ok(id)
    }

    /// Decide if a group is a list, map, or plain struct.
    fn resolve_kind(
        &self,
        schema: &Schema,
        id: ColumnId,
        children: &[ColumnId],
    ) -> Result<NestedKind> {
        let col = &schema.columns[id];
        let is_list = col.logical_type == Some(LogicalType::List);
        // MAP_KEY_VALUE annotates the repeated group inside a map.
        let is_map = col.logical_type == Some(LogicalType::Map)
            && col.converted_type != Some(ConvertedType::MapKeyValue);
        if !is_list && !is_map {
            return Ok(NestedKind::Struct);
        }

        if children.len() != 1 {
            self.violation(
                &col.name,
                format!("expected exactly one child, got {}", children.len()),
            )?;
            return Ok(NestedKind::Struct);
        }
        let wrapper = children[0];
        let wrapper_col = &schema.columns[wrapper];
        if !wrapper_col.is_repeated() {
            self.violation(&col.name, "child must be repeated".to_string())?;
            return Ok(NestedKind::Struct);
        }

        if is_list {
            let grandchildren = wrapper_col.children();
            // Backwards compatibility rules for two level lists.
            let wrapper_is_element = wrapper_col.is_leaf()
                || grandchildren.len() != 1
                || wrapper_col.name == "array"
                || wrapper_col.name == format!("{}_tuple", col.name);
            let element = if wrapper_is_element {
                wrapper
            } else {
                grandchildren[0]
            };
            return Ok(NestedKind::List { wrapper, element });
        }

        let entries = wrapper_col.children();
        if wrapper_col.is_leaf() || entries.len() != 2 {
            self.violation(
                &col.name,
                "map must have a repeated group with a key and value".to_string(),
            )?;
            return Ok(NestedKind::Struct);
        }
        let (key, value) = (entries[0], entries[1]);
        if schema.columns[key].repetition != Some(Repetition::Required) {
            self.violation(&col.name, "map keys must be required".to_string())?;
        }

        Ok(NestedKind::Map {
            wrapper,
            key,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use rivet_error::ErrorKind;

    use super::*;

    fn int(name: &str, rep: Repetition) -> FieldDef {
        FieldDef::primitive(name, rep, PhysicalType::Int32)
    }

    #[test]
    fn levels_flat() {
        let schema = Schema::new(
            "s",
            vec![
                int("a", Repetition::Required),
                int("b", Repetition::Optional),
                int("c", Repetition::Repeated),
            ],
        )
        .unwrap();

        let levels: Vec<_> = schema
            .leaves()
            .map(|c| (c.max_def_level, c.max_rep_level))
            .collect();
        assert_eq!(vec![(0, 0), (1, 0), (1, 1)], levels);
        assert_eq!(None, schema.root().repetition);
        assert_eq!(0, schema.root().max_def_level);
    }

    #[test]
    fn levels_list_of_struct_of_map() {
        let map = FieldDef::map(
            "m",
            Repetition::Optional,
            FieldDef::primitive("k", Repetition::Required, PhysicalType::ByteArray)
                .with_logical_type(LogicalType::String),
            int("v", Repetition::Optional),
        );
        let strct = FieldDef::group("item", Repetition::Optional, vec![map]);
        let list = FieldDef::list("l", Repetition::Optional, strct);
        let schema = Schema::new("s", vec![list]).unwrap();

        // l (opt) -> list (rep) -> element (opt) -> m (opt) -> key_value (rep)
        //   -> key (req) / value (opt)
        let key = schema.leaf(0).unwrap();
        assert_eq!("l.list.element.m.key_value.key", key.path_string());
        assert_eq!((5, 2), (key.max_def_level, key.max_rep_level));

        let value = schema.leaf(1).unwrap();
        assert_eq!((6, 2), (value.max_def_level, value.max_rep_level));

        let l = schema.column(schema.find("l").unwrap());
        let NestedKind::List { wrapper, element } = l.nested().unwrap().kind else {
            panic!("expected list")
        };
        assert_eq!("list", schema.column(wrapper).name);
        assert_eq!("element", schema.column(element).name);
        assert_eq!(Some(wrapper), schema.column(element).parent);

        let element = schema.column(element);
        let m = schema.column(element.children()[0]);
        assert!(matches!(m.nested().unwrap().kind, NestedKind::Map { .. }));
    }

    #[test]
    fn two_level_lists() {
        // Repeated leaf child.
        let legacy = FieldDef::group(
            "a",
            Repetition::Optional,
            vec![int("item", Repetition::Repeated)],
        )
        .with_logical_type(LogicalType::List);
        // Repeated group named array.
        let array = FieldDef::group(
            "b",
            Repetition::Optional,
            vec![FieldDef::group(
                "array",
                Repetition::Repeated,
                vec![int("x", Repetition::Required)],
            )],
        )
        .with_logical_type(LogicalType::List);
        // Repeated group with multiple fields.
        let multi = FieldDef::group(
            "c",
            Repetition::Optional,
            vec![FieldDef::group(
                "pair",
                Repetition::Repeated,
                vec![int("x", Repetition::Required), int("y", Repetition::Required)],
            )],
        )
        .with_logical_type(LogicalType::List);

        let schema = Schema::new("s", vec![legacy, array, multi]).unwrap();
        for name in ["a", "b", "c"] {
            let col = schema.column(schema.find(name).unwrap());
            let NestedKind::List { wrapper, element } = col.nested().unwrap().kind else {
                panic!("expected list for {name}")
            };
            assert_eq!(wrapper, element, "{name}");
        }
    }

    #[test]
    fn strict_rejects_bad_shapes() {
        let bad_list =
            FieldDef::group("l", Repetition::Optional, vec![int("x", Repetition::Optional)])
                .with_logical_type(LogicalType::List);
        let err = Schema::new("s", vec![bad_list]).unwrap_err();
        assert_eq!(ErrorKind::SchemaViolation, err.kind());

        let bad_logical = int("d", Repetition::Required).with_logical_type(LogicalType::String);
        let err = Schema::new("s", vec![bad_logical]).unwrap_err();
        assert_eq!(ErrorKind::SchemaViolation, err.kind());
    }

    #[test]
    fn thrift_roundtrip() {
        let schema = Schema::new(
            "schema",
            vec![
                FieldDef::primitive("s", Repetition::Optional, PhysicalType::ByteArray)
                    .with_logical_type(LogicalType::String),
                FieldDef::primitive("d", Repetition::Required, PhysicalType::FixedLenByteArray(8))
                    .with_logical_type(LogicalType::Decimal {
                        scale: 3,
                        precision: 15,
                    }),
                FieldDef::list("l", Repetition::Optional, int("e", Repetition::Optional)),
            ],
        )
        .unwrap();

        let elements = schema.to_thrift();
        assert_eq!(6, elements.len());
        assert_eq!(Some(3), elements[0].num_children);
        assert_eq!(Some(0), elements[1].converted_type); // UTF8
        assert_eq!(Some(8), elements[2].type_length);

        let got = Schema::try_from_thrift(&elements).unwrap();
        assert_eq!(schema, got);
    }

    #[test]
    fn thrift_bad_trees() {
        let root = format::SchemaElement {
            name: "root".to_string(),
            num_children: Some(2),
            ..Default::default()
        };
        let leaf = format::SchemaElement {
            name: "a".to_string(),
            type_: Some(1),
            repetition_type: Some(0),
            ..Default::default()
        };

        // Declares 2 children, only has 1.
        let err = Schema::try_from_thrift(&[root.clone(), leaf.clone()]).unwrap_err();
        assert_eq!(ErrorKind::InvalidFormat, err.kind());

        // Two roots.
        let single_root = format::SchemaElement {
            num_children: Some(1),
            ..root
        };
        let err = Schema::try_from_thrift(&[single_root, leaf.clone(), leaf]).unwrap_err();
        assert_eq!(ErrorKind::InvalidFormat, err.kind());

        let err = Schema::try_from_thrift(&[]).unwrap_err();
        assert_eq!(ErrorKind::InvalidFormat, err.kind());
    }

    #[test]
    fn legacy_converted_types_on_read() {
        let elements = vec![
            format::SchemaElement {
                name: "root".to_string(),
                num_children: Some(1),
                ..Default::default()
            },
            format::SchemaElement {
                name: "ts".to_string(),
                type_: Some(2),
                repetition_type: Some(1),
                converted_type: Some(9), // TIMESTAMP_MILLIS
                ..Default::default()
            },
        ];
        let schema = Schema::try_from_thrift(&elements).unwrap();
        assert_eq!(
            Some(LogicalType::Timestamp {
                is_adjusted_to_utc: true,
                unit: TimeUnit::Millis
            }),
            schema.leaf(0).unwrap().logical_type
        );
    }

    #[test]
    fn lenient_invalid_logical_type() {
        let elements = vec![
            format::SchemaElement {
                name: "root".to_string(),
                num_children: Some(1),
                ..Default::default()
            },
            format::SchemaElement {
                name: "a".to_string(),
                type_: Some(1),
                repetition_type: Some(1),
                logical_type: Some(format::LogicalType::String),
                ..Default::default()
            },
        ];
        let schema = Schema::try_from_thrift(&elements).unwrap();
        assert_eq!(None, schema.leaf(0).unwrap().logical_type);
    }
}
