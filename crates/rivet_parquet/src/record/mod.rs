//! Conversion between nested records and leaf column levels.
//!
//! Both directions walk a [`Field`] tree derived from the schema. The tree
//! makes every optional and repeated level explicit so shredding and
//! assembly only need to know the level at which each node is present.
pub mod assemble;
pub mod shred;

pub use assemble::{LeafCursor, RecordAssembler};
pub use shred::{LeafSlots, Shredder};

use rivet_error::{Result, RivetError};

use crate::schema::{ColumnId, ColumnKind, NestedKind, Schema};
use crate::types::Repetition;

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Leaf indices of all leaves below this field.
    pub leaves: Vec<usize>,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Primitive {
        leaf: usize,
    },
    /// Present when the definition level is at least `def_level`.
    Optional {
        def_level: i16,
        child: Box<Field>,
    },
    Struct {
        names: Vec<String>,
        children: Vec<Field>,
    },
    /// Non-empty when the definition level is at least `def_level`. Elements
    /// after the first start with a repetition level of `rep_level`.
    List {
        def_level: i16,
        rep_level: i16,
        element: Box<Field>,
    },
    Map {
        def_level: i16,
        rep_level: i16,
        key: Box<Field>,
        value: Box<Field>,
    },
}

impl Field {
    /// Build the field tree for the whole schema.
    pub fn from_schema(schema: &Schema) -> Field {
        build_inner(schema, Schema::ROOT)
    }

    /// Build a field tree containing only the named top level columns, in
    /// the order given.
    pub fn from_projection(schema: &Schema, names: &[&str]) -> Result<Field> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let id = schema.find(name).ok_or_else(|| {
                RivetError::out_of_range(format!("Column '{name}' not found in schema"))
            })?;
            fields.push((name.to_string(), build(schema, id)));
        }
        let (names, children): (Vec<_>, Vec<_>) = fields.into_iter().unzip();
        Ok(new_field(FieldKind::Struct { names, children }))
    }

    pub fn first_leaf(&self) -> Option<usize> {
        self.leaves.first().copied()
    }
}

fn new_field(kind: FieldKind) -> Field {
    let leaves = match &kind {
        FieldKind::Primitive { leaf } => vec![*leaf],
        FieldKind::Optional { child, .. } => child.leaves.clone(),
        FieldKind::Struct { children, .. } => children
            .iter()
            .flat_map(|c| c.leaves.iter().copied())
            .collect(),
        FieldKind::List { element, .. } => element.leaves.clone(),
        FieldKind::Map { key, value, .. } => key
            .leaves
            .iter()
            .chain(value.leaves.iter())
            .copied()
            .collect(),
    };
    Field { leaves, kind }
}

/// Build a field including the column's own repetition.
fn build(schema: &Schema, id: ColumnId) -> Field {
    let col = schema.column(id);
    let inner = build_inner(schema, id);
    match col.repetition {
        Some(Repetition::Optional) => new_field(FieldKind::Optional {
            def_level: col.max_def_level,
            child: Box::new(inner),
        }),
        // Repeated fields outside of a list or map are lists of required
        // elements.
        Some(Repetition::Repeated) => new_field(FieldKind::List {
            def_level: col.max_def_level,
            rep_level: col.max_rep_level,
            element: Box::new(inner),
        }),
        Some(Repetition::Required) | None => inner,
    }
}

/// Build a field ignoring the column's own repetition.
fn build_inner(schema: &Schema, id: ColumnId) -> Field {
    let col = schema.column(id);
    let nested = match &col.kind {
        ColumnKind::Flat(flat) => {
            return new_field(FieldKind::Primitive {
                leaf: flat.leaf_index,
            })
        }
        ColumnKind::Nested(nested) => nested,
    };

    match nested.kind {
        NestedKind::Struct => {
            let names = nested
                .children
                .iter()
                .map(|&c| schema.column(c).name.clone())
                .collect();
            let children = nested.children.iter().map(|&c| build(schema, c)).collect();
            new_field(FieldKind::Struct { names, children })
        }
        NestedKind::List { wrapper, element } => {
            let w = schema.column(wrapper);
            let element = if element == wrapper {
                // Two level list, the repeated node is the element.
                build_inner(schema, wrapper)
            } else {
                build(schema, element)
            };
            new_field(FieldKind::List {
                def_level: w.max_def_level,
                rep_level: w.max_rep_level,
                element: Box::new(element),
            })
        }
        NestedKind::Map {
            wrapper,
            key,
            value,
        } => {
            let w = schema.column(wrapper);
            new_field(FieldKind::Map {
                def_level: w.max_def_level,
                rep_level: w.max_rep_level,
                key: Box::new(build(schema, key)),
                value: Box::new(build(schema, value)),
            })
        }
    }
}
