//! Record shredding, turning nested values into per leaf levels.
use rivet_error::{Result, RivetError};

use super::{Field, FieldKind};
use crate::schema::Schema;
use crate::value::Value;

/// Slots for a single leaf column as (repetition level, definition level,
/// value). The value is only present at the max definition level.
pub type LeafSlots = Vec<(i16, i16, Option<Value>)>;

#[derive(Debug, Clone)]
pub struct Shredder {
    root: Field,
    num_leaves: usize,
    /// Error on struct fields not in the schema instead of ignoring them.
    validate: bool,
}

impl Shredder {
    pub fn new(schema: &Schema, validate: bool) -> Self {
        Shredder {
            root: Field::from_schema(schema),
            num_leaves: schema.num_leaves(),
            validate,
        }
    }

    /// Shred a single record into slots for every leaf, indexed by leaf
    /// index.
    ///
    /// The record must be a struct value. Missing fields are treated as null.
    pub fn shred(&self, record: &Value) -> Result<Vec<LeafSlots>> {
        if !matches!(record, Value::Struct(_)) {
            return Err(RivetError::schema_violation(format!(
                "Records must be structs, got {}",
                record.type_name()
            )));
        }
        let mut out = vec![Vec::new(); self.num_leaves];
        self.shred_field(&self.root, "", record, 0, 0, &mut out)?;
        Ok(out)
    }

    fn shred_field(
        &self,
        field: &Field,
        name: &str,
        value: &Value,
        rep: i16,
        def: i16,
        out: &mut [LeafSlots],
    ) -> Result<()> {
        match &field.kind {
            FieldKind::Primitive { leaf } => match value {
                Value::Null => return Err(required(name)),
                Value::List(_) | Value::Map(_) | Value::Struct(_) => {
                    return Err(RivetError::schema_violation(format!(
                        "Expected a primitive value for '{name}', got {}",
                        value.type_name()
                    )))
                }
                _ => out[*leaf].push((rep, def, Some(value.clone()))),
            },
            FieldKind::Optional { def_level, child } => {
                if value.is_null() {
                    push_nulls(field, rep, def, out);
                } else {
                    self.shred_field(child, name, value, rep, *def_level, out)?;
                }
            }
            FieldKind::Struct { names, children } => {
                let fields = match value {
                    Value::Struct(fields) => fields,
                    Value::Null => return Err(required(name)),
                    other => return Err(mismatch(name, "struct", other)),
                };
                if self.validate {
                    if let Some((unknown, _)) = fields.iter().find(|(n, _)| !names.contains(n)) {
                        return Err(RivetError::schema_violation(format!(
                            "Field '{unknown}' not in schema"
                        )));
                    }
                }
                for (child_name, child) in names.iter().zip(children) {
                    let child_value = fields
                        .iter()
                        .find(|(n, _)| n == child_name)
                        .map(|(_, v)| v)
                        .unwrap_or(&Value::Null);
                    self.shred_field(child, child_name, child_value, rep, def, out)?;
                }
            }
            FieldKind::List {
                def_level,
                rep_level,
                element,
            } => {
                let items = match value {
                    Value::List(items) => items,
                    Value::Null => return Err(required(name)),
                    other => return Err(mismatch(name, "list", other)),
                };
                if items.is_empty() {
                    push_nulls(field, rep, def, out);
                }
                for (idx, item) in items.iter().enumerate() {
                    let rep = if idx == 0 { rep } else { *rep_level };
                    self.shred_field(element, name, item, rep, *def_level, out)?;
                }
            }
            FieldKind::Map {
                def_level,
                rep_level,
                key,
                value: value_field,
            } => {
                let entries = match value {
                    Value::Map(entries) => entries,
                    Value::Null => return Err(required(name)),
                    other => return Err(mismatch(name, "map", other)),
                };
                if entries.is_empty() {
                    push_nulls(field, rep, def, out);
                }
                for (idx, (k, v)) in entries.iter().enumerate() {
                    let rep = if idx == 0 { rep } else { *rep_level };
                    self.shred_field(key, name, k, rep, *def_level, out)?;
                    self.shred_field(value_field, name, v, rep, *def_level, out)?;
                }
            }
        }
        Ok(())
    }
}

/// Push an empty slot to every leaf below `field`.
fn push_nulls(field: &Field, rep: i16, def: i16, out: &mut [LeafSlots]) {
    for &leaf in &field.leaves {
        out[leaf].push((rep, def, None));
    }
}

fn required(name: &str) -> RivetError {
    RivetError::schema_violation(format!("Required field '{name}' is null"))
}

fn mismatch(name: &str, expected: &str, got: &Value) -> RivetError {
    RivetError::schema_violation(format!(
        "Expected a {expected} value for '{name}', got {}",
        got.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use rivet_error::ErrorKind;

    use super::*;
    use crate::schema::FieldDef;
    use crate::types::{PhysicalType, Repetition};

    fn list_schema() -> Schema {
        Schema::new(
            "s",
            vec![FieldDef::list(
                "l",
                Repetition::Optional,
                FieldDef::primitive("e", Repetition::Required, PhysicalType::Int32),
            )],
        )
        .unwrap()
    }

    fn levels(slots: &LeafSlots) -> Vec<(i16, i16)> {
        slots.iter().map(|(r, d, _)| (*r, *d)).collect()
    }

    #[test]
    fn list_rows() {
        let shredder = Shredder::new(&list_schema(), true);
        let rows = [
            Value::List(vec![1.into(), 2.into()]),
            Value::List(vec![]),
            Value::Null,
            Value::List(vec![3.into()]),
        ];

        let mut all = Vec::new();
        for row in rows {
            let slots = shredder.shred(&Value::new_struct([("l", row)])).unwrap();
            all.extend(slots.into_iter().next().unwrap());
        }

        assert_eq!(vec![(0, 2), (1, 2), (0, 1), (0, 0), (0, 2)], levels(&all));
        let values: Vec<_> = all.into_iter().filter_map(|(_, _, v)| v).collect();
        assert_eq!(vec![Value::Int32(1), 2.into(), 3.into()], values);
    }

    #[test]
    fn nested_struct_levels() {
        // optional group a { optional int32 b; required int32 c; }
        let schema = Schema::new(
            "s",
            vec![FieldDef::group(
                "a",
                Repetition::Optional,
                vec![
                    FieldDef::primitive("b", Repetition::Optional, PhysicalType::Int32),
                    FieldDef::primitive("c", Repetition::Required, PhysicalType::Int32),
                ],
            )],
        )
        .unwrap();
        let shredder = Shredder::new(&schema, true);

        let slots = shredder
            .shred(&Value::new_struct([("a", Value::Null)]))
            .unwrap();
        assert_eq!(vec![(0, 0)], levels(&slots[0]));
        assert_eq!(vec![(0, 0)], levels(&slots[1]));

        let record = Value::new_struct([(
            "a",
            Value::new_struct([("c", Value::Int32(5))]),
        )]);
        let slots = shredder.shred(&record).unwrap();
        assert_eq!(vec![(0, 1)], levels(&slots[0]));
        assert_eq!(vec![(0, 1, Some(Value::Int32(5)))], slots[1]);
    }

    #[test]
    fn violations() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("a", Repetition::Required, PhysicalType::Int32)],
        )
        .unwrap();

        let strict = Shredder::new(&schema, true);
        let cases = [
            Value::Int32(1),
            Value::new_struct([("a", Value::Null)]),
            Value::new_struct::<&str, _>([]),
            Value::new_struct([("a", Value::List(vec![]))]),
            Value::new_struct([("a", Value::Int32(1)), ("b", Value::Int32(2))]),
        ];
        for case in cases {
            let err = strict.shred(&case).unwrap_err();
            assert_eq!(ErrorKind::SchemaViolation, err.kind());
        }

        // Unknown fields ignored without validation.
        let lenient = Shredder::new(&schema, false);
        let slots = lenient
            .shred(&Value::new_struct([("a", Value::Int32(1)), ("b", Value::Int32(2))]))
            .unwrap();
        assert_eq!(1, slots[0].len());
    }
}
