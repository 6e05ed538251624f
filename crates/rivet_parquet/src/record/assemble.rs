//! Record assembly from leaf column levels.
//!
//! Assembly pulls from one cursor per leaf. Every node consumes the same
//! number of slots from each leaf below it, so all cursors below a node are
//! always positioned at the start of that node's next value. A node decides
//! what it is by peeking at the levels of its first leaf.
use rivet_error::{Result, RivetError};

use super::{Field, FieldKind};
use crate::coder::ColumnData;
use crate::value::Value;

/// Pages of a single leaf column.
pub type PageIter = Box<dyn Iterator<Item = Result<ColumnData>> + Send>;

/// Slot by slot access to the decoded pages of a leaf column.
pub struct LeafCursor {
    pages: PageIter,
    page: Option<ColumnData>,
    /// Next slot in the current page.
    slot: usize,
    /// Next value in the current page.
    value: usize,
    max_def_level: i16,
}

impl std::fmt::Debug for LeafCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafCursor")
            .field("slot", &self.slot)
            .field("value", &self.value)
            .field("max_def_level", &self.max_def_level)
            .finish_non_exhaustive()
    }
}

impl LeafCursor {
    pub fn new(pages: PageIter, max_def_level: i16) -> Self {
        LeafCursor {
            pages,
            page: None,
            slot: 0,
            value: 0,
            max_def_level,
        }
    }

    /// Make sure the current page has a slot left, pulling the next page if
    /// needed. Returns false when the column is exhausted.
    fn load(&mut self) -> Result<bool> {
        loop {
            if let Some(page) = &self.page {
                if self.slot < page.len() {
                    return Ok(true);
                }
            }
            match self.pages.next() {
                Some(page) => {
                    self.page = Some(page?);
                    self.slot = 0;
                    self.value = 0;
                }
                None => {
                    self.page = None;
                    return Ok(false);
                }
            }
        }
    }

    fn current(&mut self) -> Result<&ColumnData> {
        if !self.load()? {
            return Err(RivetError::invalid_format("Column ended before the last record"));
        }
        self.page
            .as_ref()
            .ok_or_else(|| RivetError::invalid_format("Column ended before the last record"))
    }

    /// Repetition level of the next slot, `None` at the end of the column.
    pub fn peek_rep(&mut self) -> Result<Option<i16>> {
        if !self.load()? {
            return Ok(None);
        }
        Ok(self.page.as_ref().map(|p| p.rep_levels[self.slot]))
    }

    pub fn peek_def(&mut self) -> Result<i16> {
        let slot = self.slot;
        Ok(self.current()?.def_levels[slot])
    }

    /// Move past the next slot.
    pub fn skip(&mut self) -> Result<()> {
        let def = self.peek_def()?;
        if def == self.max_def_level {
            self.value += 1;
        }
        self.slot += 1;
        Ok(())
    }

    /// Take the value of the next slot, which must be at the max definition
    /// level.
    pub fn next_value(&mut self) -> Result<Value> {
        let def = self.peek_def()?;
        if def != self.max_def_level {
            return Err(RivetError::invalid_format(format!(
                "Unexpected definition level {def} for required value (max {})",
                self.max_def_level
            )));
        }
        let idx = self.value;
        let value = match &mut self.page {
            Some(page) => page.values.get_mut(idx).map(|v| std::mem::replace(v, Value::Null)),
            None => None,
        }
        .ok_or_else(|| RivetError::invalid_format("Page has fewer values than definition levels"))?;

        self.value += 1;
        self.slot += 1;
        Ok(value)
    }
}

/// Assembles records from leaf cursors.
#[derive(Debug)]
pub struct RecordAssembler {
    root: Field,
    /// Cursors indexed by leaf index. Only leaves under `root` need one.
    cursors: Vec<Option<LeafCursor>>,
}

impl RecordAssembler {
    pub fn new(root: Field, cursors: Vec<Option<LeafCursor>>) -> Self {
        RecordAssembler { root, cursors }
    }

    /// Assemble the next record.
    ///
    /// The caller is responsible for knowing how many records there are.
    pub fn next_record(&mut self) -> Result<Value> {
        // The record itself is never null, even if every column is.
        match &self.root.kind {
            FieldKind::Struct { names, children } => Ok(Value::Struct(read_struct_fields(
                names,
                children,
                &mut self.cursors,
            )?)),
            _ => read_field(&self.root, &mut self.cursors),
        }
    }
}

fn cursor(cursors: &mut [Option<LeafCursor>], leaf: usize) -> Result<&mut LeafCursor> {
    cursors
        .get_mut(leaf)
        .and_then(Option::as_mut)
        .ok_or_else(|| RivetError::new(format!("Missing cursor for leaf {leaf}")))
}

/// Skip one slot in every leaf below `field`.
fn skip_field(field: &Field, cursors: &mut [Option<LeafCursor>]) -> Result<()> {
    for &leaf in &field.leaves {
        cursor(cursors, leaf)?.skip()?;
    }
    Ok(())
}

/// Whether another element of a list or map at `rep_level` follows.
fn has_next(field: &Field, rep_level: i16, cursors: &mut [Option<LeafCursor>]) -> Result<bool> {
    let Some(leaf) = field.first_leaf() else {
        return Ok(false);
    };
    Ok(matches!(cursor(cursors, leaf)?.peek_rep()?, Some(rep) if rep >= rep_level))
}

/// Whether the definition level of the next slot reaches `def_level`.
///
/// Fields without leaves are always present.
fn is_defined(field: &Field, def_level: i16, cursors: &mut [Option<LeafCursor>]) -> Result<bool> {
    match field.first_leaf() {
        Some(leaf) => Ok(cursor(cursors, leaf)?.peek_def()? >= def_level),
        None => Ok(true),
    }
}

fn read_struct_fields(
    names: &[String],
    children: &[Field],
    cursors: &mut [Option<LeafCursor>],
) -> Result<Vec<(String, Value)>> {
    let mut fields = Vec::with_capacity(children.len());
    for (name, child) in names.iter().zip(children) {
        fields.push((name.clone(), read_field(child, cursors)?));
    }
    Ok(fields)
}

fn read_field(field: &Field, cursors: &mut [Option<LeafCursor>]) -> Result<Value> {
    match &field.kind {
        FieldKind::Primitive { leaf } => cursor(cursors, *leaf)?.next_value(),
        FieldKind::Optional { def_level, child } => {
            if is_defined(field, *def_level, cursors)? {
                read_field(child, cursors)
            } else {
                skip_field(field, cursors)?;
                Ok(Value::Null)
            }
        }
        FieldKind::Struct { names, children } => {
            let fields = read_struct_fields(names, children, cursors)?;
            // A struct with only null fields is null. Empty structs aren't.
            if !fields.is_empty() && fields.iter().all(|(_, v)| v.is_null()) {
                Ok(Value::Null)
            } else {
                Ok(Value::Struct(fields))
            }
        }
        FieldKind::List {
            def_level,
            rep_level,
            element,
        } => {
            if field.leaves.is_empty() {
                return Ok(Value::List(Vec::new()));
            }
            if !is_defined(field, *def_level, cursors)? {
                skip_field(field, cursors)?;
                return Ok(Value::List(Vec::new()));
            }
            let mut items = Vec::new();
            loop {
                items.push(read_field(element, cursors)?);
                if !has_next(field, *rep_level, cursors)? {
                    break;
                }
            }
            Ok(Value::List(items))
        }
        FieldKind::Map {
            def_level,
            rep_level,
            key,
            value,
        } => {
            if field.leaves.is_empty() {
                return Ok(Value::Map(Vec::new()));
            }
            if !is_defined(field, *def_level, cursors)? {
                skip_field(field, cursors)?;
                return Ok(Value::Map(Vec::new()));
            }
            let mut entries = Vec::new();
            loop {
                let k = read_field(key, cursors)?;
                let v = read_field(value, cursors)?;
                entries.push((k, v));
                if !has_next(field, *rep_level, cursors)? {
                    break;
                }
            }
            Ok(Value::Map(entries))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LeafSlots, Shredder};
    use crate::schema::{FieldDef, Schema};
    use crate::types::{LogicalType, PhysicalType, Repetition};

    /// Split shredded slots into pages of `page_len` slots each.
    fn cursor_from_slots(slots: LeafSlots, max_def: i16, page_len: usize) -> LeafCursor {
        let pages: Vec<_> = slots
            .chunks(page_len)
            .map(|chunk| {
                Ok(ColumnData {
                    physical_type: PhysicalType::Int32,
                    logical_type: None,
                    rep_levels: chunk.iter().map(|s| s.0).collect(),
                    def_levels: chunk.iter().map(|s| s.1).collect(),
                    values: chunk.iter().filter_map(|s| s.2.clone()).collect(),
                })
            })
            .collect();
        LeafCursor::new(Box::new(pages.into_iter()), max_def)
    }

    /// Shred records, then assemble them back.
    fn roundtrip(schema: &Schema, records: &[Value], page_len: usize) -> Vec<Value> {
        let shredder = Shredder::new(schema, true);
        let mut columns = vec![Vec::new(); schema.num_leaves()];
        for record in records {
            for (col, slots) in columns.iter_mut().zip(shredder.shred(record).unwrap()) {
                col.extend(slots);
            }
        }

        let cursors = columns
            .into_iter()
            .zip(schema.leaves())
            .map(|(slots, leaf)| Some(cursor_from_slots(slots, leaf.max_def_level, page_len)))
            .collect();
        let mut assembler = RecordAssembler::new(Field::from_schema(schema), cursors);
        (0..records.len())
            .map(|_| assembler.next_record().unwrap())
            .collect()
    }

    #[test]
    fn optional_booleans() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("b", Repetition::Optional, PhysicalType::Boolean)],
        )
        .unwrap();
        let records: Vec<_> = [Some(true), None, Some(false), None, Some(true)]
            .into_iter()
            .map(|b| Value::new_struct([("b", Value::from(b))]))
            .collect();
        assert_eq!(records, roundtrip(&schema, &records, 2));
    }

    #[test]
    fn list_null_and_empty() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::list(
                "l",
                Repetition::Optional,
                FieldDef::primitive("e", Repetition::Optional, PhysicalType::Int32),
            )],
        )
        .unwrap();
        let rows = [
            Value::List(vec![1.into(), 2.into()]),
            Value::List(vec![]),
            Value::Null,
            Value::List(vec![3.into()]),
            Value::List(vec![Value::Null, 4.into()]),
        ];
        let records: Vec<_> = rows
            .into_iter()
            .map(|r| Value::new_struct([("l", r)]))
            .collect();

        for page_len in [1, 3, 100] {
            assert_eq!(records, roundtrip(&schema, &records, page_len));
        }
    }

    #[test]
    fn list_of_struct_of_map() {
        let map = FieldDef::map(
            "m",
            Repetition::Optional,
            FieldDef::primitive("k", Repetition::Required, PhysicalType::ByteArray)
                .with_logical_type(LogicalType::String),
            FieldDef::list(
                "v",
                Repetition::Optional,
                FieldDef::primitive("x", Repetition::Required, PhysicalType::Int64),
            ),
        );
        let schema = Schema::new(
            "s",
            vec![FieldDef::list(
                "outer",
                Repetition::Optional,
                FieldDef::group(
                    "item",
                    Repetition::Optional,
                    vec![
                        FieldDef::primitive("id", Repetition::Required, PhysicalType::Int32),
                        map,
                    ],
                ),
            )],
        )
        .unwrap();

        let item = |id: i32, m: Value| Value::new_struct([("id", Value::Int32(id)), ("m", m)]);
        let records = vec![
            Value::new_struct([(
                "outer",
                Value::List(vec![
                    item(
                        1,
                        Value::Map(vec![
                            ("a".into(), Value::List(vec![Value::Int64(1), Value::Int64(2)])),
                            ("b".into(), Value::Null),
                            ("c".into(), Value::List(vec![])),
                        ]),
                    ),
                    Value::Null,
                    item(2, Value::Null),
                    item(3, Value::Map(vec![])),
                ]),
            )]),
            Value::new_struct([("outer", Value::Null)]),
            Value::new_struct([("outer", Value::List(vec![]))]),
        ];

        assert_eq!(records, roundtrip(&schema, &records, 2));
    }

    #[test]
    fn bare_repeated_and_empty_struct() {
        let schema = Schema::new(
            "s",
            vec![
                FieldDef::primitive("r", Repetition::Repeated, PhysicalType::Int32),
                FieldDef::group("e", Repetition::Optional, vec![]),
                FieldDef::group(
                    "g",
                    Repetition::Required,
                    vec![FieldDef::list(
                        "inner",
                        Repetition::Required,
                        FieldDef::primitive("x", Repetition::Required, PhysicalType::Int32),
                    )],
                ),
            ],
        )
        .unwrap();

        let records = vec![
            Value::new_struct([
                ("r", Value::List(vec![1.into(), 2.into()])),
                ("e", Value::new_struct::<&str, _>([])),
                ("g", Value::new_struct([("inner", Value::List(vec![]))])),
            ]),
            Value::new_struct([
                ("r", Value::List(vec![])),
                ("e", Value::new_struct::<&str, _>([])),
                ("g", Value::new_struct([("inner", Value::List(vec![7.into()]))])),
            ]),
        ];
        assert_eq!(records, roundtrip(&schema, &records, 4));
    }

    #[test]
    fn struct_with_only_null_fields_is_null() {
        let point = |repetition| {
            FieldDef::group(
                "p",
                repetition,
                vec![
                    FieldDef::primitive("x", Repetition::Optional, PhysicalType::Int32),
                    FieldDef::primitive("y", Repetition::Optional, PhysicalType::Int32),
                ],
            )
        };
        let schema = Schema::new(
            "s",
            vec![
                point(Repetition::Optional),
                FieldDef::group("e", Repetition::Required, vec![]),
            ],
        )
        .unwrap();

        let record = |p: Value| {
            Value::new_struct([("p", p), ("e", Value::new_struct::<&str, _>([]))])
        };
        let all_null = Value::new_struct([("x", Value::Null), ("y", Value::Null)]);
        let half_null = Value::new_struct([("x", Value::Null), ("y", Value::Int32(3))]);

        let got = roundtrip(
            &schema,
            &[record(all_null), record(Value::Null), record(half_null.clone())],
            2,
        );
        assert_eq!(
            vec![record(Value::Null), record(Value::Null), record(half_null)],
            got
        );

        // Same for required structs.
        let schema = Schema::new("s", vec![point(Repetition::Required)]).unwrap();
        let records = [Value::new_struct([(
            "p",
            Value::new_struct([("x", Value::Null), ("y", Value::Null)]),
        )])];
        assert_eq!(
            vec![Value::new_struct([("p", Value::Null)])],
            roundtrip(&schema, &records, 2)
        );

        // The record itself stays a struct.
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("x", Repetition::Optional, PhysicalType::Int32)],
        )
        .unwrap();
        let records = [Value::new_struct([("x", Value::Null)])];
        assert_eq!(records.to_vec(), roundtrip(&schema, &records, 2));
    }

    #[test]
    fn column_ends_early() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("a", Repetition::Required, PhysicalType::Int32)],
        )
        .unwrap();
        let cursors = vec![Some(cursor_from_slots(Vec::new(), 0, 1))];
        let mut assembler = RecordAssembler::new(Field::from_schema(&schema), cursors);
        let err = assembler.next_record().unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());
    }
}
