//! Message type text form of a schema.
//!
//! ```text
//! message schema {
//!   optional int32 a;
//!   optional group b (LIST) {
//!     repeated group list {
//!       optional binary element (STRING);
//!     }
//!   }
//! }
//! ```
use std::fmt;

use super::{ColumnId, ColumnKind, Schema};

impl Schema {
    fn fmt_column(&self, f: &mut fmt::Formatter<'_>, id: ColumnId, indent: usize) -> fmt::Result {
        let col = self.column(id);
        let pad = "  ".repeat(indent);
        let repetition = col
            .repetition
            .map(|r| r.to_string())
            .unwrap_or_else(|| "required".to_string());

        match &col.kind {
            ColumnKind::Flat(flat) => {
                write!(f, "{pad}{repetition} {} {}", flat.physical_type, col.name)?;
                if let Some(logical) = col.logical_type {
                    write!(f, " ({logical})")?;
                }
                if let Some(field_id) = col.field_id {
                    write!(f, " = {field_id}")?;
                }
                writeln!(f, ";")
            }
            ColumnKind::Nested(nested) => {
                write!(f, "{pad}{repetition} group {}", col.name)?;
                if let Some(logical) = col.logical_type {
                    write!(f, " ({logical})")?;
                }
                if let Some(field_id) = col.field_id {
                    write!(f, " = {field_id}")?;
                }
                writeln!(f, " {{")?;
                for &child in &nested.children {
                    self.fmt_column(f, child, indent + 1)?;
                }
                writeln!(f, "{pad}}}")
            }
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "message {} {{", self.name())?;
        for &child in self.top_level() {
            self.fmt_column(f, child, 1)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::FieldDef;
    use crate::types::{LogicalType, PhysicalType, Repetition};

    use super::*;

    #[test]
    fn print_nested() {
        let schema = Schema::new(
            "schema",
            vec![
                FieldDef::primitive("a", Repetition::Optional, PhysicalType::Int32),
                FieldDef::list(
                    "b",
                    Repetition::Optional,
                    FieldDef::primitive("x", Repetition::Optional, PhysicalType::ByteArray)
                        .with_logical_type(LogicalType::String),
                ),
            ],
        )
        .unwrap();

        let expected = "\
message schema {
  optional int32 a;
  optional group b (LIST) {
    repeated group list {
      optional binary element (STRING);
    }
  }
}";
        assert_eq!(expected, schema.to_string());
    }
}
