use crate::types::{ConvertedType, LogicalType, PhysicalType, Repetition};

/// Description of a field used to build a [`Schema`](super::Schema).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub repetition: Repetition,
    pub logical_type: Option<LogicalType>,
    /// Legacy annotation. Only consulted when there's no logical type.
    pub converted_type: Option<ConvertedType>,
    pub field_id: Option<i32>,
    pub kind: FieldDefKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefKind {
    Primitive {
        physical_type: PhysicalType,
        precision: Option<i32>,
        scale: Option<i32>,
    },
    Group(Vec<FieldDef>),
}

impl FieldDef {
    pub fn primitive(
        name: impl Into<String>,
        repetition: Repetition,
        physical: PhysicalType,
    ) -> Self {
        FieldDef {
            name: name.into(),
            repetition,
            logical_type: None,
            converted_type: None,
            field_id: None,
            kind: FieldDefKind::Primitive {
                physical_type: physical,
                precision: None,
                scale: None,
            },
        }
    }

    pub fn group(name: impl Into<String>, repetition: Repetition, children: Vec<FieldDef>) -> Self {
        FieldDef {
            name: name.into(),
            repetition,
            logical_type: None,
            converted_type: None,
            field_id: None,
            kind: FieldDefKind::Group(children),
        }
    }

    /// A three level LIST group wrapping `element`.
    ///
    /// ```text
    /// <repetition> group <name> (LIST) {
    ///   repeated group list {
    ///     <element repetition> <element type> element;
    ///   }
    /// }
    /// ```
    pub fn list(name: impl Into<String>, repetition: Repetition, element: FieldDef) -> Self {
        let element = element.with_name("element");
        let wrapper = FieldDef::group("list", Repetition::Repeated, vec![element]);
        FieldDef::group(name, repetition, vec![wrapper]).with_logical_type(LogicalType::List)
    }

    /// A MAP group with a repeated `key_value` child holding `key` and
    /// `value`.
    ///
    /// Keys are always required.
    pub fn map(
        name: impl Into<String>,
        repetition: Repetition,
        key: FieldDef,
        value: FieldDef,
    ) -> Self {
        let mut key = key.with_name("key");
        key.repetition = Repetition::Required;
        let value = value.with_name("value");
        let key_value = FieldDef::group("key_value", Repetition::Repeated, vec![key, value]);
        FieldDef::group(name, repetition, vec![key_value]).with_logical_type(LogicalType::Map)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the logical type. For decimals this also sets precision and scale.
    pub fn with_logical_type(mut self, logical: LogicalType) -> Self {
        if let (
            LogicalType::Decimal {
                precision: p,
                scale: s,
            },
            FieldDefKind::Primitive {
                precision, scale, ..
            },
        ) = (&logical, &mut self.kind)
        {
            *precision = Some(*p);
            *scale = Some(*s);
        }
        self.logical_type = Some(logical);
        self
    }

    pub fn with_converted_type(mut self, converted: ConvertedType) -> Self {
        self.converted_type = Some(converted);
        self
    }

    pub fn with_field_id(mut self, id: i32) -> Self {
        self.field_id = Some(id);
        self
    }

    /// The logical type, falling back to the legacy converted type.
    pub(crate) fn effective_logical_type(&self) -> Option<LogicalType> {
        if self.logical_type.is_some() {
            return self.logical_type;
        }
        let (precision, scale) = match &self.kind {
            FieldDefKind::Primitive {
                precision, scale, ..
            } => (*precision, *scale),
            FieldDefKind::Group(_) => (None, None),
        };
        self.converted_type
            .and_then(|c| c.to_logical(precision, scale))
    }
}
