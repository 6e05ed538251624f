//! Column chunk dictionaries.
use rivet_error::{Result, RivetError};

use crate::value::Value;

/// Decoded values of a dictionary page.
///
/// Values are stored already converted to their logical representation so
/// resolving an index is just a clone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    values: Vec<Value>,
}

impl Dictionary {
    pub fn new(values: Vec<Value>) -> Self {
        Dictionary { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Look up each index, appending the values to `out`.
    pub fn resolve(&self, indices: &[u64], out: &mut Vec<Value>) -> Result<()> {
        out.reserve(indices.len());
        for &idx in indices {
            let value = self.values.get(idx as usize).ok_or_else(|| {
                RivetError::invalid_format(format!(
                    "Dictionary index {idx} out of bounds for dictionary of size {}",
                    self.values.len()
                ))
            })?;
            out.push(value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_indices() {
        let dict = Dictionary::new(vec!["a".into(), "b".into(), "c".into()]);
        let mut out = Vec::new();
        dict.resolve(&[0, 2, 1, 0], &mut out).unwrap();
        assert_eq!(
            vec![Value::from("a"), "c".into(), "b".into(), "a".into()],
            out
        );
    }

    #[test]
    fn index_out_of_bounds() {
        let dict = Dictionary::new(vec![Value::Int32(1)]);
        let err = dict.resolve(&[1], &mut Vec::new()).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());
    }
}
