use rivet_error::{ErrorKind, Result, ResultExt};
use thrift::protocol::{
    TCompactInputProtocol,
    TCompactOutputProtocol,
    TFieldIdentifier,
    TInputProtocol,
    TListIdentifier,
    TOutputProtocol,
    TStructIdentifier,
    TType,
};

/// Reads and writes the struct to Thrift protocols.
///
/// Unlike [`thrift::protocol::TSerializable`] this uses generics instead of trait objects
pub trait TSerializable: Sized {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self>;
    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()>;
}

/// Deserialize a struct from the start of `buf` using the compact protocol.
///
/// Returns the struct along with the number of bytes it took up.
pub fn read_compact<S: TSerializable>(buf: &[u8]) -> Result<(S, usize)> {
    let mut cursor = buf;
    let s = {
        let mut prot = TCompactInputProtocol::new(&mut cursor);
        S::read_from_in_protocol(&mut prot)
            .context_kind(ErrorKind::InvalidFormat, "Failed to decode thrift struct")?
    };
    Ok((s, buf.len() - cursor.len()))
}

/// Serialize a struct with the compact protocol, appending to `out`.
pub fn write_compact<S: TSerializable>(s: &S, out: &mut Vec<u8>) -> Result<()> {
    let mut prot = TCompactOutputProtocol::new(out);
    s.write_to_out_protocol(&mut prot)
        .context("Failed to encode thrift struct")?;
    prot.flush().context("Failed to flush thrift protocol")?;
    Ok(())
}

pub fn missing_field(strct: &str, field: &str) -> thrift::Error {
    thrift::Error::Protocol(thrift::ProtocolError::new(
        thrift::ProtocolErrorKind::InvalidData,
        format!("Missing required field {strct}.{field}"),
    ))
}

/// Reads a list using `read_elem` for each element.
pub fn read_list<T, P, F>(i_prot: &mut P, mut read_elem: F) -> thrift::Result<Vec<T>>
where
    P: TInputProtocol,
    F: FnMut(&mut P) -> thrift::Result<T>,
{
    let ident = i_prot.read_list_begin()?;
    if ident.size < 0 {
        return Err(thrift::Error::Protocol(thrift::ProtocolError::new(
            thrift::ProtocolErrorKind::NegativeSize,
            format!("Negative list size: {}", ident.size),
        )));
    }
    // Don't trust the size for preallocation, the input might be garbage.
    let mut out = Vec::with_capacity((ident.size as usize).min(1024));
    for _ in 0..ident.size {
        out.push(read_elem(i_prot)?);
    }
    i_prot.read_list_end()?;
    Ok(out)
}

pub fn write_list<T, P, F>(
    o_prot: &mut P,
    elem_type: TType,
    items: &[T],
    mut write_elem: F,
) -> thrift::Result<()>
where
    P: TOutputProtocol,
    F: FnMut(&mut P, &T) -> thrift::Result<()>,
{
    o_prot.write_list_begin(&TListIdentifier::new(elem_type, items.len() as i32))?;
    for item in items {
        write_elem(o_prot, item)?;
    }
    o_prot.write_list_end()
}

/// Write a field header.
pub fn field_begin<P: TOutputProtocol>(
    o_prot: &mut P,
    name: &str,
    field_type: TType,
    id: i16,
) -> thrift::Result<()> {
    o_prot.write_field_begin(&TFieldIdentifier::new(name, field_type, id))
}

pub fn write_i32_field<P: TOutputProtocol>(
    o_prot: &mut P,
    name: &str,
    id: i16,
    v: i32,
) -> thrift::Result<()> {
    field_begin(o_prot, name, TType::I32, id)?;
    o_prot.write_i32(v)?;
    o_prot.write_field_end()
}

pub fn write_i64_field<P: TOutputProtocol>(
    o_prot: &mut P,
    name: &str,
    id: i16,
    v: i64,
) -> thrift::Result<()> {
    field_begin(o_prot, name, TType::I64, id)?;
    o_prot.write_i64(v)?;
    o_prot.write_field_end()
}

pub fn write_bool_field<P: TOutputProtocol>(
    o_prot: &mut P,
    name: &str,
    id: i16,
    v: bool,
) -> thrift::Result<()> {
    field_begin(o_prot, name, TType::Bool, id)?;
    o_prot.write_bool(v)?;
    o_prot.write_field_end()
}

pub fn write_string_field<P: TOutputProtocol>(
    o_prot: &mut P,
    name: &str,
    id: i16,
    v: &str,
) -> thrift::Result<()> {
    field_begin(o_prot, name, TType::String, id)?;
    o_prot.write_string(v)?;
    o_prot.write_field_end()
}

pub fn write_binary_field<P: TOutputProtocol>(
    o_prot: &mut P,
    name: &str,
    id: i16,
    v: &[u8],
) -> thrift::Result<()> {
    field_begin(o_prot, name, TType::String, id)?;
    o_prot.write_bytes(v)?;
    o_prot.write_field_end()
}

pub fn write_struct_field<P: TOutputProtocol, S: TSerializable>(
    o_prot: &mut P,
    name: &str,
    id: i16,
    v: &S,
) -> thrift::Result<()> {
    field_begin(o_prot, name, TType::Struct, id)?;
    v.write_to_out_protocol(o_prot)?;
    o_prot.write_field_end()
}

/// An empty struct, used as the payload of union variants that carry no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmptyStruct;

impl TSerializable for EmptyStruct {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        i_prot.read_struct_begin()?;
        loop {
            let field = i_prot.read_field_begin()?;
            if field.field_type == TType::Stop {
                break;
            }
            i_prot.skip(field.field_type)?;
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(EmptyStruct)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Empty"))?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}
