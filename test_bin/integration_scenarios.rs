mod common;

use rivet_error::ErrorKind;
use rivet_io::{FileSink, FileSystemProvider, LocalFileSystem};
use rivet_parquet::schema::FieldDef;
use rivet_parquet::types::{PhysicalType, Repetition};
use rivet_parquet::{ReaderOptions, Schema, Value, WriterOptions};

#[test]
fn boolean_column_with_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(
        "schema",
        vec![FieldDef::primitive("flag", Repetition::Optional, PhysicalType::Boolean)],
    )
    .unwrap();
    let values = [
        Value::Boolean(true),
        Value::Null,
        Value::Boolean(false),
        Value::Null,
        Value::Boolean(true),
    ];
    let records: Vec<_> = values
        .iter()
        .map(|v| Value::new_struct([("flag", v.clone())]))
        .collect();

    let (path, _) = common::write_file(
        dir.path(),
        "bools.parquet",
        schema,
        WriterOptions::default(),
        &records,
    )
    .unwrap();

    let file = common::open(&path, ReaderOptions::default()).unwrap();
    assert_eq!(1, file.schema().leaf(0).unwrap().max_def_level);

    // Raw page contents.
    let page = file
        .column_chunk_reader(0, 0)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(vec![1, 0, 1, 0, 1], page.def_levels);
    assert_eq!(
        vec![Value::Boolean(true), Value::Boolean(false), Value::Boolean(true)],
        page.values
    );

    assert_eq!(records, common::read_all(&path).unwrap());
}

#[test]
fn list_of_ints() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(
        "schema",
        vec![FieldDef::list(
            "numbers",
            Repetition::Optional,
            FieldDef::primitive("element", Repetition::Required, PhysicalType::Int32),
        )],
    )
    .unwrap();
    let rows = [
        Value::List(vec![Value::Int32(1), Value::Int32(2)]),
        Value::List(vec![]),
        Value::Null,
        Value::List(vec![Value::Int32(3)]),
    ];
    let records: Vec<_> = rows
        .iter()
        .map(|v| Value::new_struct([("numbers", v.clone())]))
        .collect();

    let (path, _) = common::write_file(
        dir.path(),
        "lists.parquet",
        schema,
        WriterOptions::default(),
        &records,
    )
    .unwrap();

    let file = common::open(&path, ReaderOptions::default()).unwrap();
    let page = file
        .column_chunk_reader(0, 0)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(vec![0, 1, 0, 0, 0], page.rep_levels);
    assert_eq!(vec![2, 2, 1, 0, 2], page.def_levels);

    assert_eq!(records, common::read_all(&path).unwrap());
}

#[test]
fn bad_magic_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.parquet");

    let mut sink = LocalFileSystem.sink(&path).unwrap();
    sink.write_all(b"PAR1").unwrap();
    // Would be a garbage footer if it were ever parsed.
    sink.write_all(&[0xff; 32]).unwrap();
    sink.write_all(&8_u32.to_le_bytes()).unwrap();
    sink.write_all(b"RAP1").unwrap();
    sink.finish().unwrap();

    let err = common::open(&path, ReaderOptions::default()).unwrap_err();
    assert_eq!(ErrorKind::InvalidFormat, err.kind());
}

#[test]
fn truncated_footer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.parquet");

    let mut sink = LocalFileSystem.sink(&path).unwrap();
    sink.write_all(b"PAR1").unwrap();
    sink.write_all(&1000_u32.to_le_bytes()).unwrap();
    sink.write_all(b"PAR1").unwrap();
    sink.finish().unwrap();

    let err = common::open(&path, ReaderOptions::default()).unwrap_err();
    assert_eq!(ErrorKind::InvalidFormat, err.kind());
}

#[test]
fn record_not_matching_schema() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(
        "schema",
        vec![FieldDef::primitive("id", Repetition::Required, PhysicalType::Int64)],
    )
    .unwrap();

    let sink = LocalFileSystem.sink(&dir.path().join("bad.parquet")).unwrap();
    let mut writer = rivet_parquet::Writer::new(sink, schema, WriterOptions::default()).unwrap();

    let err = writer.write(&Value::new_struct([("id", Value::Null)])).unwrap_err();
    assert_eq!(ErrorKind::SchemaViolation, err.kind());

    let err = writer
        .write(&Value::new_struct([("id", Value::from("one"))]))
        .unwrap_err();
    assert_eq!(ErrorKind::SchemaViolation, err.kind());

    let err = writer
        .write(&Value::new_struct([("id", Value::Int64(1)), ("extra", Value::Int64(2))]))
        .unwrap_err();
    assert_eq!(ErrorKind::SchemaViolation, err.kind());

    // Failed writes don't count.
    writer.write(&Value::new_struct([("id", Value::Int64(1))])).unwrap();
    let metadata = writer.finish().unwrap();
    assert_eq!(1, metadata.num_rows);
}
