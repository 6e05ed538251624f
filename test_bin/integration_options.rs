mod common;

use rivet_error::ErrorKind;
use rivet_parquet::page::PageType;
use rivet_parquet::schema::FieldDef;
use rivet_parquet::types::{LogicalType, PhysicalType, Repetition, TimeUnit};
use rivet_parquet::{ReaderOptions, Schema, Value, WriterOptions};

fn schema() -> Schema {
    Schema::new(
        "schema",
        vec![
            FieldDef::primitive("id", Repetition::Required, PhysicalType::Int64),
            FieldDef::primitive("color", Repetition::Optional, PhysicalType::ByteArray)
                .with_logical_type(LogicalType::String),
            FieldDef::primitive("blob", Repetition::Required, PhysicalType::ByteArray),
        ],
    )
    .unwrap()
}

fn record(i: i64) -> Value {
    let color = match i % 4 {
        0 => Value::Null,
        1 => Value::from("red"),
        2 => Value::from("green"),
        _ => Value::from("blue"),
    };
    Value::new_struct([
        ("id", Value::Int64(i)),
        ("color", color),
        ("blob", Value::Binary(format!("blob-{i}").into_bytes())),
    ])
}

#[test]
fn projection_offset_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..100).map(record).collect();
    let options = WriterOptions::builder()
        .row_group_size(256)
        .row_group_check_interval(10)
        .build()
        .unwrap();
    let (path, metadata) =
        common::write_file(dir.path(), "proj.parquet", schema(), options, &records).unwrap();
    assert!(metadata.row_groups.len() > 1);

    let file = common::open(&path, ReaderOptions::default()).unwrap();
    let reader = file.reader().project(&["color", "id"]).unwrap();

    let got: Vec<_> = reader
        .records_with(42, 11)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let expected: Vec<_> = records[42..53]
        .iter()
        .map(|r| {
            Value::new_struct([
                ("color", r.field("color").cloned().unwrap()),
                ("id", r.field("id").cloned().unwrap()),
            ])
        })
        .collect();
    assert_eq!(expected, got);

    // Reading past the end just stops.
    let got: Vec<_> = reader
        .records_with(95, 100)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(5, got.len());
    assert_eq!(0, reader.records_with(500, 1).unwrap().count());

    // Records can be read more than once.
    assert_eq!(100, reader.records().count());
    assert_eq!(100, reader.records().count());

    assert_eq!(
        ErrorKind::OutOfRange,
        reader.records_with(0, 0).unwrap_err().kind()
    );
    assert_eq!(
        ErrorKind::OutOfRange,
        file.reader().project(&["nope"]).unwrap_err().kind()
    );
}

#[test]
fn statistics_and_dictionary() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..100).map(record).collect();
    let (path, _) = common::write_file(
        dir.path(),
        "stats.parquet",
        schema(),
        WriterOptions::default(),
        &records,
    )
    .unwrap();

    let file = common::open(&path, ReaderOptions::default()).unwrap();
    let row_group = &file.metadata().row_groups[0];
    assert_eq!(100, row_group.num_rows);

    // Unique ids aren't worth a dictionary.
    let id = &row_group.columns[0];
    assert_eq!(None, id.dictionary_page_offset);
    let stats = id.statistics.as_ref().unwrap();
    assert_eq!(Some(0_i64.to_le_bytes().to_vec()), stats.min);
    assert_eq!(Some(99_i64.to_le_bytes().to_vec()), stats.max);
    assert_eq!(Some(0), stats.null_count);
    assert_eq!(None, stats.distinct_count);

    let color = &row_group.columns[1];
    assert!(color.dictionary_page_offset.is_some());
    let stats = color.statistics.as_ref().unwrap();
    assert_eq!(Some(b"blue".to_vec()), stats.min);
    assert_eq!(Some(b"red".to_vec()), stats.max);
    assert_eq!(Some(25), stats.null_count);
    assert_eq!(Some(3), stats.distinct_count);

    let headers = file.page_headers(0, 1).unwrap();
    assert_eq!(PageType::DictionaryPage, headers[0].page_type());
    assert!(headers[1..]
        .iter()
        .all(|h| h.page_type() == PageType::DataPage));
    let total: usize = headers[1..].iter().map(|h| h.num_values()).sum();
    assert_eq!(100, total);

    assert_eq!(
        ErrorKind::OutOfRange,
        file.page_headers(1, 0).unwrap_err().kind()
    );
}

#[test]
fn key_value_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let options = WriterOptions::builder()
        .key_value("origin", Some("integration".to_string()))
        .key_value("flag", None)
        .created_by("rivet tests")
        .build()
        .unwrap();
    let (path, _) =
        common::write_file(dir.path(), "kv.parquet", schema(), options, &[record(1)]).unwrap();

    let file = common::open(&path, ReaderOptions::default()).unwrap();
    let metadata = file.metadata();
    assert_eq!(Some("integration"), metadata.key_value("origin"));
    assert_eq!(None, metadata.key_value("flag"));
    assert!(metadata
        .key_value_metadata
        .contains(&("flag".to_string(), None)));
    assert_eq!(Some("rivet tests"), metadata.created_by.as_deref());
}

#[test]
fn empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let (path, metadata) = common::write_file(
        dir.path(),
        "empty.parquet",
        schema(),
        WriterOptions::default(),
        &[],
    )
    .unwrap();
    assert_eq!(0, metadata.num_rows);
    assert!(metadata.row_groups.is_empty());

    assert!(common::read_all(&path).unwrap().is_empty());
}

#[test]
fn byte_arrays_as_strings() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = common::write_file(
        dir.path(),
        "strings.parquet",
        schema(),
        WriterOptions::default(),
        &[record(3)],
    )
    .unwrap();

    let file = common::open(&path, ReaderOptions::default()).unwrap();
    let got = file.reader().project(&["blob"]).unwrap().records().next().unwrap().unwrap();
    assert_eq!(Value::new_struct([("blob", Value::Binary(b"blob-3".to_vec()))]), got);

    let options = ReaderOptions {
        byte_array_as_string: true,
        ..Default::default()
    };
    let file = common::open(&path, options).unwrap();
    let got = file.reader().project(&["blob"]).unwrap().records().next().unwrap().unwrap();
    assert_eq!(Value::new_struct([("blob", Value::from("blob-3"))]), got);
}

#[test]
fn int96_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(
        "schema",
        vec![FieldDef::primitive("at", Repetition::Optional, PhysicalType::Int96)],
    )
    .unwrap();
    let nanos = 1_700_000_000_123_456_789_i64;
    let records = vec![
        Value::new_struct([("at", Value::Timestamp(nanos, TimeUnit::Nanos))]),
        Value::new_struct([("at", Value::Null)]),
    ];
    let (path, _) = common::write_file(
        dir.path(),
        "int96.parquet",
        schema,
        WriterOptions::default(),
        &records,
    )
    .unwrap();

    let options = ReaderOptions {
        int96_as_timestamp: true,
        ..Default::default()
    };
    let got = common::open(&path, options)
        .unwrap()
        .reader()
        .records()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(records, got);

    let options = ReaderOptions {
        int96_as_timestamp: true,
        round_nanoseconds: true,
        ..Default::default()
    };
    let got = common::open(&path, options)
        .unwrap()
        .reader()
        .records()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(
        Value::new_struct([("at", Value::Timestamp(1_700_000_000_123_457, TimeUnit::Micros))]),
        got
    );

    // Without the option the raw int96 comes back.
    let got = common::read_all(&path).unwrap();
    assert!(matches!(got[0].field("at"), Some(Value::Int96(_))));
}
