mod common;

use rivet_parquet::compression::CompressionCodec;
use rivet_parquet::schema::FieldDef;
use rivet_parquet::types::{LogicalType, PhysicalType, Repetition, TimeUnit};
use rivet_parquet::{ReaderOptions, Schema, Value, WriterOptions, WriterVersion};

fn string(name: &str, repetition: Repetition) -> FieldDef {
    FieldDef::primitive(name, repetition, PhysicalType::ByteArray)
        .with_logical_type(LogicalType::String)
}

fn nested_schema() -> Schema {
    Schema::new(
        "schema",
        vec![
            FieldDef::primitive("id", Repetition::Required, PhysicalType::Int64),
            string("name", Repetition::Optional),
            FieldDef::group(
                "location",
                Repetition::Optional,
                vec![
                    FieldDef::primitive("lat", Repetition::Required, PhysicalType::Double),
                    FieldDef::primitive("lon", Repetition::Required, PhysicalType::Double),
                ],
            ),
            FieldDef::map(
                "attributes",
                Repetition::Optional,
                string("key", Repetition::Required),
                FieldDef::primitive("value", Repetition::Optional, PhysicalType::Int32),
            ),
            FieldDef::list(
                "events",
                Repetition::Required,
                FieldDef::group(
                    "element",
                    Repetition::Optional,
                    vec![
                        string("kind", Repetition::Required),
                        FieldDef::list(
                            "scores",
                            Repetition::Optional,
                            FieldDef::primitive(
                                "element",
                                Repetition::Optional,
                                PhysicalType::Float,
                            ),
                        ),
                    ],
                ),
            ),
        ],
    )
    .unwrap()
}

fn nested_record(i: i64) -> Value {
    let name = match i % 5 {
        0 => Value::Null,
        n => Value::Utf8(format!("user-{n}")),
    };
    let location = if i % 4 == 1 {
        Value::Null
    } else {
        Value::new_struct([
            ("lat", Value::Double(i as f64 * 0.5)),
            ("lon", Value::Double(-(i as f64))),
        ])
    };
    let attributes = match i % 3 {
        0 => Value::Null,
        1 => Value::Map(vec![]),
        _ => Value::Map(vec![
            (Value::from("a"), Value::Int32(i as i32)),
            (Value::from("b"), Value::Null),
        ]),
    };
    let events = (0..i % 4)
        .map(|j| {
            if j == 2 {
                return Value::Null;
            }
            let scores = if j == 1 {
                Value::Null
            } else {
                Value::List(vec![Value::Float(j as f32), Value::Null, Value::Float(1.5)])
            };
            Value::new_struct([("kind", Value::Utf8(format!("kind-{j}"))), ("scores", scores)])
        })
        .collect();

    Value::new_struct([
        ("id", Value::Int64(i)),
        ("name", name),
        ("location", location),
        ("attributes", attributes),
        ("events", Value::List(events)),
    ])
}

fn roundtrip(name: &str, options: WriterOptions) {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..200).map(nested_record).collect();
    let (path, written) =
        common::write_file(dir.path(), name, nested_schema(), options, &records).unwrap();

    let file = common::open(&path, ReaderOptions::default()).unwrap();
    assert_eq!(&written, file.metadata());
    assert_eq!(nested_schema(), *file.schema());
    assert_eq!(records, common::read_all(&path).unwrap());
}

#[test]
fn nested_uncompressed_v1() {
    roundtrip("v1.parquet", WriterOptions::default());
}

#[test]
fn nested_snappy_v1() {
    let options = WriterOptions::builder()
        .compression(CompressionCodec::Snappy)
        .build()
        .unwrap();
    roundtrip("snappy.parquet", options);
}

#[test]
fn nested_gzip_v2() {
    let options = WriterOptions::builder()
        .compression(CompressionCodec::Gzip)
        .writer_version(WriterVersion::V2)
        .build()
        .unwrap();
    roundtrip("gzip_v2.parquet", options);
}

#[test]
fn nested_small_pages_without_dictionary() {
    let options = WriterOptions::builder()
        .page_size(64)
        .dictionary_enabled(false)
        .writer_version(WriterVersion::V2)
        .build()
        .unwrap();
    roundtrip("small_pages.parquet", options);
}

#[test]
fn nested_many_row_groups() {
    let options = WriterOptions::builder()
        .row_group_size(1024)
        .row_group_check_interval(7)
        .compression(CompressionCodec::Snappy)
        .build()
        .unwrap();
    roundtrip("row_groups.parquet", options);
}

#[test]
fn logical_types() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(
        "schema",
        vec![
            FieldDef::primitive("day", Repetition::Required, PhysicalType::Int32)
                .with_logical_type(LogicalType::Date),
            FieldDef::primitive("at", Repetition::Optional, PhysicalType::Int64).with_logical_type(
                LogicalType::Timestamp {
                    is_adjusted_to_utc: true,
                    unit: TimeUnit::Micros,
                },
            ),
            FieldDef::primitive("time", Repetition::Required, PhysicalType::Int32)
                .with_logical_type(LogicalType::Time {
                    is_adjusted_to_utc: false,
                    unit: TimeUnit::Millis,
                }),
            FieldDef::primitive("price", Repetition::Required, PhysicalType::Int64)
                .with_logical_type(LogicalType::Decimal {
                    scale: 2,
                    precision: 12,
                }),
            FieldDef::primitive("big", Repetition::Optional, PhysicalType::ByteArray)
                .with_logical_type(LogicalType::Decimal {
                    scale: 4,
                    precision: 30,
                }),
            FieldDef::primitive("raw", Repetition::Required, PhysicalType::ByteArray),
        ],
    )
    .unwrap();

    let records: Vec<_> = (0..50_i64)
        .map(|i| {
            Value::new_struct([
                ("day", Value::Date(19_000 + i as i32)),
                (
                    "at",
                    if i % 7 == 0 {
                        Value::Null
                    } else {
                        Value::Timestamp(1_700_000_000_000_000 + i * 1_000, TimeUnit::Micros)
                    },
                ),
                ("time", Value::Time(i * 60_000, TimeUnit::Millis)),
                (
                    "price",
                    Value::Decimal {
                        value: (i as i128 - 25) * 199,
                        precision: 12,
                        scale: 2,
                    },
                ),
                (
                    "big",
                    Value::Decimal {
                        value: -(i as i128) * 10_000_000_000_000_000,
                        precision: 30,
                        scale: 4,
                    },
                ),
                ("raw", Value::Binary(vec![i as u8, 0, 255])),
            ])
        })
        .collect();

    let (path, _) = common::write_file(
        dir.path(),
        "logical.parquet",
        schema,
        WriterOptions::default(),
        &records,
    )
    .unwrap();
    assert_eq!(records, common::read_all(&path).unwrap());
}

#[test]
fn timestamp_unit_conversion_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(
        "schema",
        vec![FieldDef::primitive("at", Repetition::Required, PhysicalType::Int64).with_logical_type(
            LogicalType::Timestamp {
                is_adjusted_to_utc: true,
                unit: TimeUnit::Millis,
            },
        )],
    )
    .unwrap();

    let records = vec![Value::new_struct([(
        "at",
        Value::Timestamp(1_500_000_000, TimeUnit::Micros),
    )])];
    let (path, _) = common::write_file(
        dir.path(),
        "ts.parquet",
        schema,
        WriterOptions::default(),
        &records,
    )
    .unwrap();

    let got = common::read_all(&path).unwrap();
    assert_eq!(
        vec![Value::new_struct([(
            "at",
            Value::Timestamp(1_500_000, TimeUnit::Millis)
        )])],
        got
    );
}
