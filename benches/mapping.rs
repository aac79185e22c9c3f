use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hex_literal::hex;
use protobuf_object_mapper::{
    FieldDescriptor, FieldKind, MessageSchema, ProtoMessage, ProtobufObjectMapper,
};
use protofish::{context::MessageInfo, prelude::Context};

const PROTO: &str = r#"
    syntax = "proto3";
    message Greeting {
        string greeting = 1;
        repeated string test = 2;
    }
"#;

// greeting = "hello", test = ["world", "ascon-full", "docs.rs", "crates.io"]
const DATA: [u8; 46] = hex!(
    "0a0568656c6c6f"
    "1205776f726c64"
    "120a6173636f6e2d66756c6c"
    "1207646f63732e7273"
    "12096372617465732e696f"
);

#[derive(Clone, PartialEq, prost::Message)]
struct Greeting {
    #[prost(string, tag = "1")]
    greeting: String,
    #[prost(string, repeated, tag = "2")]
    test: Vec<String>,
}

static GREETING: MessageSchema = MessageSchema::new(
    "Greeting",
    &[
        FieldDescriptor::singular("greeting", 1, FieldKind::String),
        FieldDescriptor::repeated("test", 2, FieldKind::String),
    ],
);

impl ProtoMessage for Greeting {
    fn schema() -> &'static MessageSchema {
        &GREETING
    }
}

fn protofish_decode(data: &[u8], context: &Context, msg: &MessageInfo) {
    let value = msg.decode(data, context);
    assert_eq!(value.fields.len(), 5);
}

fn mapper_wire_to_json(mapper: &ProtobufObjectMapper, data: &[u8]) {
    let json = mapper.wire_to_json(data, &GREETING).unwrap();
    assert!(json.starts_with("{\"greeting\""));
}

fn mapper_json_round_trip(mapper: &ProtobufObjectMapper, json: &str) {
    let proto: Greeting = mapper.json_to_proto(json, Greeting::default).unwrap();
    let out = mapper.proto_to_json(&proto).unwrap();
    assert_eq!(out.len(), json.len());
}

fn benchmark_decode(c: &mut Criterion) {
    let context = Context::parse(&[PROTO]).unwrap();
    let msg = context.get_message("Greeting").unwrap();
    let mapper = ProtobufObjectMapper::new();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(DATA.len() as u64));
    group.bench_with_input(
        BenchmarkId::new("protofish", 1),
        &(&DATA.as_slice(), &context, &msg),
        |b, &(s, c, m)| b.iter(|| protofish_decode(s, c, m)),
    );
    group.bench_with_input(
        BenchmarkId::new("wire-to-json", 2),
        &DATA.as_slice(),
        |b, &s| b.iter(|| mapper_wire_to_json(&mapper, s)),
    );
    group.finish();
}

fn benchmark_round_trip(c: &mut Criterion) {
    let mapper = ProtobufObjectMapper::new();
    let json = mapper.wire_to_json(&DATA, &GREETING).unwrap();

    let mut group = c.benchmark_group("round_trip");
    group.throughput(Throughput::Bytes(json.len() as u64));
    group.bench_with_input(BenchmarkId::new("json-proto-json", 1), &json, |b, s| {
        b.iter(|| mapper_json_round_trip(&mapper, s))
    });
    group.finish();
}

criterion_group!(benches, benchmark_decode, benchmark_round_trip);
criterion_main!(benches);
