//! Wire compatibility with the rosc OSC implementation
//!
//! Packets encoded here must be byte-identical to what rosc produces, and
//! both sides must decode each other's output.

use oscmux_core::{codec, OscBundle, OscMessage, OscPacket, OscValue, TimeTag};
use rosc::{decoder, encoder, OscTime, OscType};

fn to_rosc_value(value: &OscValue) -> OscType {
    match value {
        OscValue::Int(i) => OscType::Int(*i),
        OscValue::Float(f) => OscType::Float(*f),
        OscValue::String(s) => OscType::String(s.clone()),
        OscValue::Blob(b) => OscType::Blob(b.clone()),
        OscValue::Long(l) => OscType::Long(*l),
        OscValue::Double(d) => OscType::Double(*d),
        OscValue::Time(t) => OscType::Time(OscTime {
            seconds: t.seconds,
            fractional: t.fraction,
        }),
        OscValue::Bool(b) => OscType::Bool(*b),
        OscValue::Nil => OscType::Nil,
    }
}

fn to_rosc(packet: &OscPacket) -> rosc::OscPacket {
    match packet {
        OscPacket::Message(m) => rosc::OscPacket::Message(rosc::OscMessage {
            addr: m.address.clone(),
            args: m.args.iter().map(to_rosc_value).collect(),
        }),
        OscPacket::Bundle(b) => rosc::OscPacket::Bundle(rosc::OscBundle {
            timetag: OscTime {
                seconds: b.timetag.seconds,
                fractional: b.timetag.fraction,
            },
            content: b.content.iter().map(to_rosc).collect(),
        }),
    }
}

fn sample_message() -> OscMessage {
    OscMessage::new("/interop/check")
        .arg(42i32)
        .arg(0.75f32)
        .arg("text")
        .arg(vec![9u8, 8, 7])
        .arg(-5i64)
        .arg(6.5f64)
        .arg(TimeTag::new(1, 2))
        .arg(true)
        .arg(false)
        .arg(())
}

#[test]
fn test_message_bytes_identical() {
    let packet: OscPacket = sample_message().into();
    let ours = codec::encode(&packet).expect("encode failed");
    let theirs = encoder::encode(&to_rosc(&packet)).expect("rosc encode failed");
    assert_eq!(ours.as_ref(), theirs.as_slice());
}

#[test]
fn test_bundle_bytes_identical() {
    let packet: OscPacket = OscBundle::new(TimeTag::new(7, 8))
        .push(sample_message())
        .push(OscBundle::immediate().push(OscMessage::new("/nested").arg("x")))
        .into();
    let ours = codec::encode(&packet).unwrap();
    let theirs = encoder::encode(&to_rosc(&packet)).unwrap();
    assert_eq!(ours.as_ref(), theirs.as_slice());
}

#[test]
fn test_rosc_decodes_ours() {
    let packet: OscPacket = sample_message().into();
    let ours = codec::encode(&packet).unwrap();
    let (rest, decoded) = decoder::decode_udp(&ours).expect("rosc decode failed");
    assert!(rest.is_empty());
    assert_eq!(decoded, to_rosc(&packet));
}

#[test]
fn test_we_decode_rosc() {
    let theirs = encoder::encode(&rosc::OscPacket::Message(rosc::OscMessage {
        addr: "/from/rosc".to_string(),
        args: vec![OscType::Int(1), OscType::String("two".to_string())],
    }))
    .unwrap();

    let decoded = codec::decode(&theirs).unwrap();
    assert_eq!(
        decoded,
        OscPacket::Message(OscMessage::new("/from/rosc").arg(1i32).arg("two"))
    );
}
