use bytes::{BufMut, Bytes, BytesMut};

use crate::define::{OscBundle, OscMessage, OscPacket, OscValue};

fn put_padding(buf: &mut BytesMut, written: usize) {
    let padding = (4 - written % 4) % 4;
    buf.put_bytes(0, padding);
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
    put_padding(buf, s.len() + 1);
}

fn put_value(buf: &mut BytesMut, value: &OscValue) {
    match value {
        OscValue::Int(v) => buf.put_i32(*v),
        OscValue::Float(v) => buf.put_f32(*v),
        OscValue::String(s) => put_string(buf, s),
        OscValue::Blob(bytes) => {
            buf.put_i32(bytes.len() as i32);
            buf.put_slice(bytes);
            put_padding(buf, bytes.len());
        }
        OscValue::Long(v) => buf.put_i64(*v),
        OscValue::Double(v) => buf.put_f64(*v),
        OscValue::TimeTag(t) => {
            buf.put_u32(t.seconds);
            buf.put_u32(t.fraction);
        }
        OscValue::Char(c) => buf.put_u32(*c as u32),
        OscValue::Color(v) => buf.put_u32(*v),
        OscValue::Midi(bytes) => buf.put_slice(bytes),
        OscValue::Bool(_) | OscValue::Nil | OscValue::Inf => {}
    }
}

fn put_message(buf: &mut BytesMut, message: &OscMessage) {
    put_string(buf, &message.addr);

    let mut tags = String::with_capacity(message.args.len() + 1);
    tags.push(',');
    for arg in &message.args {
        tags.push(arg.tag().as_byte() as char);
    }
    put_string(buf, &tags);

    for arg in &message.args {
        put_value(buf, arg);
    }
}

fn put_bundle(buf: &mut BytesMut, bundle: &OscBundle) {
    put_string(buf, "#bundle");
    buf.put_u32(bundle.timetag.seconds);
    buf.put_u32(bundle.timetag.fraction);
    for packet in &bundle.content {
        let element = encode_packet(packet);
        buf.put_i32(element.len() as i32);
        buf.put_slice(&element);
    }
}

/// Encode a packet into a single datagram.
pub fn encode_packet(packet: &OscPacket) -> Bytes {
    let mut buf = BytesMut::new();
    match packet {
        OscPacket::Message(message) => put_message(&mut buf, message),
        OscPacket::Bundle(bundle) => put_bundle(&mut buf, bundle),
    }
    buf.freeze()
}
