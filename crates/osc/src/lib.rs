//! Open Sound Control 1.0 packets.
//!
//! Only what a UDP receiver needs: decoding datagrams into messages and
//! bundles, plus an encoder for producing test traffic and simple senders.
//! Address pattern matching is left to the caller.

mod decode;
mod define;
mod encode;
mod error;

pub use crate::{
    decode::{MAX_BUNDLE_DEPTH, OscDecoder, decode_packet},
    define::{OscBundle, OscMessage, OscPacket, OscTag, OscTimeTag, OscValue},
    encode::encode_packet,
    error::OscReadError,
};
