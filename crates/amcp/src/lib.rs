//! AMCP: the line-oriented control protocol spoken by CasparCG servers.
//!
//! A client sends one command per line and receives one response frame per
//! command. The first line of a frame carries a numeric return code; the code
//! decides how many payload lines follow:
//!
//! - `200` - any number of lines, terminated by an empty line
//! - `201` and `400` - exactly one line
//! - everything else - no payload
//!
//! [`AmcpCodec`] implements [`tokio_util::codec::Decoder`] and
//! [`tokio_util::codec::Encoder`] so it can be used with
//! [`tokio_util::codec::Framed`] over a TCP stream.

pub mod codec;
pub mod error;
pub mod response;

pub use crate::{
    codec::AmcpCodec,
    error::{AmcpError, Result},
    response::{AmcpResponse, PayloadKind},
};
