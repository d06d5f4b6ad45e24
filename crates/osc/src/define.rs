/// OSC type tags.
/// Defined in the OSC 1.0 specification, "OSC Type Tag String" and the
/// non-standard tags listed alongside it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OscTag {
    /// `i` - 32-bit big-endian two's complement integer
    Int,
    /// `f` - 32-bit big-endian IEEE 754 float
    Float,
    /// `s` - OSC-string
    String,
    /// `S` - alternate string type ("symbol")
    Symbol,
    /// `b` - OSC-blob
    Blob,
    /// `h` - 64-bit big-endian two's complement integer
    Long,
    /// `d` - 64-bit big-endian IEEE 754 double
    Double,
    /// `t` - OSC time tag
    TimeTag,
    /// `c` - ASCII character sent as 32 bits
    Char,
    /// `r` - 32-bit RGBA color
    Color,
    /// `m` - 4 byte MIDI message
    Midi,
    /// `T` - true, no argument data
    True,
    /// `F` - false, no argument data
    False,
    /// `N` - nil, no argument data
    Nil,
    /// `I` - infinitum, no argument data
    Inf,
}

impl TryFrom<u8> for OscTag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            b'i' => Ok(Self::Int),
            b'f' => Ok(Self::Float),
            b's' => Ok(Self::String),
            b'S' => Ok(Self::Symbol),
            b'b' => Ok(Self::Blob),
            b'h' => Ok(Self::Long),
            b'd' => Ok(Self::Double),
            b't' => Ok(Self::TimeTag),
            b'c' => Ok(Self::Char),
            b'r' => Ok(Self::Color),
            b'm' => Ok(Self::Midi),
            b'T' => Ok(Self::True),
            b'F' => Ok(Self::False),
            b'N' => Ok(Self::Nil),
            b'I' => Ok(Self::Inf),
            other => Err(other),
        }
    }
}

impl OscTag {
    /// The tag character as it appears in a type tag string.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Int => b'i',
            Self::Float => b'f',
            Self::String => b's',
            Self::Symbol => b'S',
            Self::Blob => b'b',
            Self::Long => b'h',
            Self::Double => b'd',
            Self::TimeTag => b't',
            Self::Char => b'c',
            Self::Color => b'r',
            Self::Midi => b'm',
            Self::True => b'T',
            Self::False => b'F',
            Self::Nil => b'N',
            Self::Inf => b'I',
        }
    }
}

/// NTP-style time tag: seconds since 1900 and a 32-bit fraction.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct OscTimeTag {
    pub seconds: u32,
    pub fraction: u32,
}

impl OscTimeTag {
    /// The special "immediately" time tag.
    pub const IMMEDIATELY: Self = Self {
        seconds: 0,
        fraction: 1,
    };
}

/// A single OSC argument.
#[derive(Debug, PartialEq, Clone)]
pub enum OscValue {
    Int(i32),
    Float(f32),
    /// `s` and `S` both decode to a string
    String(String),
    Blob(Vec<u8>),
    Long(i64),
    Double(f64),
    TimeTag(OscTimeTag),
    Char(char),
    Color(u32),
    Midi([u8; 4]),
    Bool(bool),
    Nil,
    Inf,
}

impl OscValue {
    /// Get the tag of the value.
    #[inline]
    pub fn tag(&self) -> OscTag {
        match self {
            Self::Int(_) => OscTag::Int,
            Self::Float(_) => OscTag::Float,
            Self::String(_) => OscTag::String,
            Self::Blob(_) => OscTag::Blob,
            Self::Long(_) => OscTag::Long,
            Self::Double(_) => OscTag::Double,
            Self::TimeTag(_) => OscTag::TimeTag,
            Self::Char(_) => OscTag::Char,
            Self::Color(_) => OscTag::Color,
            Self::Midi(_) => OscTag::Midi,
            Self::Bool(true) => OscTag::True,
            Self::Bool(false) => OscTag::False,
            Self::Nil => OscTag::Nil,
            Self::Inf => OscTag::Inf,
        }
    }

    /// Numeric view of the value. Integers and floats of any width widen to
    /// `f64`; everything else is `None`.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(f64::from(*v)),
            Self::Float(v) => Some(f64::from(*v)),
            Self::Long(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the inner string slice if this is a `String`.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view of the value.
    ///
    /// Some senders encode flags as `i` 0/1 instead of `T`/`F`.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(v) => Some(*v != 0),
            Self::Long(v) => Some(*v != 0),
            _ => None,
        }
    }
}

/// An OSC message: an address pattern plus typed arguments.
#[derive(Debug, PartialEq, Clone)]
pub struct OscMessage {
    pub addr: String,
    pub args: Vec<OscValue>,
}

impl OscMessage {
    pub fn new(addr: impl Into<String>, args: Vec<OscValue>) -> Self {
        Self {
            addr: addr.into(),
            args,
        }
    }
}

/// An OSC bundle: a time tag plus nested packets.
#[derive(Debug, PartialEq, Clone)]
pub struct OscBundle {
    pub timetag: OscTimeTag,
    pub content: Vec<OscPacket>,
}

/// Anything that can be sent as one datagram.
#[derive(Debug, PartialEq, Clone)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    /// Flatten the packet into its messages, depth first, in wire order.
    pub fn into_messages(self) -> Vec<OscMessage> {
        let mut out = Vec::new();
        self.collect_messages(&mut out);
        out
    }

    fn collect_messages(self, out: &mut Vec<OscMessage>) {
        match self {
            Self::Message(message) => out.push(message),
            Self::Bundle(bundle) => {
                for packet in bundle.content {
                    packet.collect_messages(out);
                }
            }
        }
    }
}
