//! OSC value and packet types

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::address::validate_address;
use crate::Result;

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// 64-bit NTP-style timestamp: whole seconds plus a 2^-32 fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeTag {
    pub seconds: u32,
    pub fraction: u32,
}

impl TimeTag {
    /// The special "deliver now" value (raw value 1)
    pub const IMMEDIATE: TimeTag = TimeTag {
        seconds: 0,
        fraction: 1,
    };

    pub const fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    pub fn is_immediate(&self) -> bool {
        *self == Self::IMMEDIATE
    }

    /// Current wall-clock time as a time tag
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    pub fn as_u64(&self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}

impl From<u64> for TimeTag {
    fn from(raw: u64) -> Self {
        Self {
            seconds: (raw >> 32) as u32,
            fraction: raw as u32,
        }
    }
}

impl From<TimeTag> for u64 {
    fn from(tag: TimeTag) -> Self {
        tag.as_u64()
    }
}

impl From<SystemTime> for TimeTag {
    fn from(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let seconds = since_unix.as_secs() + NTP_UNIX_OFFSET;
        let fraction = ((since_unix.subsec_nanos() as u64) << 32) / 1_000_000_000;
        Self {
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }
}

impl From<TimeTag> for SystemTime {
    fn from(tag: TimeTag) -> Self {
        let secs = (tag.seconds as u64).saturating_sub(NTP_UNIX_OFFSET);
        let nanos = ((tag.fraction as u64) * 1_000_000_000) >> 32;
        UNIX_EPOCH + Duration::new(secs, nanos as u32)
    }
}

/// A single OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscValue {
    Int(i32),
    Float(f32),
    String(String),
    Blob(Vec<u8>),
    Long(i64),
    Double(f64),
    Time(TimeTag),
    Bool(bool),
    Nil,
}

impl OscValue {
    /// Wire type tag character
    pub fn type_tag(&self) -> char {
        match self {
            OscValue::Int(_) => 'i',
            OscValue::Float(_) => 'f',
            OscValue::String(_) => 's',
            OscValue::Blob(_) => 'b',
            OscValue::Long(_) => 'h',
            OscValue::Double(_) => 'd',
            OscValue::Time(_) => 't',
            OscValue::Bool(true) => 'T',
            OscValue::Bool(false) => 'F',
            OscValue::Nil => 'N',
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            OscValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            OscValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            OscValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            OscValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            OscValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<TimeTag> {
        match self {
            OscValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OscValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, OscValue::Nil)
    }
}

impl fmt::Display for OscValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscValue::Int(i) => write!(f, "{}", i),
            OscValue::Float(v) => write!(f, "{}", v),
            OscValue::String(s) => write!(f, "{:?}", s),
            OscValue::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
            OscValue::Long(l) => write!(f, "{}", l),
            OscValue::Double(d) => write!(f, "{}", d),
            OscValue::Time(t) => write!(f, "{}.{:08x}", t.seconds, t.fraction),
            OscValue::Bool(b) => write!(f, "{}", b),
            OscValue::Nil => write!(f, "nil"),
        }
    }
}

impl From<i32> for OscValue {
    fn from(v: i32) -> Self {
        OscValue::Int(v)
    }
}

impl From<f32> for OscValue {
    fn from(v: f32) -> Self {
        OscValue::Float(v)
    }
}

impl From<&str> for OscValue {
    fn from(v: &str) -> Self {
        OscValue::String(v.to_string())
    }
}

impl From<String> for OscValue {
    fn from(v: String) -> Self {
        OscValue::String(v)
    }
}

impl From<Vec<u8>> for OscValue {
    fn from(v: Vec<u8>) -> Self {
        OscValue::Blob(v)
    }
}

impl From<&[u8]> for OscValue {
    fn from(v: &[u8]) -> Self {
        OscValue::Blob(v.to_vec())
    }
}

impl From<i64> for OscValue {
    fn from(v: i64) -> Self {
        OscValue::Long(v)
    }
}

impl From<f64> for OscValue {
    fn from(v: f64) -> Self {
        OscValue::Double(v)
    }
}

impl From<TimeTag> for OscValue {
    fn from(v: TimeTag) -> Self {
        OscValue::Time(v)
    }
}

impl From<bool> for OscValue {
    fn from(v: bool) -> Self {
        OscValue::Bool(v)
    }
}

impl From<()> for OscValue {
    fn from(_: ()) -> Self {
        OscValue::Nil
    }
}

/// An OSC message: a concrete address plus ordered arguments
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscValue>,
}

impl OscMessage {
    /// Create a message with no arguments
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Create a message with the given arguments
    pub fn with_args(address: impl Into<String>, args: Vec<OscValue>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Append an argument (builder style)
    pub fn arg(mut self, value: impl Into<OscValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// The `,`-prefixed type tag string
    pub fn type_tags(&self) -> String {
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(OscValue::type_tag));
        tags
    }

    /// Check that the address is a well-formed concrete address
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.address)
    }
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.type_tags())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// An OSC bundle: a time tag and nested elements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OscBundle {
    pub timetag: TimeTag,
    pub content: Vec<OscPacket>,
}

impl OscBundle {
    pub fn new(timetag: TimeTag) -> Self {
        Self {
            timetag,
            content: Vec::new(),
        }
    }

    /// Bundle tagged for immediate delivery
    pub fn immediate() -> Self {
        Self::new(TimeTag::IMMEDIATE)
    }

    /// Append an element (builder style)
    pub fn push(mut self, packet: impl Into<OscPacket>) -> Self {
        self.content.push(packet.into());
        self
    }

    /// All messages in the bundle, depth-first in element order
    pub fn messages(&self) -> Messages<'_> {
        Messages {
            stack: vec![self.content.iter()],
        }
    }
}

/// Depth-first iterator over the messages of a bundle tree
pub struct Messages<'a> {
    stack: Vec<std::slice::Iter<'a, OscPacket>>,
}

impl<'a> Iterator for Messages<'a> {
    type Item = &'a OscMessage;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(OscPacket::Message(msg)) => return Some(msg),
                Some(OscPacket::Bundle(bundle)) => self.stack.push(bundle.content.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Top-level wire unit
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    pub fn is_bundle(&self) -> bool {
        matches!(self, OscPacket::Bundle(_))
    }
}

impl From<OscMessage> for OscPacket {
    fn from(msg: OscMessage) -> Self {
        OscPacket::Message(msg)
    }
}

impl From<OscBundle> for OscPacket {
    fn from(bundle: OscBundle) -> Self {
        OscPacket::Bundle(bundle)
    }
}
