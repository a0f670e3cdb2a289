//! Typed argument conversion
//!
//! The wire only knows [`OscValue`] sequences. These traits let call sites
//! pass plain tuples when sending and receive plain tuples in callbacks:
//!
//! ```
//! use oscmux_core::{FromOscArgs, IntoOscArgs, OscValue};
//!
//! let args = (1i32, 0.5f32, "gain").into_osc_args();
//! assert_eq!(args[2], OscValue::String("gain".into()));
//!
//! let (ch, level, name) = <(i32, f32, String)>::from_osc_args(&args).unwrap();
//! assert_eq!((ch, level, name.as_str()), (1, 0.5, "gain"));
//! ```

use std::fmt;

use crate::types::{OscValue, TimeTag};
use crate::{Error, Result};

/// Convert a set of values into an argument list
pub trait IntoOscArgs {
    fn into_osc_args(self) -> Vec<OscValue>;
}

impl IntoOscArgs for () {
    fn into_osc_args(self) -> Vec<OscValue> {
        Vec::new()
    }
}

impl IntoOscArgs for Vec<OscValue> {
    fn into_osc_args(self) -> Vec<OscValue> {
        self
    }
}

impl IntoOscArgs for &[OscValue] {
    fn into_osc_args(self) -> Vec<OscValue> {
        self.to_vec()
    }
}

impl IntoOscArgs for OscValue {
    fn into_osc_args(self) -> Vec<OscValue> {
        vec![self]
    }
}

/// Extract a single typed value from an argument
pub trait FromOscValue: Sized {
    /// Tag this type expects on the wire
    const TAG: char;

    fn from_osc_value(value: &OscValue) -> Option<Self>;
}

macro_rules! from_osc_value {
    ($ty:ty, $tag:expr, $accessor:ident) => {
        impl FromOscValue for $ty {
            const TAG: char = $tag;

            fn from_osc_value(value: &OscValue) -> Option<Self> {
                value.$accessor()
            }
        }
    };
}

from_osc_value!(i32, 'i', as_int);
from_osc_value!(f32, 'f', as_float);
from_osc_value!(i64, 'h', as_long);
from_osc_value!(f64, 'd', as_double);
from_osc_value!(TimeTag, 't', as_time);
from_osc_value!(bool, 'T', as_bool);

impl FromOscValue for String {
    const TAG: char = 's';

    fn from_osc_value(value: &OscValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromOscValue for Vec<u8> {
    const TAG: char = 'b';

    fn from_osc_value(value: &OscValue) -> Option<Self> {
        value.as_blob().map(<[u8]>::to_vec)
    }
}

/// Extract a typed tuple from a full argument list
pub trait FromOscArgs: Sized {
    /// Signature the argument list must have
    fn signature() -> TypeSignature;

    fn from_osc_args(args: &[OscValue]) -> Option<Self>;
}

macro_rules! tuple_args {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Into<OscValue>),+> IntoOscArgs for ($($name,)+) {
            fn into_osc_args(self) -> Vec<OscValue> {
                vec![$(self.$idx.into()),+]
            }
        }

        impl<$($name: FromOscValue),+> FromOscArgs for ($($name,)+) {
            fn signature() -> TypeSignature {
                TypeSignature {
                    tags: vec![$($name::TAG),+],
                }
            }

            fn from_osc_args(args: &[OscValue]) -> Option<Self> {
                if args.len() != $len {
                    return None;
                }
                Some(($($name::from_osc_value(&args[$idx])?,)+))
            }
        }
    };
}

tuple_args!(1; A: 0);
tuple_args!(2; A: 0, B: 1);
tuple_args!(3; A: 0, B: 1, C: 2);
tuple_args!(4; A: 0, B: 1, C: 2, D: 3);
tuple_args!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_args!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_args!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_args!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

impl FromOscArgs for () {
    fn signature() -> TypeSignature {
        TypeSignature { tags: Vec::new() }
    }

    fn from_osc_args(args: &[OscValue]) -> Option<Self> {
        args.is_empty().then_some(())
    }
}

/// Expected argument types of a subscription
///
/// `T` and `F` both stand for "a boolean": a declared `T` accepts a
/// received `F` and the other way round.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSignature {
    tags: Vec<char>,
}

impl TypeSignature {
    /// Parse a tag string such as `"ifs"` or `",ifs"`
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.strip_prefix(',').unwrap_or(s);
        let tags: Vec<char> = body.chars().collect();
        if let Some(bad) = tags
            .iter()
            .find(|c| !matches!(c, 'i' | 'f' | 's' | 'b' | 'h' | 'd' | 't' | 'T' | 'F' | 'N'))
        {
            return Err(Error::InvalidSignature(format!(
                "unsupported tag {:?} in {:?}",
                bad, s
            )));
        }
        Ok(Self { tags })
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Check an argument list against this signature
    pub fn matches(&self, args: &[OscValue]) -> bool {
        self.tags.len() == args.len()
            && self
                .tags
                .iter()
                .zip(args)
                .all(|(&expected, arg)| tag_accepts(expected, arg.type_tag()))
    }
}

#[inline]
fn tag_accepts(expected: char, actual: char) -> bool {
    expected == actual || (matches!(expected, 'T' | 'F') && matches!(actual, 'T' | 'F'))
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(",")?;
        for tag in &self.tags {
            write!(f, "{}", tag)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for TypeSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeSignature::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_into_args() {
        let args = (7i32, 2.5f64, true, ()).into_osc_args();
        assert_eq!(
            args,
            vec![
                OscValue::Int(7),
                OscValue::Double(2.5),
                OscValue::Bool(true),
                OscValue::Nil
            ]
        );
        assert!(().into_osc_args().is_empty());
    }

    #[test]
    fn test_tuple_from_args() {
        let args = vec![OscValue::Int(3), OscValue::String("x".into())];
        let parsed = <(i32, String)>::from_osc_args(&args);
        assert_eq!(parsed, Some((3, "x".to_string())));

        // wrong arity or type
        assert!(<(i32,)>::from_osc_args(&args).is_none());
        assert!(<(f32, String)>::from_osc_args(&args).is_none());
    }

    #[test]
    fn test_signature_from_tuple() {
        assert_eq!(<(i32, f32, String)>::signature().to_string(), ",ifs");
        assert_eq!(<()>::signature().to_string(), ",");
    }

    #[test]
    fn test_signature_matches() {
        let sig = TypeSignature::parse(",if").unwrap();
        assert!(sig.matches(&[OscValue::Int(1), OscValue::Float(1.0)]));
        assert!(!sig.matches(&[OscValue::Float(1.0), OscValue::Int(1)]));
        assert!(!sig.matches(&[OscValue::Int(1)]));
    }

    #[test]
    fn test_signature_bool_accepts_either() {
        let sig = TypeSignature::parse("T").unwrap();
        assert!(sig.matches(&[OscValue::Bool(true)]));
        assert!(sig.matches(&[OscValue::Bool(false)]));
        assert!(!sig.matches(&[OscValue::Nil]));
    }

    #[test]
    fn test_signature_rejects_unknown_tag() {
        assert!(TypeSignature::parse("ixq").is_err());
    }
}
