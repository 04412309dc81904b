use std::{
    fmt::Write,
    num::{IntErrorKind, ParseIntError},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Why a field's text could not be converted to the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionError {
    /// The text is not a valid value of the type (trailing garbage, no
    /// digits, more than one character for a `char`, ...).
    InvalidFormat,
    /// The text is a well formed number outside the type's range.
    Overflow,
}

/// What a reader does with a well formed number outside the range of the
/// requested type.
///
/// ```
/// use dsv_rs::core::field::{FromField, OverflowPolicy};
///
/// assert!(u8::from_field_with("300", OverflowPolicy::Error).is_err());
/// assert_eq!(u8::from_field_with("300", OverflowPolicy::Saturate), Ok(255));
/// assert_eq!(i8::from_field_with("-300", OverflowPolicy::Saturate), Ok(-128));
/// assert_eq!(u8::from_field_with("300", OverflowPolicy::Ignore), Ok(44));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail with [`CoercionError::Overflow`].
    #[default]
    Error,
    /// Clamp to the largest or smallest value of the type. A negative
    /// number read as an unsigned type becomes zero.
    Saturate,
    /// Keep the value the type's own arithmetic gives: integers wrap around
    /// modulo their width, floats become infinite.
    Ignore,
}

/// Conversion from the text of one field.
pub trait FromField: Sized {
    /// Name of the type used in error messages.
    const EXPECTED: &'static str;

    fn from_field(text: &str) -> Result<Self, CoercionError>;

    /// Value standing for the out-of-range number `text` under a lenient
    /// `policy`. Types without a range return `None`.
    fn on_overflow(text: &str, policy: OverflowPolicy) -> Option<Self> {
        let _ = (text, policy);
        None
    }

    /// Like [`FromField::from_field`], resolving overflow per `policy`.
    fn from_field_with(text: &str, policy: OverflowPolicy) -> Result<Self, CoercionError> {
        match Self::from_field(text) {
            Err(CoercionError::Overflow) if policy != OverflowPolicy::Error => {
                Self::on_overflow(text, policy).ok_or(CoercionError::Overflow)
            }
            converted => converted,
        }
    }
}

/// Conversion of a value into the text of one field.
///
/// Numbers render in a locale-independent form that parses back to the
/// same value.
pub trait ToField {
    fn render(&self, out: &mut String);

    /// Whether the value is a number, for [`QuoteStyle::NonNumeric`].
    ///
    /// [`QuoteStyle::NonNumeric`]: crate::core::quote::QuoteStyle::NonNumeric
    fn is_numeric(&self) -> bool {
        false
    }
}

fn parse_integer<T>(text: &str, signed: bool) -> Result<T, CoercionError>
where
    T: FromStr<Err = ParseIntError>,
{
    match text.parse::<T>() {
        Ok(value) => Ok(value),
        Err(error) => match error.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Err(CoercionError::Overflow),
            _ if !signed => negative_for_unsigned(text),
            _ => Err(CoercionError::InvalidFormat),
        },
    }
}

/// `-0` is zero; any other well formed negative number is out of range.
fn negative_for_unsigned<T>(text: &str) -> Result<T, CoercionError>
where
    T: FromStr<Err = ParseIntError>,
{
    let digits = match text.strip_prefix('-') {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits,
        _ => return Err(CoercionError::InvalidFormat),
    };
    if digits.bytes().all(|b| b == b'0') {
        digits.parse().map_err(|_| CoercionError::InvalidFormat)
    } else {
        Err(CoercionError::Overflow)
    }
}

fn is_negative(text: &str) -> bool {
    text.starts_with('-')
}

fn names_infinity(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

macro_rules! integer_field {
    ($signed:literal => $($t:ty),+) => {
        $(
            impl FromField for $t {
                const EXPECTED: &'static str = stringify!($t);

                fn from_field(text: &str) -> Result<Self, CoercionError> {
                    parse_integer(text, $signed)
                }

                fn on_overflow(text: &str, policy: OverflowPolicy) -> Option<Self> {
                    match policy {
                        OverflowPolicy::Error => None,
                        OverflowPolicy::Saturate if is_negative(text) => Some(<$t>::MIN),
                        OverflowPolicy::Saturate => Some(<$t>::MAX),
                        OverflowPolicy::Ignore => {
                            // only called for well formed numbers
                            let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
                            let value = digits.bytes().fold(0 as $t, |value, digit| {
                                value.wrapping_mul(10).wrapping_add((digit - b'0') as $t)
                            });
                            Some(if is_negative(text) { value.wrapping_neg() } else { value })
                        }
                    }
                }
            }

            impl ToField for $t {
                fn render(&self, out: &mut String) {
                    let _ = write!(out, "{self}");
                }

                fn is_numeric(&self) -> bool {
                    true
                }
            }
        )+
    };
}

integer_field!(true => i8, i16, i32, i64, i128, isize);
integer_field!(false => u8, u16, u32, u64, u128, usize);

macro_rules! float_field {
    ($($t:ty),+) => {
        $(
            impl FromField for $t {
                const EXPECTED: &'static str = stringify!($t);

                fn from_field(text: &str) -> Result<Self, CoercionError> {
                    match text.parse::<$t>() {
                        Ok(value) if value.is_infinite() && !names_infinity(text) => {
                            Err(CoercionError::Overflow)
                        }
                        Ok(value) => Ok(value),
                        Err(_) => Err(CoercionError::InvalidFormat),
                    }
                }

                fn on_overflow(text: &str, policy: OverflowPolicy) -> Option<Self> {
                    let negative = is_negative(text);
                    match policy {
                        OverflowPolicy::Error => None,
                        OverflowPolicy::Saturate if negative => Some(<$t>::MIN),
                        OverflowPolicy::Saturate => Some(<$t>::MAX),
                        OverflowPolicy::Ignore if negative => Some(<$t>::NEG_INFINITY),
                        OverflowPolicy::Ignore => Some(<$t>::INFINITY),
                    }
                }
            }

            impl ToField for $t {
                fn render(&self, out: &mut String) {
                    // `Display` for floats is the shortest text that parses
                    // back to the same value, with '.' as decimal point.
                    let _ = write!(out, "{self}");
                }

                fn is_numeric(&self) -> bool {
                    true
                }
            }
        )+
    };
}

float_field!(f32, f64);

impl FromField for String {
    const EXPECTED: &'static str = "string";

    fn from_field(text: &str) -> Result<Self, CoercionError> {
        Ok(text.to_string())
    }
}

impl ToField for String {
    fn render(&self, out: &mut String) {
        out.push_str(self);
    }
}

impl ToField for str {
    fn render(&self, out: &mut String) {
        out.push_str(self);
    }
}

impl FromField for char {
    const EXPECTED: &'static str = "single character";

    fn from_field(text: &str) -> Result<Self, CoercionError> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(CoercionError::InvalidFormat),
        }
    }
}

impl ToField for char {
    fn render(&self, out: &mut String) {
        out.push(*self);
    }
}

impl FromField for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_field(text: &str) -> Result<Self, CoercionError> {
        match text {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(CoercionError::InvalidFormat),
        }
    }
}

impl ToField for bool {
    fn render(&self, out: &mut String) {
        out.push_str(if *self { "true" } else { "false" });
    }
}

/// An empty field is `None`.
impl<T: FromField> FromField for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_field(text: &str) -> Result<Self, CoercionError> {
        if text.is_empty() {
            Ok(None)
        } else {
            T::from_field(text).map(Some)
        }
    }

    fn on_overflow(text: &str, policy: OverflowPolicy) -> Option<Self> {
        T::on_overflow(text, policy).map(Some)
    }
}

impl<T: ToField> ToField for Option<T> {
    fn render(&self, out: &mut String) {
        if let Some(value) = self {
            value.render(out);
        }
    }

    fn is_numeric(&self) -> bool {
        self.as_ref().is_some_and(ToField::is_numeric)
    }
}

impl<T: ToField + ?Sized> ToField for &T {
    fn render(&self, out: &mut String) {
        (**self).render(out);
    }

    fn is_numeric(&self) -> bool {
        (**self).is_numeric()
    }
}
