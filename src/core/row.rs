//! Rows of a fixed number of columns.
//!
//! A reader or writer configured for `N` columns only accepts rows that
//! implement [`FromRow<N>`] or [`ToRow<N>`]. Both traits are implemented for
//! tuples of exactly `N` elements and for `[T; N]`, so a row of the wrong
//! arity does not compile.

use super::field::{CoercionError, FromField, OverflowPolicy, ToField};

/// A field of a row that failed to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    /// Position of the field in the row (declared column order).
    pub index: usize,
    /// Name of the requested type.
    pub expected: &'static str,
    pub kind: CoercionError,
}

/// A value built from the `N` fields of one row.
pub trait FromRow<const N: usize>: Sized {
    /// `fields` are in declared column order. Out-of-range numbers are
    /// resolved per `overflow`.
    fn from_fields(fields: &[&str; N], overflow: OverflowPolicy) -> Result<Self, FieldError>;
}

/// A value written as the `N` fields of one row.
pub trait ToRow<const N: usize> {
    fn fields(&self) -> [&dyn ToField; N];
}

fn convert<T: FromField>(
    fields: &[&str],
    index: usize,
    overflow: OverflowPolicy,
) -> Result<T, FieldError> {
    T::from_field_with(fields[index], overflow).map_err(|kind| FieldError {
        index,
        expected: T::EXPECTED,
        kind,
    })
}

macro_rules! tuple_row {
    ($n:literal => $($idx:tt $t:ident),+) => {
        impl<$($t: FromField),+> FromRow<$n> for ($($t,)+) {
            fn from_fields(fields: &[&str; $n], overflow: OverflowPolicy) -> Result<Self, FieldError> {
                Ok(($(convert::<$t>(fields, $idx, overflow)?,)+))
            }
        }

        impl<$($t: ToField),+> ToRow<$n> for ($($t,)+) {
            fn fields(&self) -> [&dyn ToField; $n] {
                [$(&self.$idx as &dyn ToField),+]
            }
        }
    };
}

tuple_row!(1 => 0 A);
tuple_row!(2 => 0 A, 1 B);
tuple_row!(3 => 0 A, 1 B, 2 C);
tuple_row!(4 => 0 A, 1 B, 2 C, 3 D);
tuple_row!(5 => 0 A, 1 B, 2 C, 3 D, 4 E);
tuple_row!(6 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
tuple_row!(7 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
tuple_row!(8 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
tuple_row!(9 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I);
tuple_row!(10 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J);
tuple_row!(11 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K);
tuple_row!(12 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L);

impl<T: FromField, const N: usize> FromRow<N> for [T; N] {
    fn from_fields(fields: &[&str; N], overflow: OverflowPolicy) -> Result<Self, FieldError> {
        let values = (0..N)
            .map(|index| convert::<T>(fields, index, overflow))
            .collect::<Result<Vec<T>, _>>()?;
        // a short vector can only come from a short `fields`
        values.try_into().map_err(|values: Vec<T>| FieldError {
            index: values.len(),
            expected: T::EXPECTED,
            kind: CoercionError::InvalidFormat,
        })
    }
}

impl<T: ToField, const N: usize> ToRow<N> for [T; N] {
    fn fields(&self) -> [&dyn ToField; N] {
        std::array::from_fn(|index| &self[index] as &dyn ToField)
    }
}
