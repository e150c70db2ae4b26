/// The [`Numeric`] trait is a minimal trait describing a native numeric type whose values
/// can be profiled (min/max, fractional part) regardless of their storage width.
pub trait Numeric: sealed::Sealed + Copy + PartialEq + PartialOrd {
  /// Lossy widening used for profiling only. Integers above 2^53 lose precision.
  fn to_f64(self) -> f64;

  /// Whether the value is an integer type. Float columns holding only whole numbers
  /// are candidates for narrowing, integer columns always are.
  fn is_integral() -> bool;
}

macro_rules! impl_numeric {
  ($integral:expr => $($t:ty),*) => {
    $(
      impl Numeric for $t {
        fn to_f64(self) -> f64 {
          self as f64
        }

        fn is_integral() -> bool {
          $integral
        }
      }

      impl sealed::Sealed for $t {}
    )*
  };
}

impl_numeric!(true => i8, i16, i32, i64, u8, u16, u32, u64);
impl_numeric!(false => f32, f64);

mod sealed {
  pub trait Sealed {}
}
