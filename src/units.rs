use core::fmt;

/// A temperature in hundredths of a degree Celsius, formatted as degrees.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct CentiCelsius(pub i32);

impl fmt::Display for CentiCelsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the extremes are parked at the ends of the range until the first
        // reading comes in.
        if self.0 == i32::MAX || self.0 == i32::MIN {
            return f.write_str("--");
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}\u{00B0}C", abs / 100, abs % 100)
    }
}
