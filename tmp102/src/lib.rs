// register layout and conversion from the TI datasheet:
// https://www.ti.com/lit/ds/symlink/tmp102.pdf
use core::fmt;
use embedded_hal::blocking::i2c;

/// The TMP102's address with the ADD0 pin tied to ground, which is how the
/// Thermo 3 click wires it.
pub const DEFAULT_ADDRESS: u8 = 0x48;

/// Pointer register value selecting the (read-only) temperature register.
const TEMPERATURE_REGISTER: u8 = 0x00;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Tmp102 {
    address: u8,
}

/// A raw temperature register value, as the sign-extended 12-bit count of
/// 0.0625 °C steps.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Raw(pub i16);

#[derive(Debug)]
pub enum Error<E> {
    I2c(E),
}

impl Tmp102 {
    #[must_use]
    pub const fn new(address: u8) -> Self {
        Self { address }
    }

    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Reads the temperature register.
    ///
    /// This is exactly one bus transaction: the pointer register is written
    /// and the two temperature bytes are read back with a repeated start. The
    /// bus is borrowed rather than owned, so callers sharing it between
    /// several devices decide how long they hold it.
    pub fn read_raw<I, E>(&self, i2c: &mut I) -> Result<Raw, Error<E>>
    where
        I: i2c::WriteRead<Error = E>,
    {
        let mut buf = [0u8; 2];
        i2c.write_read(self.address, &[TEMPERATURE_REGISTER], &mut buf)
            .map_err(Error::I2c)?;
        Ok(Raw::from_bytes(buf))
    }

    /// Reads the temperature in hundredths of a degree Celsius.
    pub fn read_centi_celsius<I, E>(&self, i2c: &mut I) -> Result<i32, Error<E>>
    where
        I: i2c::WriteRead<Error = E>,
    {
        self.read_raw(i2c).map(Raw::centi_celsius)
    }
}

impl Default for Tmp102 {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

// === impl Raw ===

impl Raw {
    /// The highest count the 12-bit register can hold, 127.9375 °C.
    pub const MAX: Self = Self(0x7FF);
    /// The lowest count the 12-bit register can hold, -128 °C.
    pub const MIN: Self = Self(-0x800);

    /// Decodes the two bytes of the temperature register.
    ///
    /// In normal (12-bit) mode the reading is left-justified, so the low
    /// nibble of the second byte is always zero. Shifting the big-endian
    /// value as an `i16` sign-extends negative temperatures.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(i16::from_be_bytes(bytes) >> 4)
    }

    /// Encodes this reading the way the sensor would put it on the wire.
    /// Counts outside the 12-bit range saturate.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        (Self::saturating(self.0 as i64).0 << 4).to_be_bytes()
    }

    /// Returns the closest raw count to a temperature in hundredths of a
    /// degree, truncating toward zero. Temperatures beyond what the sensor
    /// can report saturate at [`Raw::MIN`] and [`Raw::MAX`].
    #[must_use]
    pub const fn from_centi_celsius(centi: i32) -> Self {
        // widened, since `centi * 100` overflows an i32
        Self::saturating(centi as i64 * 100 / 625)
    }

    const fn saturating(counts: i64) -> Self {
        if counts > Self::MAX.0 as i64 {
            Self::MAX
        } else if counts < Self::MIN.0 as i64 {
            Self::MIN
        } else {
            Self(counts as i16)
        }
    }

    /// Converts to hundredths of a degree Celsius. Each count is 0.0625 °C,
    /// i.e. 6.25 hundredths, so this stays in integer math.
    #[must_use]
    pub const fn centi_celsius(self) -> i32 {
        self.0 as i32 * 625 / 100
    }
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let centi = self.centi_celsius();
        let sign = if centi < 0 { "-" } else { "" };
        let centi = centi.unsigned_abs();
        write!(f, "{sign}{}.{:02} \u{00B0}C", centi / 100, centi % 100)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2c(error) => write!(f, "I2C error: {error:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBus {
        reply: Result<[u8; 2], ()>,
        writes: Vec<(u8, Vec<u8>)>,
    }

    impl i2c::WriteRead for FakeBus {
        type Error = ();

        fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), ()> {
            self.writes.push((address, bytes.to_vec()));
            let reply = self.reply?;
            buffer.copy_from_slice(&reply);
            Ok(())
        }
    }

    // examples from table 8-1 of the datasheet
    #[test]
    fn datasheet_conversions() {
        assert_eq!(Raw::from_bytes([0x7F, 0xF0]), Raw(0x7FF));
        assert_eq!(Raw::from_bytes([0x7F, 0xF0]).centi_celsius(), 12793);
        assert_eq!(Raw::from_bytes([0x19, 0x00]).centi_celsius(), 2500);
        assert_eq!(Raw::from_bytes([0x00, 0x40]).centi_celsius(), 25);
        assert_eq!(Raw::from_bytes([0x00, 0x00]).centi_celsius(), 0);
        assert_eq!(Raw::from_bytes([0xFF, 0xC0]).centi_celsius(), -25);
        assert_eq!(Raw::from_bytes([0xE7, 0x00]).centi_celsius(), -2500);
        assert_eq!(Raw::from_bytes([0xC9, 0x00]).centi_celsius(), -5500);
    }

    #[test]
    fn negative_readings_are_sign_extended() {
        let raw = Raw::from_bytes([0xFF, 0xF0]);
        assert_eq!(raw, Raw(-1));
        assert_eq!(raw.centi_celsius(), -6);
    }

    #[test]
    fn out_of_range_temperatures_saturate() {
        assert_eq!(Raw::from_centi_celsius(12794), Raw::MAX);
        assert_eq!(Raw::from_centi_celsius(20_000), Raw::MAX);
        assert_eq!(Raw::from_centi_celsius(i32::MAX), Raw::MAX);
        assert_eq!(Raw::from_centi_celsius(-12800), Raw::MIN);
        assert_eq!(Raw::from_centi_celsius(i32::MIN), Raw::MIN);

        assert_eq!(Raw::MAX.to_bytes(), [0x7F, 0xF0]);
        assert_eq!(Raw::MIN.to_bytes(), [0x80, 0x00]);
        assert_eq!(Raw(4000).to_bytes(), [0x7F, 0xF0]);
        assert_eq!(Raw(-5000).to_bytes(), [0x80, 0x00]);
    }

    #[test]
    fn display() {
        assert_eq!(Raw(400).to_string(), "25.00 \u{00B0}C");
        assert_eq!(Raw(-4).to_string(), "-0.25 \u{00B0}C");
    }

    #[test]
    fn read_is_one_pointer_write_then_read() {
        let mut bus = FakeBus {
            reply: Ok([0x19, 0x00]),
            writes: Vec::new(),
        };
        let sensor = Tmp102::default();
        assert_eq!(sensor.read_centi_celsius(&mut bus).unwrap(), 2500);
        assert_eq!(bus.writes, vec![(DEFAULT_ADDRESS, vec![TEMPERATURE_REGISTER])]);
    }

    #[test]
    fn bus_errors_are_propagated() {
        let mut bus = FakeBus {
            reply: Err(()),
            writes: Vec::new(),
        };
        let err = Tmp102::new(0x49).read_raw(&mut bus).unwrap_err();
        assert!(matches!(err, Error::I2c(())));
        assert_eq!(bus.writes[0].0, 0x49);
    }
}
