//! Expansion port identifiers and port bitmasks.
use serde::Serialize;
use std::{fmt, ops};

/// The number of mikroBUS expansion ports on the board.
pub const NUM_PORTS: u8 = 2;

/// A validated expansion port number, in `1..=NUM_PORTS`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Port(u8);

/// A set of ports, encoded as a bitmask where port `n` is bit `n - 1`.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ports(u8);

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("port {0} is out of range (expected 1..={max})", max = NUM_PORTS)]
pub struct InvalidPort(pub u8);

// === impl Port ===

impl Port {
    pub const ONE: Self = Self(1);
    pub const TWO: Self = Self(2);

    #[must_use]
    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number <= NUM_PORTS {
            Some(Self(number))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn mask(self) -> Ports {
        Ports(1 << (self.0 - 1))
    }

    /// Returns every port, in ascending order.
    pub fn all() -> impl Iterator<Item = Port> {
        (1..=NUM_PORTS).map(Port)
    }
}

impl TryFrom<u8> for Port {
    type Error = InvalidPort;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number).ok_or(InvalidPort(number))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// === impl Ports ===

impl Ports {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self((1 << NUM_PORTS) - 1);

    /// Returns the set of ports in `bits`, ignoring bits for ports that do not
    /// exist.
    #[must_use]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, port: Port) -> bool {
        self.0 & port.mask().0 != 0
    }

    #[must_use]
    pub const fn intersects(self, other: Ports) -> bool {
        self.0 & other.0 != 0
    }

    /// If exactly one port is in this set, returns it.
    #[must_use]
    pub fn single(self) -> Option<Port> {
        let mut ports = self.iter();
        match (ports.next(), ports.next()) {
            (Some(port), None) => Some(port),
            _ => None,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Port> {
        Port::all().filter(move |&port| self.contains(port))
    }
}

impl From<Port> for Ports {
    fn from(port: Port) -> Self {
        port.mask()
    }
}

impl ops::BitOr for Ports {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOr<Port> for Ports {
    type Output = Self;
    fn bitor(self, rhs: Port) -> Self {
        self | rhs.mask()
    }
}

impl ops::BitOrAssign<Port> for Ports {
    fn bitor_assign(&mut self, rhs: Port) {
        *self = *self | rhs;
    }
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ports")
            .field(&format_args!("{:#04b}", self.0))
            .finish()
    }
}
