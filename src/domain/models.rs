use crate::domain::endpoint::{RemoteInitiator, RemoteTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// Controller-wide mode. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerState {
    Idle,
    Discovering,
    Connected,
}

/// A single RF protocol the controller can poll for or emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfProtocol {
    // Initiator side: the local controller polls for these tag types / peers
    T1t,
    T2t,
    T3t,
    IsoDep,
    NfcDep,
    T5t,

    // Target side: the local controller is discovered by a remote initiator
    TargetIsoDep,
    TargetNfcDep,
}

impl RfProtocol {
    pub const ALL: [RfProtocol; 8] = [
        Self::T1t,
        Self::T2t,
        Self::T3t,
        Self::IsoDep,
        Self::NfcDep,
        Self::T5t,
        Self::TargetIsoDep,
        Self::TargetNfcDep,
    ];

    fn bit(self) -> u8 {
        match self {
            Self::T1t => 1 << 0,
            Self::T2t => 1 << 1,
            Self::T3t => 1 << 2,
            Self::IsoDep => 1 << 3,
            Self::NfcDep => 1 << 4,
            Self::T5t => 1 << 5,
            Self::TargetIsoDep => 1 << 6,
            Self::TargetNfcDep => 1 << 7,
        }
    }

    /// Whether the local controller acts as a target for this protocol
    pub fn is_target_side(self) -> bool {
        matches!(self, Self::TargetIsoDep | Self::TargetNfcDep)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::T1t => "T1T",
            Self::T2t => "T2T",
            Self::T3t => "T3T",
            Self::IsoDep => "ISO-DEP",
            Self::NfcDep => "NFC-DEP",
            Self::T5t => "T5T",
            Self::TargetIsoDep => "ISO-DEP target",
            Self::TargetNfcDep => "NFC-DEP target",
        }
    }
}

/// Bitmask of RF protocols.
///
/// Every bit of the underlying byte maps to one [`RfProtocol`], so any `u8`
/// is a valid set. Serialized as a list of protocol names so settings files
/// stay readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RfProtocol>", into = "Vec<RfProtocol>")]
pub struct RfProtocols(u8);

impl RfProtocols {
    pub const EMPTY: Self = Self(0);
    pub const T1T: Self = Self(1 << 0);
    pub const T2T: Self = Self(1 << 1);
    pub const T3T: Self = Self(1 << 2);
    pub const ISO_DEP: Self = Self(1 << 3);
    pub const NFC_DEP: Self = Self(1 << 4);
    pub const T5T: Self = Self(1 << 5);
    pub const TARGET_ISO_DEP: Self = Self(1 << 6);
    pub const TARGET_NFC_DEP: Self = Self(1 << 7);
    pub const ALL: Self = Self(u8::MAX);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, protocol: RfProtocol) -> bool {
        self.0 & protocol.bit() != 0
    }

    /// True when every protocol in `self` is also in `other`
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & other.0 == self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Protocols in `self` that are not in `other`
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn insert(&mut self, protocol: RfProtocol) {
        self.0 |= protocol.bit();
    }

    pub fn iter(self) -> impl Iterator<Item = RfProtocol> {
        RfProtocol::ALL
            .into_iter()
            .filter(move |protocol| self.contains(*protocol))
    }

    /// Protocols polled for while the controller acts as initiator
    pub fn initiator_side(self) -> Self {
        self.iter().filter(|p| !p.is_target_side()).collect()
    }

    /// Protocols answered while the controller acts as target
    pub fn target_side(self) -> Self {
        self.iter().filter(|p| p.is_target_side()).collect()
    }
}

impl From<RfProtocol> for RfProtocols {
    fn from(protocol: RfProtocol) -> Self {
        Self(protocol.bit())
    }
}

impl FromIterator<RfProtocol> for RfProtocols {
    fn from_iter<I: IntoIterator<Item = RfProtocol>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for protocol in iter {
            set.insert(protocol);
        }
        set
    }
}

impl From<Vec<RfProtocol>> for RfProtocols {
    fn from(protocols: Vec<RfProtocol>) -> Self {
        protocols.into_iter().collect()
    }
}

impl From<RfProtocols> for Vec<RfProtocol> {
    fn from(set: RfProtocols) -> Self {
        set.iter().collect()
    }
}

impl BitOr for RfProtocols {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for RfProtocols {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl fmt::Debug for RfProtocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for RfProtocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        let names: Vec<&str> = self.iter().map(RfProtocol::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Technologies activated on the link when an endpoint was discovered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NfcTechs {
    pub type1: bool,
    pub type2: bool,
    pub type3: bool,
    pub iso_dep_a: bool,
    pub iso_dep_b: bool,
    pub nfc_dep_a: bool,
    pub nfc_dep_f_212: bool,
    pub nfc_dep_f_424: bool,
    pub type5: bool,
}

impl NfcTechs {
    pub fn is_iso_dep(&self) -> bool {
        self.iso_dep_a || self.iso_dep_b
    }

    pub fn is_nfc_dep(&self) -> bool {
        self.nfc_dep_a || self.nfc_dep_f_212 || self.nfc_dep_f_424
    }
}

/// Why a discovery cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    /// An endpoint was discovered and is now connected
    Completed,
    /// The caller canceled discovery
    Canceled,
    /// Unexpected failure on the air interface
    RfError,
}

/// Notifications produced by the controller, in the order they were detected
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    InitiatorDiscovered(RemoteInitiator),
    TargetDiscovered(RemoteTarget),
    DiscoveryTerminated(TerminationReason),
}
