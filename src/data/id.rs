use std::fmt::Display;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const TIMESTAMP_BITS: u8 = 64;
const SEQUENCE_BITS: u8 = 12;
const SERVICE_ID_BITS: u8 = 16;
const WORKER_ID_BITS: u8 = 16;
const RANDOM_BITS: u8 = 20;

const _: () = assert!(
    TIMESTAMP_BITS + SEQUENCE_BITS + SERVICE_ID_BITS + WORKER_ID_BITS + RANDOM_BITS == 128
);

const TIMESTAMP_OFFSET: u8 = SEQUENCE_OFFSET + SEQUENCE_BITS;
const SEQUENCE_OFFSET: u8 = SERVICE_ID_OFFSET + SERVICE_ID_BITS;
const SERVICE_ID_OFFSET: u8 = WORKER_ID_OFFSET + WORKER_ID_BITS;
const WORKER_ID_OFFSET: u8 = RANDOM_BITS;

const _: () = assert!(128 == TIMESTAMP_OFFSET + TIMESTAMP_BITS);

const TIMESTAMP_MASK: u128 = (1 << TIMESTAMP_BITS) - 1;
const SEQUENCE_MASK: u128 = (1 << SEQUENCE_BITS) - 1;
const SERVICE_ID_MASK: u128 = (1 << SERVICE_ID_BITS) - 1;
const WORKER_ID_MASK: u128 = (1 << WORKER_ID_BITS) - 1;
const RANDOM_MASK: u128 = (1 << RANDOM_BITS) - 1;

const HEX_LEN: usize = 32;

/// Surrogate key assigned to every document on insert.
///
/// Field order matches bit order, so the derived ordering sorts identifiers
/// by creation time first.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
pub struct Identifier {
    timestamp: SystemTime,
    sequence: u16,
    service_id: u16,
    worker_id: u16,
    random: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdentifierError {
    #[error("identifier must be 32 hex digits, got {0} characters")]
    InvalidLength(usize),

    #[error("identifier contains non-hex characters: {0}")]
    InvalidDigit(String),
}

impl Identifier {
    pub fn as_hex(&self) -> String {
        format!("{:032x}", u128::from(*self))
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl FromStr for Identifier {
    type Err = ParseIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HEX_LEN {
            return Err(ParseIdentifierError::InvalidLength(s.len()));
        }
        // from_str_radix tolerates a leading sign, the key format does not
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseIdentifierError::InvalidDigit(s.to_string()));
        }
        let id = u128::from_str_radix(s, 16)
            .map_err(|_| ParseIdentifierError::InvalidDigit(s.to_string()))?;
        Ok(id.into())
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl From<u128> for Identifier {
    fn from(id: u128) -> Self {
        Self {
            timestamp: SystemTime::UNIX_EPOCH
                + Duration::from_millis(((id >> TIMESTAMP_OFFSET) & TIMESTAMP_MASK) as u64),
            sequence: ((id >> SEQUENCE_OFFSET) & SEQUENCE_MASK) as u16,
            service_id: ((id >> SERVICE_ID_OFFSET) & SERVICE_ID_MASK) as u16,
            worker_id: ((id >> WORKER_ID_OFFSET) & WORKER_ID_MASK) as u16,
            random: (id & RANDOM_MASK) as u32,
        }
    }
}

impl From<Identifier> for u128 {
    fn from(id: Identifier) -> u128 {
        let millis = id.timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() & TIMESTAMP_MASK;
        millis << TIMESTAMP_OFFSET |
            (id.sequence as u128) << SEQUENCE_OFFSET |
            (id.service_id as u128) << SERVICE_ID_OFFSET |
            (id.worker_id as u128) << WORKER_ID_OFFSET |
            (id.random as u128 & RANDOM_MASK)
    }
}

/// Produces strictly increasing identifiers for a single service/worker pair.
#[derive(Debug)]
pub struct IdentifierGenerator {
    timestamp: u64,
    sequence: u16,
    service_id: u16,
    worker_id: u16,
}

impl IdentifierGenerator {
    pub fn new(service_id: u16, worker_id: u16) -> Self {
        Self {
            timestamp: 0,
            sequence: 0,
            service_id,
            worker_id,
        }
    }

    pub fn generate(&mut self) -> Identifier {
        self.generate_bits().into()
    }

    fn generate_bits(&mut self) -> u128 {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        // Never step backwards, and borrow the next millisecond once the
        // sequence space of the current one is exhausted.
        if now > self.timestamp {
            self.timestamp = now;
            self.sequence = 0;
        } else if (self.sequence as u128) < SEQUENCE_MASK {
            self.sequence += 1;
        } else {
            self.timestamp += 1;
            self.sequence = 0;
        }
        let random = rand::random::<u32>() as u128 & RANDOM_MASK;
        (self.timestamp as u128) << TIMESTAMP_OFFSET |
            (self.sequence as u128) << SEQUENCE_OFFSET |
            (self.service_id as u128) << SERVICE_ID_OFFSET |
            (self.worker_id as u128) << WORKER_ID_OFFSET |
            random
    }
}
