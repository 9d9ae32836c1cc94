//! SRv6 Segment Identifier codec.
//!
//! A SID is a 128-bit IPv6 address split, most significant bit first, into
//! `block | node | function | argument` fields. The locator is the
//! `block + node` prefix and the opcode is the function field that follows
//! it. Both are returned in place (masked, not shifted), so a locator can be
//! printed back as an IPv6 prefix.

use std::fmt;
use std::net::Ipv6Addr;

use sonic_bgpcfg_common::{FieldValues, FieldValuesExt};
use thiserror::Error;

use crate::tables::fields;

/// Default SID block length in bits.
pub const DEFAULT_BLOCK_LEN: u8 = 32;
/// Default SID node length in bits.
pub const DEFAULT_NODE_LEN: u8 = 16;
/// Default SID function length in bits.
pub const DEFAULT_FUNC_LEN: u8 = 16;
/// Default SID argument length in bits.
pub const DEFAULT_ARG_LEN: u8 = 0;
/// VRF used when a SID row names none.
pub const DEFAULT_VRF: &str = "default";

const SID_BITS: u16 = 128;

/// Errors raised while building a [`Sid`] from a configuration row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidError {
    /// The row key is not an IPv6 address.
    #[error("Invalid SID address '{0}'")]
    InvalidAddress(String),

    /// The row has no `action` field.
    #[error("SID row is missing the 'action' field")]
    MissingAction,

    /// A bit-length field is not a number.
    #[error("Invalid {field} '{value}'")]
    InvalidLength {
        /// Name of the field.
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// The field lengths add up to more than 128 bits.
    #[error("SID format {block_len}/{node_len}/{func_len}/{arg_len} exceeds 128 bits")]
    FormatOverflow {
        /// Block length.
        block_len: u8,
        /// Node length.
        node_len: u8,
        /// Function length.
        func_len: u8,
        /// Argument length.
        arg_len: u8,
    },

    /// An adjacency is not an IPv6 address.
    #[error("Invalid adjacency '{0}'")]
    InvalidAdjacency(String),
}

/// Returns a mask with the `n` most significant bits set.
fn high_bits(n: u8) -> u128 {
    match n {
        0 => 0,
        n => u128::MAX << (SID_BITS - u16::from(n)),
    }
}

/// Bit widths of the SID fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SidFormat {
    block_len: u8,
    node_len: u8,
    func_len: u8,
    arg_len: u8,
}

impl SidFormat {
    /// Creates a format, rejecting lengths that do not fit in 128 bits.
    pub fn new(block_len: u8, node_len: u8, func_len: u8, arg_len: u8) -> Result<Self, SidError> {
        let total = u16::from(block_len)
            + u16::from(node_len)
            + u16::from(func_len)
            + u16::from(arg_len);
        if total > SID_BITS {
            return Err(SidError::FormatOverflow {
                block_len,
                node_len,
                func_len,
                arg_len,
            });
        }
        Ok(Self {
            block_len,
            node_len,
            func_len,
            arg_len,
        })
    }

    /// Reads the format from a row, defaulting absent fields.
    pub fn from_fields(data: &FieldValues) -> Result<Self, SidError> {
        let len = |field: &'static str, default: u8| -> Result<u8, SidError> {
            match data.get_field(field) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|_| SidError::InvalidLength {
                    field,
                    value: raw.to_string(),
                }),
            }
        };

        Self::new(
            len(fields::BLOCK_LEN, DEFAULT_BLOCK_LEN)?,
            len(fields::NODE_LEN, DEFAULT_NODE_LEN)?,
            len(fields::FUNC_LEN, DEFAULT_FUNC_LEN)?,
            len(fields::ARG_LEN, DEFAULT_ARG_LEN)?,
        )
    }

    pub fn block_len(&self) -> u8 {
        self.block_len
    }

    pub fn node_len(&self) -> u8 {
        self.node_len
    }

    pub fn func_len(&self) -> u8 {
        self.func_len
    }

    pub fn arg_len(&self) -> u8 {
        self.arg_len
    }

    /// Length of the locator (block + node) in bits.
    pub fn locator_len(&self) -> u8 {
        self.block_len + self.node_len
    }

    /// Mask selecting the locator bits.
    pub fn locator_mask(&self) -> u128 {
        high_bits(self.locator_len())
    }

    /// Mask selecting the function bits, right below the locator.
    pub fn function_mask(&self) -> u128 {
        high_bits(self.func_len)
            .checked_shr(u32::from(self.locator_len()))
            .unwrap_or(0)
    }
}

impl Default for SidFormat {
    fn default() -> Self {
        Self {
            block_len: DEFAULT_BLOCK_LEN,
            node_len: DEFAULT_NODE_LEN,
            func_len: DEFAULT_FUNC_LEN,
            arg_len: DEFAULT_ARG_LEN,
        }
    }
}

/// One configured SRv6 SID.
///
/// Built fresh from each configuration row and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sid {
    addr: Ipv6Addr,
    format: SidFormat,
    action: String,
    vrf: String,
    adj: Vec<Ipv6Addr>,
}

impl Sid {
    /// Parses a SID from its address and configuration row.
    pub fn new(ip_addr: &str, data: &FieldValues) -> Result<Self, SidError> {
        let addr: Ipv6Addr = ip_addr
            .trim()
            .parse()
            .map_err(|_| SidError::InvalidAddress(ip_addr.to_string()))?;

        let format = SidFormat::from_fields(data)?;

        let action = data
            .get_field(fields::ACTION)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(SidError::MissingAction)?
            .to_string();

        let vrf = data.get_field_or(fields::VRF, DEFAULT_VRF).to_string();

        let adj = data
            .get_field(fields::ADJ)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| {
                a.parse::<Ipv6Addr>()
                    .map_err(|_| SidError::InvalidAdjacency(a.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            addr,
            format,
            action,
            vrf,
            adj,
        })
    }

    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    /// The address as a 128-bit integer, network order.
    pub fn bits(&self) -> u128 {
        u128::from(self.addr)
    }

    pub fn format(&self) -> SidFormat {
        self.format
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn vrf(&self) -> &str {
        &self.vrf
    }

    pub fn adj(&self) -> &[Ipv6Addr] {
        &self.adj
    }

    /// The locator (block + node) bits, in place.
    pub fn locator(&self) -> u128 {
        self.bits() & self.format.locator_mask()
    }

    /// The function bits, in place.
    pub fn opcode(&self) -> u128 {
        self.bits() & self.format.function_mask()
    }

    /// The locator as an IPv6 prefix, e.g. `fcbb:bbbb:1::/48`.
    pub fn locator_prefix(&self) -> String {
        format!(
            "{}/{}",
            Ipv6Addr::from(self.locator()),
            self.format.locator_len()
        )
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} vrf {}", self.addr, self.action, self.vrf)
    }
}
