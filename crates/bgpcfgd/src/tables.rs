//! Database table name constants for bgpcfgd

// CONFIG_DB tables
/// VRF table in CONFIG_DB
pub const CFG_VRF_TABLE_NAME: &str = "VRF";

/// SRv6 local SID table in CONFIG_DB
pub const CFG_SRV6_MY_SIDS_TABLE_NAME: &str = "SRV6_MY_SIDS";

/// SRv6 global settings table in CONFIG_DB
pub const CFG_SRV6_GLOBAL_TABLE_NAME: &str = "SRV6_GLOBAL";

/// Global BGP device settings table in CONFIG_DB
pub const CFG_BGP_DEVICE_GLOBAL_TABLE_NAME: &str = "BGP_DEVICE_GLOBAL";

/// Field names used in CONFIG_DB rows
pub mod fields {
    /// SID block length in bits
    pub const BLOCK_LEN: &str = "block_len";

    /// SID node length in bits
    pub const NODE_LEN: &str = "node_len";

    /// SID function length in bits
    pub const FUNC_LEN: &str = "func_len";

    /// SID argument length in bits
    pub const ARG_LEN: &str = "arg_len";

    /// SID endpoint behavior
    pub const ACTION: &str = "action";

    /// VRF a SID decapsulates into
    pub const VRF: &str = "vrf";

    /// Comma separated adjacencies for uA SIDs
    pub const ADJ: &str = "adj";

    /// SRv6 encapsulation source address
    pub const ENCAP_SRC_ADDR: &str = "encap_src_addr";

    /// AS numbers of a BGP device-global AS list
    pub const ASNS: &str = "asns";
}
