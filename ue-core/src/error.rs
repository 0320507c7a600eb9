use thiserror::Error;

/// Errors from decoding/encoding RLS PDUs (component A, spec §4.A / §7 "Malformed input").
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("datagram too short: need at least {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },
    #[error("datagram left {remaining} trailing bytes after decoding")]
    TrailingBytes { remaining: usize },
    #[error("unknown PDU sub-type byte {0}")]
    UnknownPduType(u8),
}

/// Fatal config errors (§7): validated at startup, never surfaced once a
/// `UeTask` is running.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("incrementing {field} {value:?} by {delta} overflows its digit width")]
    NumericOverflow { field: &'static str, value: String, delta: u32 },
}

/// Errors a UE task can hit while running. Per spec §7, runtime invariant
/// breaks abort the owning UE thread; they never propagate across UEs.
#[derive(Error, Debug)]
pub enum UeTaskError {
    #[error("socket error on {role}: {source}")]
    Socket {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("address family {0} has no outbound socket")]
    UnsupportedFamily(&'static str),
    #[error("pdu id counter overflowed u32::MAX, one run must not exceed 2^32-1 PDUs")]
    PduIdOverflow,
    #[error("cell table desync: cell {cell_id} has no backing sti")]
    CellTableDesync { cell_id: u32 },
}
