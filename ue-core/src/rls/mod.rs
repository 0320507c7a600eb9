pub mod control;
pub mod sockets;
pub mod udp;

pub use control::RlsControlLayer;
pub use sockets::Sockets;
pub use udp::RlsUdpLayer;
