pub mod cell_table;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod pdu;
pub mod rls;
pub mod rrc;
pub mod task;
pub mod types;

pub use collaborators::{DataPlane, NasUplink, ParsedRrc, RrcCodec};
pub use error::{CodecError, ConfigError, UeTaskError};
pub use task::UeTask;
