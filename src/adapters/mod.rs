//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements     | Connects to                     |
//! |----------------|----------------|---------------------------------|
//! | `config_store` | ConfigStore    | JSON configuration documents    |
//! | `log_sink`     | BroadcastSink  | Serial log output               |
//! | `nvs`          | ConfigPort     | In-memory blob store            |
//! | `time`         | ClockPort      | Time-sync status shared with the network side |

pub mod config_store;
pub mod log_sink;
pub mod nvs;
pub mod time;
