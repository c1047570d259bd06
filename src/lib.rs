pub mod attr;
pub mod record;
pub mod severity;
pub mod buffer;
pub mod handler;
pub mod sink;
pub mod adapter;
pub mod buffered_sink;
pub mod layer;

pub mod env;
pub mod init;
pub mod noop_sink;
