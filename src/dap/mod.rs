pub mod client;
pub mod transport;
pub mod transport_trait;
pub mod types;

pub use client::DapClient;
pub use transport::DapTransport;
pub use transport_trait::DapTransportTrait;
