pub mod dap;
pub mod error;
pub mod harness;
pub mod manager;
pub mod mcp;
pub mod process;
pub mod profile;
pub mod security;
pub mod session;
pub mod watch;

pub use error::Error;
pub use mcp::McpServer;

pub type Result<T> = std::result::Result<T, Error>;

pub async fn serve() -> Result<()> {
    let server = McpServer::new().await?;
    server.run().await
}
