pub mod client;
pub mod protocol;
pub mod server;

pub use client::ServiceClient;
pub use protocol::{Request, Response, ServiceError, ErrorKind};
pub use server::{dispatch, handle_client, serve};
