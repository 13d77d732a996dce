pub mod auth;
pub mod codec;
pub mod message;

pub use auth::md5_password;
pub use codec::MessageCodec;
pub use message::{AuthRequest, BackendFrame, BackendMessage, FrontendMessage, ServerError};
