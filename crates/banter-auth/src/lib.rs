pub mod cache;
pub mod codec;
pub mod gate;

pub use cache::TokenValidationCache;
pub use codec::{TokenClaims, TokenCodec, TokenError};
pub use gate::AccessGate;
