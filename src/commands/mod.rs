pub mod crypt;
pub mod prompt;
pub mod sync;

pub use crypt::{decrypt, encrypt, CryptRequest};
pub use sync::{pull, push, SyncRequest};
