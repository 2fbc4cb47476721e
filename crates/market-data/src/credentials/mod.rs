//! Access-token persistence and the interactive login that refreshes it.

mod authorizer;
mod store;

pub use authorizer::{
    callback_router, Authorizer, BrowserLauncher, CallbackState, TokenExchange,
    UpstoxAuthorizer, UpstoxTokenExchange,
};
pub use store::{is_stale_in, Credential, CredentialStore};
