pub mod identity_provider;
pub mod sms_gateway;
pub mod token_service;

pub use identity_provider::{
    build_http_client, IdentityProvider, MobileBackendClient, XinchuanAuthClient,
};
pub use sms_gateway::{Every8dClient, SendReceipt};
pub use token_service::{AuthenticatedPrincipal, IssuedToken, TokenIssuer, TokenVerifier};
