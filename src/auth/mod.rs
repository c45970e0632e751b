//! Service-account authentication.
//!
//! Turns a Google service-account key file into a short-lived OAuth2 access
//! token: the key is loaded ([`credential`]), an RS256 JWT bearer assertion is
//! signed with it ([`assertion`]) and the assertion is exchanged at the key's
//! `token_uri` ([`token`]). [`source`] chains the three steps.

pub mod assertion;
pub mod credential;
pub mod source;
pub mod token;

pub use assertion::{sign, SignedAssertion, SigningError, PLATFORM_SCOPE};
pub use credential::{CredentialError, ServiceAccountCredential};
pub use source::{CredentialSource, ServiceAccountTokenSource, TokenSourceError};
pub use token::{AccessToken, TokenError, TokenExchangeClient};
