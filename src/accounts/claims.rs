use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::AccountKind;

/// What a JWT may be used for: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// JWT payload binding an account's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,         // account ID
    pub email: String,     // normalized email
    pub kind: AccountKind, // client / freelancer / admin
    pub iat: usize,        // issued at (unix timestamp)
    pub exp: usize,        // expires at (unix timestamp)
    pub iss: String,       // issuer
    pub aud: String,       // audience
    pub typ: TokenUse,     // access or refresh
}
