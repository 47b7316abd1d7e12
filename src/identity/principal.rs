//! The simulated client principal and its cookie encoding.

use crate::error::IdentityError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Claim type holding the display name
pub const NAME_CLAIM: &str = "name";
/// Claim type holding one role; the `role_typ` field is not consulted
pub const ROLE_CLAIM: &str = "roles";
/// Claim type holding the user's object id
pub const OBJECT_ID_CLAIM: &str = "http://schemas.microsoft.com/identity/claims/objectidentifier";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    pub typ: String,
    pub val: String,
}

impl UserClaim {
    pub fn new(typ: impl Into<String>, val: impl Into<String>) -> Self {
        Self {
            typ: typ.into(),
            val: val.into(),
        }
    }
}

/// Identity payload forwarded as `X-MS-CLIENT-PRINCIPAL`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientPrincipal {
    /// Identity provider name
    pub auth_typ: Option<String>,
    #[serde(default)]
    pub claims: Vec<UserClaim>,
    pub name_typ: Option<String>,
    pub role_typ: Option<String>,
}

impl ClientPrincipal {
    /// Principal as produced by the login form.
    ///
    /// `roles` holds one role per line; blank lines are skipped.
    pub fn from_login(idp: &str, user_name: &str, user_id: &str, roles: &str) -> Self {
        let mut claims = vec![UserClaim::new(NAME_CLAIM, user_name)];
        claims.extend(
            roles
                .split(['\r', '\n'])
                .filter(|r| !r.is_empty())
                .map(|r| UserClaim::new(ROLE_CLAIM, r)),
        );
        claims.push(UserClaim::new(OBJECT_ID_CLAIM, user_id));

        Self {
            auth_typ: Some(idp.to_string()),
            claims,
            name_typ: Some("name".to_string()),
            role_typ: Some("role".to_string()),
        }
    }

    /// First value of the claim type `typ`
    pub fn claim(&self, typ: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.typ == typ)
            .map(|c| c.val.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.claim(NAME_CLAIM)
    }

    pub fn object_id(&self) -> Option<&str> {
        self.claim(OBJECT_ID_CLAIM)
    }

    pub fn roles(&self) -> Vec<&str> {
        self.claims
            .iter()
            .filter(|c| c.typ == ROLE_CLAIM)
            .map(|c| c.val.as_str())
            .collect()
    }

    /// Base64 of the JSON form, as carried in the cookie and header
    pub fn encode(&self) -> Result<String, IdentityError> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self, IdentityError> {
        let json = STANDARD.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&json)?)
    }
}
