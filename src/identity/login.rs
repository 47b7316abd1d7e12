//! The local login form.
//!
//! Opening the form for an identity provider pre-fills it from the current
//! login cookie when that cookie was issued by the same provider. The user
//! id always defaults to a fresh GUID so a first login needs no typing.

use crate::error::IdentityError;
use crate::http::request::Request;
use crate::identity::COOKIE_NAME;
use crate::identity::principal::ClientPrincipal;
use uuid::Uuid;

const MAX_USER_NAME: usize = 30;
const MAX_USER_ID: usize = 40;
const MAX_ROLES: usize = 100;

/// Fields of the login form for one identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub idp: String,
    pub user_name: String,
    pub user_id: String,
    /// One role per line
    pub roles: String,
}

impl LoginForm {
    /// Initial form values for `idp`.
    ///
    /// A login cookie from a different provider is ignored. A cookie that
    /// does not decode is an error.
    pub fn from_request(idp: &str, request: &Request) -> Result<Self, IdentityError> {
        let mut form = Self {
            idp: idp.to_string(),
            user_name: String::new(),
            user_id: String::new(),
            roles: String::new(),
        };

        if let Some(cookie) = request.cookie(COOKIE_NAME) {
            let principal = ClientPrincipal::decode(cookie)?;

            if principal.auth_typ.as_deref() == Some(idp) {
                form.user_name = principal
                    .name_typ
                    .as_deref()
                    .and_then(|typ| principal.claim(typ))
                    .unwrap_or_default()
                    .to_string();
                form.user_id = principal
                    .object_id()
                    .map(str::to_string)
                    .unwrap_or_else(new_user_id);
                form.roles = principal.roles().join("\n");
            }
        }

        if form.user_id.is_empty() {
            form.user_id = new_user_id();
        }

        tracing::debug!(idp = %form.idp, prefilled = !form.user_name.is_empty(), "Login form prepared");

        Ok(form)
    }

    /// Check the submitted fields: all required, each within its length limit
    pub fn validate(&self) -> Result<(), IdentityError> {
        check_field("user_name", &self.user_name, MAX_USER_NAME)?;
        check_field("user_id", &self.user_id, MAX_USER_ID)?;
        check_field("roles", &self.roles, MAX_ROLES)
    }

    /// Validate the form and build the principal it describes
    pub fn into_principal(self) -> Result<ClientPrincipal, IdentityError> {
        self.validate()?;
        Ok(ClientPrincipal::from_login(
            &self.idp,
            &self.user_name,
            &self.user_id,
            &self.roles,
        ))
    }
}

fn check_field(field: &'static str, value: &str, max: usize) -> Result<(), IdentityError> {
    if value.trim().is_empty() {
        return Err(IdentityError::MissingField { field });
    }
    if value.chars().count() > max {
        return Err(IdentityError::FieldTooLong { field, max });
    }
    Ok(())
}

fn new_user_id() -> String {
    Uuid::new_v4().to_string()
}
