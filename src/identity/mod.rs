//! Identity header simulation
//!
//! Applications hosted behind the platform's built-in authentication read
//! the signed-in user from `X-MS-CLIENT-PRINCIPAL*` headers. Locally, a
//! login form stores a principal in a cookie and this module copies it into
//! those headers on every proxied request.

pub mod login;
pub mod principal;

pub use login::LoginForm;
pub use principal::{ClientPrincipal, UserClaim};

use crate::error::IdentityError;
use crate::http::request::Request;
use crate::http::response::Response;

/// Cookie holding the encoded principal
pub const COOKIE_NAME: &str = "EasyAuthDev";

const COOKIE_MAX_AGE_SECS: u64 = 3600;

pub mod headers {
    pub const CLIENT_PRINCIPAL: &str = "X-MS-CLIENT-PRINCIPAL";
    pub const CLIENT_PRINCIPAL_IDP: &str = "X-MS-CLIENT-PRINCIPAL-IDP";
    pub const CLIENT_PRINCIPAL_NAME: &str = "X-MS-CLIENT-PRINCIPAL-NAME";
    pub const CLIENT_PRINCIPAL_ID: &str = "X-MS-CLIENT-PRINCIPAL-ID";
}

/// Add identity headers from the login cookie, if present.
///
/// Returns the decoded principal, or `None` when nobody is signed in.
pub fn inject_identity_headers(
    request: &mut Request,
) -> Result<Option<ClientPrincipal>, IdentityError> {
    let Some(cookie) = request.cookie(COOKIE_NAME).map(str::to_string) else {
        return Ok(None);
    };

    let principal = ClientPrincipal::decode(&cookie)?;

    request.set_header(headers::CLIENT_PRINCIPAL, cookie);
    request.set_header(
        headers::CLIENT_PRINCIPAL_IDP,
        principal.auth_typ.clone().unwrap_or_default(),
    );
    if let Some(name) = principal.name() {
        request.set_header(headers::CLIENT_PRINCIPAL_NAME, name);
    }
    if let Some(id) = principal.object_id() {
        request.set_header(headers::CLIENT_PRINCIPAL_ID, id);
    }

    tracing::trace!(idp = ?principal.auth_typ, path = %request.path, "Identity headers injected");

    Ok(Some(principal))
}

/// `Set-Cookie` value storing `principal` for an hour
pub fn login_cookie(principal: &ClientPrincipal) -> Result<String, IdentityError> {
    Ok(format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly",
        COOKIE_NAME,
        principal.encode()?,
        COOKIE_MAX_AGE_SECS
    ))
}

/// Clear the login cookie and send the user back where they came from
pub fn logout_response(request: &Request) -> Response {
    let location = request.header("Referer").unwrap_or("/");

    Response::redirect(location)
        .header(
            "Set-Cookie",
            format!(
                "{}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/",
                COOKIE_NAME
            ),
        )
        .build()
}
