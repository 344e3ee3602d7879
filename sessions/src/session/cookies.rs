use cookie::time::Duration;
use cookie::Cookie;
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue};

use crate::errors::StoreError;
use crate::session::store::{SameSite, SessionOptions};

impl From<SameSite> for cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::None => cookie::SameSite::None,
        }
    }
}

/// Build the cookie that carries a session, applying `options`.
pub fn new_cookie(name: &str, value: &str, options: &SessionOptions) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value.to_string()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only)
        .same_site(options.same_site.into());

    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }

    // Negative max age expires the cookie immediately
    if options.max_age > 0 {
        builder = builder.max_age(Duration::seconds(options.max_age));
    } else if options.max_age < 0 {
        builder = builder.max_age(Duration::ZERO);
    }

    builder.build()
}

/// Append `cookie` to the response as a `Set-Cookie` header.
pub fn append_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> Result<(), StoreError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| StoreError::InvalidHeader(format!("{}: {}", cookie.name(), e)))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}
