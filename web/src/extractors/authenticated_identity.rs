use crate::{AppState, Error};
use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use domain::Identity;
use log::*;

pub(crate) struct AuthenticatedIdentity(pub Identity);

impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = Error;

    // Resolves the caller from the token cookie, falling back to an
    // `Authorization: Bearer` header. Anything the authenticator does not
    // accept is a 401.
    async fn from_request_parts(
        parts: &mut Parts,
        app_state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_token(&parts.headers, app_state.config.token_cookie_name())
            .or_else(|| bearer_token(&parts.headers))
            .ok_or(Error::Unauthorized)?;

        match app_state.authenticator.authenticate(token).await? {
            Some(identity) => {
                trace!("Authenticated stream identity {}", identity.id);
                Ok(AuthenticatedIdentity(identity))
            }
            None => Err(Error::Unauthorized),
        }
    }
}

fn cookie_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(axum::http::HeaderName, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(name.clone(), HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn finds_the_named_cookie_among_others() {
        let headers = headers(&[(COOKIE, "theme=dark; stream_token=abc.def; lang=en")]);
        assert_eq!(cookie_token(&headers, "stream_token"), Some("abc.def"));
        assert_eq!(cookie_token(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_is_ignored() {
        let headers = headers(&[(COOKIE, "stream_token=")]);
        assert_eq!(cookie_token(&headers, "stream_token"), None);
    }

    #[test]
    fn bearer_requires_the_scheme_prefix() {
        assert_eq!(
            bearer_token(&headers(&[(AUTHORIZATION, "Bearer abc.def")])),
            Some("abc.def")
        );
        assert_eq!(bearer_token(&headers(&[(AUTHORIZATION, "Basic Zm9vOmJhcg==")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
