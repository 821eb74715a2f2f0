// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session cookie and CSRF token.
//
// A browser gets an opaque random token in an HttpOnly cookie on its first
// request; that token keys its queue. State-changing requests carry a CSRF
// token derived from the session token and a per-process secret.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use printgate_core::types::SessionId;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "printgate_session";

/// Per-process key for CSRF tokens.
#[derive(Clone)]
pub struct CsrfSecret([u8; 32]);

impl CsrfSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self(bytes)
    }

    pub fn token_for(&self, session: &SessionId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(session.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, session: &SessionId, presented: &str) -> bool {
        let expected = self.token_for(session);
        // Equal length is public; compare every byte regardless.
        expected.len() == presented.len()
            && expected
                .bytes()
                .zip(presented.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// Tokens we mint are 32 hex digits; anything else is replaced.
fn plausible_token(value: &str) -> bool {
    (16..=128).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// The caller's session, minting one (and setting the cookie) if the
/// request had none.
pub fn ensure(jar: CookieJar) -> (CookieJar, SessionId) {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && plausible_token(cookie.value())
    {
        let session = SessionId::new(cookie.value());
        return (jar, session);
    }

    let session = SessionId::generate();
    let cookie = Cookie::build((SESSION_COOKIE, session.as_str().to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), session)
}

/// The caller's session if the request carried one.
pub fn existing(jar: &CookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| plausible_token(value))
        .map(SessionId::new)
}

/// Expire the session cookie.
pub fn clear(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_bound_to_session_and_secret() {
        let secret = CsrfSecret::generate();
        let alice = SessionId::new("a".repeat(32));
        let bob = SessionId::new("b".repeat(32));

        let token = secret.token_for(&alice);
        assert_eq!(token.len(), 64);
        assert!(secret.verify(&alice, &token));
        assert!(!secret.verify(&bob, &token));
        assert!(!CsrfSecret::generate().verify(&alice, &token));
        assert!(!secret.verify(&alice, ""));
        assert!(!secret.verify(&alice, &token[..63]));
    }

    #[test]
    fn missing_cookie_mints_a_session() {
        let (jar, session) = ensure(CookieJar::new());
        assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), session.as_str());
        assert!(plausible_token(session.as_str()));
    }

    #[test]
    fn existing_cookie_is_kept() {
        let token = "0123456789abcdef0123456789abcdef";
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, token));
        let (_, session) = ensure(jar);
        assert_eq!(session.as_str(), token);
    }

    #[test]
    fn junk_cookie_is_replaced() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "../../etc"));
        assert!(existing(&jar).is_none());
        let (_, session) = ensure(jar);
        assert_ne!(session.as_str(), "../../etc");
    }
}
