use std::fmt;
use std::str::FromStr;

use cookie::time::Duration;
use cookie::Cookie;
use log::error;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sessionid";

/// Matches the original bcrypt setup.
const HASH_COST: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for SessionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        Uuid::try_parse(s).map(Self).map_err(|_| ())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

pub fn hash_password(password: &str) -> Result<String, ()> {
    bcrypt::hash(password, HASH_COST).map_err(|e| {
        error!("couldn't hash password: {e:?}");
    })
}

pub fn verify_password(password: &str, pwhash: &str) -> Result<bool, ()> {
    bcrypt::verify(password, pwhash).map_err(|e| {
        error!("couldn't verify password against stored hash: {e:?}");
    })
}

pub fn session_cookie(session_id: &SessionId, secure: bool) -> String {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .build()
        .to_string()
}

/// An already-expired cookie, to clear the session on logout.
pub fn clear_session_cookie() -> String {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(Duration::ZERO)
        .build()
        .to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_id_round_trips_through_cookie_value() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();

        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_rejects_junk() {
        assert!("not-a-uuid".parse::<SessionId>().is_err());
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();

        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn session_cookie_flags() {
        let id = SessionId::new();

        let plain = session_cookie(&id, false);
        assert!(plain.contains("HttpOnly"));
        assert!(!plain.contains("Secure"));

        let secure = session_cookie(&id, true);
        assert!(secure.contains("Secure"));
    }
}
