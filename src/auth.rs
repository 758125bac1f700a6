//! Session handling.
//!
//! Handlers never reach for a global auth instance: a [`SessionVerifier`] is
//! built once at startup, stored in `AppState`, and consulted by the
//! [`CurrentUser`] extractor on every authenticated request.

mod codes;
mod current_user;
mod password;
mod session;

pub use codes::{AuthorizationCodeClaims, AuthorizationCodeSigner};
pub use current_user::{session_cookie, clear_session_cookie, session_token, CurrentUser, SESSION_COOKIE};
pub use password::{hash_password, verify_password, PasswordError};
pub use session::{JwtSessionVerifier, SessionError, SessionVerifier};
