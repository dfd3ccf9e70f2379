use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::config::Config;

/// Header carrying the admin key.
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Proof that the request presented the configured admin key.
///
/// Taking this as a request guard makes an endpoint admin-only; requests
/// without a matching key fail with `401 Unauthorized`.
#[derive(Debug)]
pub struct AdminCapability(());

#[derive(Debug)]
pub enum AdminAuthError {
    MissingKey,
    WrongKey,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminCapability {
    type Error = AdminAuthError;

    /// Panics iff the [`Config`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = req.guard::<&State<Config>>().await.unwrap();
        match req.headers().get_one(ADMIN_KEY_HEADER) {
            Some(key) if config.admin_key_matches(key) => Outcome::Success(AdminCapability(())),
            Some(_) => Outcome::Failure((Status::Unauthorized, AdminAuthError::WrongKey)),
            None => Outcome::Failure((Status::Unauthorized, AdminAuthError::MissingKey)),
        }
    }
}
