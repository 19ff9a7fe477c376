use std::{result, sync::Arc};

use log::{debug, error, info, trace};
use warp::http;

use crate::auth::{self, SessionId};
use crate::backend::{Backend, FindError};
use crate::fruit::{self, Fruit, FruitForm};
use crate::user::AccountForm;

pub struct FruitStand(Backend);

/// A request that has passed the session gate. Handlers only ever see
/// fruit operations through this, so the owning username is always
/// explicit rather than ambient request state.
pub struct FruitStandAuthed {
    stand: Arc<FruitStand>,
    session_id: SessionId,
    username: String,
}

#[derive(Copy, Clone, Debug)]
pub enum Error {
    Internal,
    Unauthorized,
    BadRequest,
}

pub type Result<T> = result::Result<T, Error>;

impl From<Error> for http::StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unauthorized => http::StatusCode::UNAUTHORIZED,
            Error::BadRequest => http::StatusCode::BAD_REQUEST,
        }
    }
}

impl warp::reject::Reject for Error {}

impl FruitStand {
    pub fn new(backend: Backend) -> Self {
        Self(backend)
    }

    pub async fn signup(&self, form: AccountForm) -> Result<()> {
        let AccountForm { username, password } = form;

        let pwhash = auth::hash_password(&password).map_err(|()| Error::Internal)?;

        self.0.create_user(&username, &pwhash).await.map_err(|()| {
            error!("couldn't create user {username}");
            Error::BadRequest
        })?;

        info!("{username} signed up");
        Ok(())
    }

    pub async fn login(self: &Arc<Self>, form: AccountForm) -> Result<FruitStandAuthed> {
        let AccountForm { username, password } = form;

        let user = self.0.find_user(&username).await.map_err(|e| {
            if matches!(e, FindError::NotFound) {
                error!("rejecting login for non-existent user {username}");
                Error::BadRequest
            } else {
                error!("couldn't look up user {username}: {e:?}");
                Error::Internal
            }
        })?;

        let matches =
            auth::verify_password(&password, &user.pwhash).map_err(|()| Error::Internal)?;
        if !matches {
            error!("wrong password for user {username}");
            return Err(Error::BadRequest);
        }

        // a fresh session each login - any previous browser session for
        // this user stops resolving
        let session_id = SessionId::new();

        if !self
            .0
            .update_user(&username, Some(&session_id.to_string()))
            .await
        {
            error!("couldn't store session for {username}");
            return Err(Error::Internal);
        }

        info!("{username} logged in");
        Ok(FruitStandAuthed {
            stand: Arc::clone(self),
            session_id,
            username,
        })
    }

    pub async fn authenticate(self: &Arc<Self>, session_id: SessionId) -> Result<FruitStandAuthed> {
        let session_str = session_id.to_string();

        let users = self
            .0
            .users_with_session(&session_str)
            .await
            .map_err(|()| Error::Internal)?;

        match &users[..] {
            [] => {
                error!("no user found for session {session_id}");
                Err(Error::Unauthorized)
            }
            [user] => {
                debug!("found user by session");
                Ok(FruitStandAuthed {
                    stand: Arc::clone(self),
                    session_id,
                    username: user.username.clone(),
                })
            }
            _ => {
                error!("multiple users found for session {session_id}");
                Err(Error::Internal)
            }
        }
    }
}

impl FruitStandAuthed {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn logout(&self) -> Result<()> {
        let username = &self.username;
        info!("{username} logout");

        self.stand
            .0
            .update_user(username, None)
            .await
            .then(|| ())
            .ok_or(Error::Internal)
    }

    /// Wipes the whole fruit collection - every user's records - and
    /// inserts the five starter fruits. The starters carry an empty
    /// owner, so they don't show up in anyone's listing.
    pub async fn seed(&self) -> Result<Vec<Fruit>> {
        let username = &self.username;
        info!("{username} reseeding the fruit store");

        let backend = &self.stand.0;

        backend.clear_fruits().await.map_err(|()| Error::Internal)?;

        let mut created = Vec::new();
        for data in fruit::starters() {
            let fruit = backend
                .create_fruit(data, "")
                .await
                .map_err(|()| Error::Internal)?;
            created.push(fruit);
        }

        info!("{username} reseeded, {} starter fruits", created.len());
        Ok(created)
    }

    pub async fn fruits(&self) -> Result<Vec<Fruit>> {
        let username = &self.username;
        trace!("{username} listing fruits");

        self.stand
            .0
            .fruits_for_owner(username)
            .await
            .map(|fruits| {
                info!("{username}, {} fruits", fruits.len());
                fruits
            })
            .map_err(|()| Error::Internal)
    }

    pub async fn create_fruit(&self, form: FruitForm) -> Result<Fruit> {
        let username = &self.username;
        let data = form.normalised();
        info!("{username} creating fruit \"{}\"", data.name);

        self.stand
            .0
            .create_fruit(data, username)
            .await
            .map_err(|()| Error::Internal)
    }

    /// None when the id doesn't resolve - the caller renders a
    /// not-found page instead of failing.
    pub async fn fruit(&self, id: &str) -> Result<Option<Fruit>> {
        let username = &self.username;
        trace!("{username} fetching fruit {id}");

        match self.stand.0.find_fruit(id).await {
            Ok(fruit) => Ok(Some(fruit)),
            Err(FindError::NotFound) => {
                info!("{username} requested missing fruit {id}");
                Ok(None)
            }
            Err(FindError::Internal) => Err(Error::Internal),
        }
    }

    pub async fn update_fruit(&self, id: &str, form: FruitForm) -> Result<()> {
        let username = &self.username;
        let data = form.normalised();
        info!("{username} updating fruit {id}");

        self.stand
            .0
            .update_fruit(id, data)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn delete_fruit(&self, id: &str) -> Result<()> {
        let username = &self.username;
        info!("{username} deleting fruit {id}");

        self.stand
            .0
            .delete_fruit(id)
            .await
            .map_err(|()| Error::Internal)
    }
}
