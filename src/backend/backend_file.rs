use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use uuid::Uuid;

use crate::backend::FindError;
use crate::fruit::{Fruit, FruitData};
use crate::user::User;

mod kv;
use kv::KeyValues;

type Result<T> = std::result::Result<T, ()>;

/// Flat-file document store: one `creds.txt` per user under `users/`,
/// and the whole fruit collection as json documents, one per line, in
/// `fruits.txt`.
pub struct Backend {
    root: PathBuf,
}

impl Backend {
    pub async fn new(path: &Path) -> Self {
        fs::create_dir_all(path.join("users")).expect("data directory");
        info!("Using {}", path.display());

        Self {
            root: path.to_path_buf(),
        }
    }

    fn creds_path(&self, username: &str) -> PathBuf {
        self.root.join("users").join(username).join("creds.txt")
    }

    fn fruits_path(&self) -> PathBuf {
        self.root.join("fruits.txt")
    }

    fn read_user(&self, username: &str) -> std::result::Result<KeyValues, FindError> {
        let path = self.creds_path(username);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                return FindError::NotFound;
            }
            error!("open \"{path:?}\": {e:?}");
            FindError::Internal
        })?;

        kv::read(file)
    }

    fn write_user(&self, username: &str, keyvalues: &KeyValues) -> Result<()> {
        let path = self.creds_path(username);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                error!("open \"{path:?}\": {e:?}");
            })?;

        kv::write(file, keyvalues).map_err(|e| {
            error!("write \"{path:?}\": {e:?}");
        })
    }
}

impl Backend {
    /// No uniqueness check: signing up under an existing username
    /// replaces that user's credentials, like the original store.
    pub async fn create_user(&self, username: &str, pwhash: &str) -> Result<()> {
        let dir = self.root.join("users").join(username);
        fs::create_dir_all(&dir).map_err(|e| {
            error!("mkdir \"{dir:?}\": {e:?}");
        })?;

        let mut user = KeyValues::new();
        user.insert("pwhash".into(), pwhash.into());

        self.write_user(username, &user)
    }

    pub async fn find_user(&self, username: &str) -> std::result::Result<User, FindError> {
        let user = self.read_user(username)?;

        Ok(User {
            username: username.into(),
            pwhash: user.get("pwhash").ok_or(FindError::Internal)?.clone(),
            session_id: user.get("session_id").map(|x| x.into()),
        })
    }

    /// session_id: set to None to logout / forget the session
    pub async fn update_user(&self, username: &str, session_id: Option<&str>) -> bool {
        let mut user = match self.read_user(username) {
            Ok(u) => u,
            Err(e) => {
                error!("read \"{username}\": {e:?}");
                return false;
            }
        };

        match session_id {
            Some(id) => {
                user.insert("session_id".into(), id.into());
            }
            None => {
                user.remove("session_id");
            }
        }

        self.write_user(username, &user).is_ok()
    }

    pub async fn users_with_session(&self, session_id: &str) -> Result<Vec<User>> {
        let path = self.root.join("users");
        let mut users = vec![];

        let emap = |e: &dyn std::fmt::Debug| {
            error!("error looking up session: {e:?}");
        };

        for ent in fs::read_dir(path).map_err(|e| emap(&e))? {
            let ent = ent.map_err(|e| emap(&e))?;

            let fname = ent.file_name();
            let username = match fname.into_string() {
                Ok(x) => x,
                Err(e) => {
                    warn!("couldn't convert path into string: {e:?}");
                    continue;
                }
            };

            let user = self.find_user(&username).await.map_err(|e| emap(&e))?;
            if user.session_id.as_deref() == Some(session_id) {
                users.push(user);
            }
        }

        Ok(users)
    }
}

impl Backend {
    fn read_fruits(&self) -> Result<Vec<Fruit>> {
        let path = self.fruits_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                error!("open \"{path:?}\": {e:?}");
                return Err(());
            }
        };

        let mut fruits = vec![];

        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| {
                error!("read \"{path:?}\": {e:?}");
            })?;

            let fruit = serde_json::from_str(&line).map_err(|e| {
                error!("couldn't parse fruit line: {e:?}");
            })?;
            fruits.push(fruit);
        }

        Ok(fruits)
    }

    fn write_fruits(&self, fruits: &[Fruit]) -> Result<()> {
        let path = self.fruits_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                error!("open \"{path:?}\": {e:?}");
            })?;

        for fruit in fruits {
            let json = serde_json::to_string(fruit).map_err(|e| {
                error!("couldn't convert fruit to json: {e:?}");
            })?;

            writeln!(file, "{}", json).map_err(|e| {
                error!("writing fruit: {e:?}");
            })?;
        }

        Ok(())
    }

    pub async fn fruits_for_owner(&self, owner: &str) -> Result<Vec<Fruit>> {
        Ok(self
            .read_fruits()?
            .into_iter()
            .filter(|fruit| fruit.owner == owner)
            .collect())
    }

    pub async fn find_fruit(&self, id: &str) -> std::result::Result<Fruit, FindError> {
        self.read_fruits()
            .map_err(|()| FindError::Internal)?
            .into_iter()
            .find(|fruit| fruit.id == id)
            .ok_or(FindError::NotFound)
    }

    pub async fn create_fruit(&self, data: FruitData, owner: &str) -> Result<Fruit> {
        let FruitData {
            name,
            color,
            ready_to_eat,
        } = data;

        let fruit = Fruit {
            id: Uuid::new_v4().to_string(),
            name,
            color,
            ready_to_eat,
            owner: owner.into(),
        };

        let path = self.fruits_path();
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| {
                error!("open \"{path:?}\": {e:?}");
            })?;

        let json = serde_json::to_string(&fruit).map_err(|e| {
            error!("couldn't convert fruit to json: {e:?}");
        })?;

        writeln!(file, "{}", json).map_err(|e| {
            error!("writing fruit: {e:?}");
        })?;

        Ok(fruit)
    }

    /// Updating an id that doesn't resolve is a no-op, matching the
    /// original store's find-and-update.
    pub async fn update_fruit(&self, id: &str, data: FruitData) -> Result<()> {
        let mut fruits = self.read_fruits()?;

        match fruits.iter_mut().find(|fruit| fruit.id == id) {
            Some(fruit) => {
                fruit.name = data.name;
                fruit.color = data.color;
                fruit.ready_to_eat = data.ready_to_eat;
            }
            None => {
                warn!("update for missing fruit {id}");
                return Ok(());
            }
        }

        self.write_fruits(&fruits)
    }

    pub async fn delete_fruit(&self, id: &str) -> Result<()> {
        let mut fruits = self.read_fruits()?;
        let before = fruits.len();

        fruits.retain(|fruit| fruit.id != id);

        if fruits.len() == before {
            warn!("delete for missing fruit {id}");
            return Ok(());
        }

        self.write_fruits(&fruits)
    }

    pub async fn clear_fruits(&self) -> Result<()> {
        self.write_fruits(&[])
    }

    #[cfg(test)]
    pub async fn all_fruits(&self) -> Vec<Fruit> {
        self.read_fruits().unwrap()
    }
}

#[cfg(test)]
pub mod test {
    use super::Backend;

    use uuid::Uuid;

    pub async fn create_backend() -> Backend {
        let root = std::env::temp_dir().join(format!("fruitstand-test-{}", Uuid::new_v4()));

        Backend::new(&root).await
    }
}
