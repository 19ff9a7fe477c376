use std::path::{Path, PathBuf};

use sqlx::{migrate::MigrateDatabase, Pool, Sqlite, SqlitePool};
use uuid::Uuid;

use log::{error, info, warn};

use crate::backend::FindError;
use crate::fruit::{Fruit, FruitData};
use crate::user::User;

type Result<T> = std::result::Result<T, ()>;

pub struct Backend(pub Pool<Sqlite>);

fn into_sql(path: &Path) -> PathBuf {
    path.join("fruitstand.sql")
}

pub async fn init(data_dir: &Path) {
    let final_path = format!(
        "sqlite://{}",
        into_sql(data_dir).to_str().expect("non utf-8 data")
    );
    match Sqlite::create_database(&final_path).await {
        Ok(()) => {
            info!("Using {}", &final_path);
        }
        Err(e) => {
            let sqlx::Error::Database(db_err) = e else {
                panic!("error creating database: {e}");
            };

            panic!("sql db error: {db_err:?}");
        }
    }
}

impl Backend {
    pub async fn new(data_dir: &Path) -> Self {
        let db_pathbuf = into_sql(data_dir);
        let db_path = db_pathbuf.to_str().expect("non utf-8 data");
        let pool = match SqlitePool::connect(db_path).await {
            Ok(pool) => pool,
            Err(_err) => {
                init(data_dir).await;
                SqlitePool::connect(db_path).await.expect("db connection")
            }
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migration");

        Self(pool)
    }
}

impl Backend {
    /// The primary key on `username` makes a duplicate signup fail
    /// here, unlike the file backend.
    pub async fn create_user(&self, username: &str, pwhash: &str) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO users
            (username, pwhash)
            VALUES
            (?, ?)
            ",
        )
        .bind(username)
        .bind(pwhash)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting user: {e:?}");
        })
    }

    pub async fn find_user(&self, username: &str) -> std::result::Result<User, FindError> {
        sqlx::query_as::<_, User>(
            "
            SELECT username, pwhash, session_id
            FROM users
            WHERE username = ?
            ",
        )
        .bind(username)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                FindError::Internal
            }
        })
    }

    /// session_id: set to None to logout / make NULL
    pub async fn update_user(&self, username: &str, session_id: Option<&str>) -> bool {
        sqlx::query(
            "
            UPDATE users
            SET session_id = ?
            WHERE username = ?
            ",
        )
        .bind(session_id)
        .bind(username)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("update user: {e}");
            e
        })
        .is_ok()
    }

    pub async fn users_with_session(&self, session_id: &str) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            "
            SELECT username, pwhash, session_id
            FROM users
            WHERE session_id = ?
            ",
        )
        .bind(session_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query for session {session_id}: {e:?}");
        })
    }
}

impl Backend {
    pub async fn fruits_for_owner(&self, owner: &str) -> Result<Vec<Fruit>> {
        sqlx::query_as::<_, Fruit>(
            "
            SELECT id, name, color, ready_to_eat, owner
            FROM fruits
            WHERE owner = ?
            ",
        )
        .bind(owner)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting fruits: {e:?}");
        })
    }

    pub async fn find_fruit(&self, id: &str) -> std::result::Result<Fruit, FindError> {
        sqlx::query_as::<_, Fruit>(
            "
            SELECT id, name, color, ready_to_eat, owner
            FROM fruits
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("error selecting fruit {id}: {e:?}");
                FindError::Internal
            }
        })
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

        sqlx::query(
            "
            INSERT INTO fruits
            (id, name, color, ready_to_eat, owner)
            VALUES
            (?, ?, ?, ?, ?)
            ",
        )
        .bind(&fruit.id)
        .bind(&fruit.name)
        .bind(&fruit.color)
        .bind(fruit.ready_to_eat)
        .bind(&fruit.owner)
        .execute(&self.0)
        .await
        .map(|_| fruit)
        .map_err(|e| {
            error!("error inserting fruit: {e:?}");
        })
    }

    /// Updating an id that doesn't resolve is a no-op, matching the
    /// original store's find-and-update.
    pub async fn update_fruit(&self, id: &str, data: FruitData) -> Result<()> {
        sqlx::query(
            "
            UPDATE fruits
            SET name = ?, color = ?, ready_to_eat = ?
            WHERE id = ?
            ",
        )
        .bind(&data.name)
        .bind(&data.color)
        .bind(data.ready_to_eat)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| {
            if done.rows_affected() == 0 {
                warn!("update for missing fruit {id}");
            }
        })
        .map_err(|e| {
            error!("error updating fruit {id}: {e:?}");
        })
    }

    pub async fn delete_fruit(&self, id: &str) -> Result<()> {
        sqlx::query(
            "
            DELETE FROM fruits
            WHERE id = ?
            ",
        )
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| {
            if done.rows_affected() == 0 {
                warn!("delete for missing fruit {id}");
            }
        })
        .map_err(|e| {
            error!("error deleting fruit {id}: {e:?}");
        })
    }

    pub async fn clear_fruits(&self) -> Result<()> {
        sqlx::query("DELETE FROM fruits")
            .execute(&self.0)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("error clearing fruits: {e:?}");
            })
    }

    #[cfg(test)]
    pub async fn all_fruits(&self) -> Vec<Fruit> {
        sqlx::query_as::<_, Fruit>("SELECT id, name, color, ready_to_eat, owner FROM fruits")
            .fetch_all(&self.0)
            .await
            .unwrap()
    }
}

#[cfg(test)]
pub mod test {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::Backend;

    pub async fn create_backend() -> Backend {
        // a single connection, so every query sees the same in-memory db
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(":memory:")
            .await
            .unwrap();

        sqlx::migrate!("./migrations").run(&db).await.unwrap();

        Backend(db)
    }
}
