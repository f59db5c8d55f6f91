use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    /// Raw driver/storage message; surfaced as-is by the API error path.
    #[error("{0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

/// Persistence seam for the ad collection. Counter invariants (`likes` ==
/// membership rows in `ad_likes`, same for views) are the implementation's
/// responsibility: membership and counter must change together.
#[async_trait]
pub trait AdRepo: Send + Sync {
    /// All ads, newest first, flagged with whether `user_id` liked/viewed each.
    /// An empty user id simply matches no membership rows.
    async fn list_ads(&self, user_id: &str) -> RepoResult<Vec<AdListItem>>;
    async fn create_ad(&self, new: NewAd) -> RepoResult<Ad>;
    async fn get_ad(&self, id: Id) -> RepoResult<Ad>;
    /// Like toggle: inserts the membership row and increments `likes`, or
    /// removes it and decrements. Returns the ad as of after the toggle.
    async fn toggle_like(&self, ad_id: Id, user_id: &str) -> RepoResult<Ad>;
    /// Write-once view: first call per (ad, user) increments `views`,
    /// repeat calls change nothing.
    async fn record_view(&self, ad_id: Id, user_id: &str) -> RepoResult<Ad>;
    /// Unconditional delete; succeeds whether or not the row existed.
    async fn delete_ad(&self, id: Id) -> RepoResult<()>;
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        ads: HashMap<Id, Ad>,
        likes: HashSet<(Id, String)>,
        views: HashSet<(Id, String)>,
        next_id: Id,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("ADWALL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        fn snapshot_path() -> PathBuf {
            if std::env::var("ADWALL_DATA_DIR").is_ok() {
                let mut p = Self::data_dir();
                p.push("state.json");
                p
            } else {
                PathBuf::from(SNAPSHOT_PATH)
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!(
                            "[inmem] Failed to parse snapshot '{}': {e}. Starting empty.",
                            path.display()
                        );
                        State::default()
                    }
                },
                Err(_) => State::default(),
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            if let Ok(s) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, s) {
                    eprintln!("[inmem] Failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            }
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl AdRepo for InMemRepo {
        async fn list_ads(&self, user_id: &str) -> RepoResult<Vec<AdListItem>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<AdListItem> = s
                .ads
                .values()
                .map(|ad| AdListItem {
                    id: ad.id,
                    kind: ad.kind,
                    url: ad.url.clone(),
                    title: ad.title.clone(),
                    description: ad.description.clone(),
                    created_at: ad.created_at,
                    views: ad.views,
                    likes: ad.likes,
                    user_liked: s.likes.contains(&(ad.id, user_id.to_string())),
                    user_viewed: s.views.contains(&(ad.id, user_id.to_string())),
                })
                .collect();
            // newest first; id breaks ties when two ads share a timestamp
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn create_ad(&self, new: NewAd) -> RepoResult<Ad> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let ad = Ad {
                id,
                kind: new.kind,
                url: new.url,
                title: new.title,
                description: new.description,
                created_at: Utc::now(),
                views: 0,
                likes: 0,
            };
            s.ads.insert(id, ad.clone());
            drop(s); // release lock before persisting
            self.persist();
            Ok(ad)
        }

        async fn get_ad(&self, id: Id) -> RepoResult<Ad> {
            let s = self.state.read().unwrap();
            s.ads.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn toggle_like(&self, ad_id: Id, user_id: &str) -> RepoResult<Ad> {
            let mut s = self.state.write().unwrap();
            if !s.ads.contains_key(&ad_id) {
                return Err(RepoError::NotFound);
            }
            let key = (ad_id, user_id.to_string());
            let delta = if s.likes.remove(&key) {
                -1
            } else {
                s.likes.insert(key);
                1
            };
            let ad = s.ads.get_mut(&ad_id).expect("checked above");
            ad.likes += delta;
            let updated = ad.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn record_view(&self, ad_id: Id, user_id: &str) -> RepoResult<Ad> {
            let mut s = self.state.write().unwrap();
            if !s.ads.contains_key(&ad_id) {
                return Err(RepoError::NotFound);
            }
            let key = (ad_id, user_id.to_string());
            if s.views.insert(key) {
                s.ads.get_mut(&ad_id).expect("checked above").views += 1;
            }
            let updated = s.ads[&ad_id].clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_ad(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            s.ads.remove(&id);
            // membership rows go with the ad, mirroring the schema cascade
            s.likes.retain(|(ad_id, _)| *ad_id != id);
            s.views.retain(|(ad_id, _)| *ad_id != id);
            drop(s);
            self.persist();
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    const AD_COLUMNS: &str = "id, type, url, title, description, created_at, views, likes";

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    fn internal(e: sqlx::Error) -> RepoError {
        RepoError::Internal(e.to_string())
    }

    impl PgRepo {
        async fn fetch_ad(&self, id: Id) -> RepoResult<Ad> {
            sqlx::query_as::<_, Ad>(&format!("SELECT {AD_COLUMNS} FROM ads WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?
                .ok_or(RepoError::NotFound)
        }

        /// Existence check inside a transaction; NotFound before any mutation.
        async fn ensure_ad_exists(
            tx: &mut sqlx::Transaction<'_, Postgres>,
            ad_id: Id,
        ) -> RepoResult<()> {
            let found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM ads WHERE id = $1")
                .bind(ad_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(internal)?;
            match found {
                Some(_) => Ok(()),
                None => Err(RepoError::NotFound),
            }
        }
    }

    #[async_trait]
    impl AdRepo for PgRepo {
        async fn list_ads(&self, user_id: &str) -> RepoResult<Vec<AdListItem>> {
            let recs = sqlx::query_as::<_, AdListItem>(
                r#"
                SELECT a.id, a.type, a.url, a.title, a.description,
                       a.created_at, a.views, a.likes,
                       EXISTS(SELECT 1 FROM ad_likes l WHERE l.ad_id = a.id AND l.user_id = $1) AS user_liked,
                       EXISTS(SELECT 1 FROM ad_views v WHERE v.ad_id = a.id AND v.user_id = $1) AS user_viewed
                FROM ads a
                ORDER BY a.created_at DESC, a.id DESC
            "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }

        async fn create_ad(&self, new: NewAd) -> RepoResult<Ad> {
            let rec = sqlx::query_as::<_, Ad>(&format!(
                "INSERT INTO ads (type, url, title, description) VALUES ($1, $2, $3, $4) \
                 RETURNING {AD_COLUMNS}"
            ))
            .bind(new.kind)
            .bind(&new.url)
            .bind(&new.title)
            .bind(&new.description)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
            Ok(rec)
        }

        async fn get_ad(&self, id: Id) -> RepoResult<Ad> {
            self.fetch_ad(id).await
        }

        async fn toggle_like(&self, ad_id: Id, user_id: &str) -> RepoResult<Ad> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            Self::ensure_ad_exists(&mut tx, ad_id).await?;
            let liked = sqlx::query_scalar::<_, i32>(
                "SELECT 1 FROM ad_likes WHERE ad_id = $1 AND user_id = $2",
            )
            .bind(ad_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(internal)?;
            if liked.is_some() {
                sqlx::query("DELETE FROM ad_likes WHERE ad_id = $1 AND user_id = $2")
                    .bind(ad_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
                sqlx::query("UPDATE ads SET likes = likes - 1 WHERE id = $1")
                    .bind(ad_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
            } else {
                sqlx::query("INSERT INTO ad_likes (ad_id, user_id) VALUES ($1, $2)")
                    .bind(ad_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
                sqlx::query("UPDATE ads SET likes = likes + 1 WHERE id = $1")
                    .bind(ad_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
            }
            tx.commit().await.map_err(internal)?;
            self.fetch_ad(ad_id).await
        }

        async fn record_view(&self, ad_id: Id, user_id: &str) -> RepoResult<Ad> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            Self::ensure_ad_exists(&mut tx, ad_id).await?;
            let viewed = sqlx::query_scalar::<_, i32>(
                "SELECT 1 FROM ad_views WHERE ad_id = $1 AND user_id = $2",
            )
            .bind(ad_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(internal)?;
            if viewed.is_none() {
                sqlx::query("INSERT INTO ad_views (ad_id, user_id) VALUES ($1, $2)")
                    .bind(ad_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
                sqlx::query("UPDATE ads SET views = views + 1 WHERE id = $1")
                    .bind(ad_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
            }
            tx.commit().await.map_err(internal)?;
            self.fetch_ad(ad_id).await
        }

        async fn delete_ad(&self, id: Id) -> RepoResult<()> {
            // no existence check: deleting an absent row is still a success;
            // ad_likes / ad_views rows follow via ON DELETE CASCADE
            sqlx::query("DELETE FROM ads WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(internal)?;
            Ok(())
        }
    }
}
