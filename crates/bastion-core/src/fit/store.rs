use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{StravaId, UserId},
    errors::Error,
    fit::{
        auth::AuthRecord,
        user::User,
        workout::{WeeklyLogs, WorkoutLog},
    },
    Result,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no user with id {id}")))
    }

    /// User linked to a Strava athlete; `NotConnected` when nobody is.
    async fn get_user_by_strava_id(&self, strava_id: &StravaId) -> Result<User>;

    async fn save_user(&self, user: &User) -> Result<()>;

    /// Apply `f` to the stored user and save it as one atomic step.
    /// `NotFound` for an unknown id; nothing is saved when `f` fails.
    async fn update_user(
        &self,
        id: UserId,
        f: &mut (dyn for<'u> FnMut(&'u mut User) -> Result<()> + Send),
    ) -> Result<User>;

    async fn all_users(&self) -> Result<Vec<User>>;
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
    /// Record for `id` whose password matches; `Unauthorized` otherwise.
    async fn get_authorized(&self, id: UserId, password: &str) -> Result<AuthRecord>;

    /// Existing record, or a fresh one together with its plain password.
    async fn get_or_create(&self, id: UserId) -> Result<(AuthRecord, Option<String>)>;

    /// Rotate the password of an existing record.
    async fn reset_password(&self, id: UserId) -> Result<String>;

    async fn find_by_strava_id(&self, strava_id: &StravaId) -> Result<Option<AuthRecord>>;

    async fn save_auth(&self, record: &AuthRecord) -> Result<()>;
}

#[async_trait]
pub trait WorkoutLogRepository: Send + Sync {
    async fn insert_workout(&self, log: &WorkoutLog) -> Result<()>;

    async fn logs_for_user(&self, id: UserId) -> Result<Vec<WorkoutLog>>;

    async fn current_logs_for_user(&self, id: UserId) -> Result<WeeklyLogs> {
        Ok(WeeklyLogs::from_logs(self.logs_for_user(id).await?, Utc::now()))
    }
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    auth: HashMap<UserId, AuthRecord>,
    workouts: Vec<WorkoutLog>,
    revision: u64,
}

#[derive(Default, Serialize, Deserialize)]
struct StoreFileData {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    auth: Vec<AuthRecord>,
    #[serde(default)]
    workouts: Vec<WorkoutLog>,
}

struct Snapshot {
    revision: u64,
    data: StoreFileData,
}

/// In-process store behind all three repositories.
///
/// With a path, the whole state is written as JSON after every mutation and
/// read back on [`MemoryStore::open`]. Each write rewrites the full file, so
/// the snapshot suits small deployments only.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    path: Option<PathBuf>,
    /// Revision of the newest snapshot on disk.
    written: tokio::sync::Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut state = State::default();
        if let Some(data) = load_store_file(&path)? {
            state.users = data.users.into_iter().map(|u| (u.id, u)).collect();
            state.auth = data.auth.into_iter().map(|a| (a.discord_id, a)).collect();
            state.workouts = data.workouts;
            tracing::info!(
                path = %path.display(),
                users = state.users.len(),
                workouts = state.workouts.len(),
                "loaded store"
            );
        }
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
            written: tokio::sync::Mutex::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy the state for writing. Called with the state lock held, right
    /// after a mutation.
    fn snapshot(&self, state: &mut State) -> Option<Snapshot> {
        self.path.as_ref()?;
        state.revision += 1;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        let mut auth: Vec<AuthRecord> = state.auth.values().cloned().collect();
        auth.sort_by_key(|a| a.discord_id);
        Some(Snapshot {
            revision: state.revision,
            data: StoreFileData {
                users,
                auth,
                workouts: state.workouts.clone(),
            },
        })
    }

    /// Write `snapshot` off the async runtime unless a newer one already
    /// landed.
    async fn persist(&self, snapshot: Option<Snapshot>) -> Result<()> {
        let (Some(path), Some(snapshot)) = (&self.path, snapshot) else {
            return Ok(());
        };
        let mut written = self.written.lock().await;
        if snapshot.revision <= *written {
            return Ok(());
        }
        let path = path.clone();
        tokio::task::spawn_blocking(move || save_store_file(&path, &snapshot.data))
            .await
            .map_err(|e| Error::External(format!("store writer failed: {e}")))??;
        *written = snapshot.revision;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn get_user_by_strava_id(&self, strava_id: &StravaId) -> Result<User> {
        let state = self.lock();
        let discord_id = state
            .auth
            .values()
            .find(|a| a.strava_id.as_ref() == Some(strava_id))
            .map(|a| a.discord_id)
            .ok_or_else(|| {
                Error::NotConnected(format!("no member linked to strava athlete {strava_id}"))
            })?;
        state
            .users
            .get(&discord_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no user with id {discord_id}")))
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            state.users.insert(user.id, user.clone());
            self.snapshot(&mut state)
        };
        self.persist(snapshot).await
    }

    async fn update_user(
        &self,
        id: UserId,
        f: &mut (dyn for<'u> FnMut(&'u mut User) -> Result<()> + Send),
    ) -> Result<User> {
        let (user, snapshot) = {
            let mut state = self.lock();
            let mut user = state
                .users
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("no user with id {id}")))?;
            f(&mut user)?;
            state.users.insert(id, user.clone());
            (user, self.snapshot(&mut state))
        };
        self.persist(snapshot).await?;
        Ok(user)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        Ok(self.lock().users.values().cloned().collect())
    }
}

#[async_trait]
impl AuthRepository for MemoryStore {
    async fn get_authorized(&self, id: UserId, password: &str) -> Result<AuthRecord> {
        match self.lock().auth.get(&id) {
            Some(record) if record.verify(password) => Ok(record.clone()),
            _ => Err(Error::Unauthorized("invalid credentials".to_string())),
        }
    }

    async fn get_or_create(&self, id: UserId) -> Result<(AuthRecord, Option<String>)> {
        let (record, password, snapshot) = {
            let mut state = self.lock();
            if let Some(record) = state.auth.get(&id) {
                return Ok((record.clone(), None));
            }
            let (record, password) = AuthRecord::create(id);
            state.auth.insert(id, record.clone());
            (record, password, self.snapshot(&mut state))
        };
        self.persist(snapshot).await?;
        Ok((record, Some(password)))
    }

    async fn reset_password(&self, id: UserId) -> Result<String> {
        let (password, snapshot) = {
            let mut state = self.lock();
            let record = state
                .auth
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("no auth record for {id}")))?;
            let password = record.reset_password();
            (password, self.snapshot(&mut state))
        };
        self.persist(snapshot).await?;
        Ok(password)
    }

    async fn find_by_strava_id(&self, strava_id: &StravaId) -> Result<Option<AuthRecord>> {
        Ok(self
            .lock()
            .auth
            .values()
            .find(|a| a.strava_id.as_ref() == Some(strava_id))
            .cloned())
    }

    async fn save_auth(&self, record: &AuthRecord) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            state.auth.insert(record.discord_id, record.clone());
            self.snapshot(&mut state)
        };
        self.persist(snapshot).await
    }
}

#[async_trait]
impl WorkoutLogRepository for MemoryStore {
    async fn insert_workout(&self, log: &WorkoutLog) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            state.workouts.push(log.clone());
            self.snapshot(&mut state)
        };
        self.persist(snapshot).await
    }

    async fn logs_for_user(&self, id: UserId) -> Result<Vec<WorkoutLog>> {
        Ok(self
            .lock()
            .workouts
            .iter()
            .filter(|l| l.user_id == id)
            .cloned()
            .collect())
    }
}

fn load_store_file(path: &Path) -> Result<Option<StoreFileData>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    let data: StoreFileData = serde_json::from_str(&txt)?;
    Ok(Some(data))
}

fn save_store_file(path: &Path, data: &StoreFileData) -> Result<()> {
    let txt = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, txt)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::fit::activity::ActivityKind;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("bastion-store-{name}-{nanos}.json"))
    }

    #[tokio::test]
    async fn get_or_create_issues_password_once() {
        let store = MemoryStore::new();
        let (record, password) = store.get_or_create(UserId(1)).await.unwrap();
        let password = password.unwrap();
        assert!(!record.is_connected());

        let (_, again) = store.get_or_create(UserId(1)).await.unwrap();
        assert!(again.is_none());

        assert!(store.get_authorized(UserId(1), &password).await.is_ok());
        assert!(matches!(
            store.get_authorized(UserId(1), "wrong").await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            store.get_authorized(UserId(2), &password).await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn strava_lookup_requires_link() {
        let store = MemoryStore::new();
        let strava = StravaId::from("555");
        assert!(matches!(
            store.get_user_by_strava_id(&strava).await,
            Err(Error::NotConnected(_))
        ));

        let (mut record, _) = store.get_or_create(UserId(1)).await.unwrap();
        record.link_to_strava(strava.clone(), "r1");
        store.save_auth(&record).await.unwrap();
        store.save_user(&User::new(UserId(1))).await.unwrap();

        assert_eq!(store.get_user_by_strava_id(&strava).await.unwrap().id, UserId(1));
        assert_eq!(
            store.find_by_strava_id(&strava).await.unwrap().unwrap().discord_id,
            UserId(1)
        );
    }

    #[tokio::test]
    async fn get_user_of_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.find_user(UserId(9)).await.unwrap().is_none());
        assert!(matches!(
            store.get_user(UserId(9)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.save_user(&User::new(UserId(4))).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update_user(UserId(4), &mut |user: &mut User| {
                            user.total_exp += 10.0;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.get_user(UserId(4)).await.unwrap().total_exp, 80.0);
    }

    #[tokio::test]
    async fn failed_update_leaves_user_untouched() {
        let store = MemoryStore::new();
        store.save_user(&User::new(UserId(4))).await.unwrap();

        let err = store
            .update_user(UserId(4), &mut |user: &mut User| {
                user.total_exp = 999.0;
                Err(Error::InvalidInput("nope".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.get_user(UserId(4)).await.unwrap().total_exp, 0.0);

        assert!(matches!(
            store.update_user(UserId(8), &mut |_: &mut User| Ok(())).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let path = temp_path("reopen");
        {
            let store = MemoryStore::open(path.clone()).unwrap();
            let mut user = User::new(UserId(3));
            user.fit_score = 12.5;
            store.save_user(&user).await.unwrap();
            store
                .insert_workout(&WorkoutLog {
                    user_id: UserId(3),
                    activity_id: "a".to_string(),
                    kind: ActivityKind::Other("Rowing".to_string()),
                    distance_m: 100.0,
                    moving_time_s: 60,
                    exp: 1.0,
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                })
                .await
                .unwrap();
        }

        let store = MemoryStore::open(path.clone()).unwrap();
        assert_eq!(store.get_user(UserId(3)).await.unwrap().fit_score, 12.5);
        store
            .update_user(UserId(3), &mut |user: &mut User| {
                user.level = 4;
                Ok(())
            })
            .await
            .unwrap();
        drop(store);

        let store = MemoryStore::open(path.clone()).unwrap();
        assert_eq!(store.get_user(UserId(3)).await.unwrap().level, 4);
        let logs = store.logs_for_user(UserId(3)).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, ActivityKind::Other("Rowing".to_string()));

        let _ = std::fs::remove_file(&path);
    }
}
