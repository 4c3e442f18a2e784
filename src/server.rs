//! Server Context
//!
//! One [`Server`] owns every database, the command table and the replay
//! log. It is built once in `main`, wrapped in an `Arc<Mutex<_>>` and shared
//! by the connection tasks and the expiry sweeper.
//!
//! ```text
//!  connection task ──┐
//!  connection task ──┼──> Mutex<Server> ──> execute() ──> Database[client.db]
//!  expiry sweeper  ──┘                  └─> cron()    ──> every Database
//! ```
//!
//! The lock is taken for one command (or one cron pass) at a time and never
//! held across an `.await`.

use crate::commands::{dispatch, CommandError, CommandKind, CommandTable, Context};
use crate::persistence::ReplayLog;
use crate::protocol::EncodeData;
use crate::storage::db::{now_ms, Database};
use crate::storage::object::Object;
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, trace};

/// Rehash steps given to each database per cron pass.
const CRON_REHASH_STEPS: usize = 100;

/// The server context shared between tasks.
pub type SharedServer = Arc<Mutex<Server>>;

/// Locks the shared context. A poisoned lock is recovered; a panicking
/// command leaves the keyspace in a consistent state between commands.
pub fn lock(server: &SharedServer) -> MutexGuard<'_, Server> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-client session state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientState {
    /// Selected database index
    pub db: usize,
    /// Commands from this client are not appended to the replay log
    pub replaying: bool,
}

impl ClientState {
    /// The client used to re-execute a replay log.
    pub fn replay() -> Self {
        Self {
            db: 0,
            replaying: true,
        }
    }
}

/// What a cron pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CronReport {
    /// Keys left across all databases
    pub keys: usize,
    /// Keys with a deadline
    pub volatile: usize,
    /// Keys removed by active expiry
    pub expired: usize,
    /// Databases whose dicts are still rehashing
    pub rehashing: usize,
}

#[derive(Debug)]
pub struct Server {
    databases: Vec<Database>,
    commands: CommandTable,
    replay_log: Option<ReplayLog>,
    /// Keyspace changes since startup
    dirty: u64,
    commands_processed: u64,
}

impl Server {
    /// Creates a server with `db_count` empty databases (at least one).
    pub fn new(db_count: usize) -> Self {
        Self {
            databases: (0..db_count.max(1)).map(Database::new).collect(),
            commands: CommandTable::new(),
            replay_log: None,
            dirty: 0,
            commands_processed: 0,
        }
    }

    pub fn into_shared(self) -> SharedServer {
        Arc::new(Mutex::new(self))
    }

    pub fn db_count(&self) -> usize {
        self.databases.len()
    }

    pub fn db_mut(&mut self, index: usize) -> Option<&mut Database> {
        self.databases.get_mut(index)
    }

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn commands_processed(&self) -> u64 {
        self.commands_processed
    }

    /// Total keys across databases (expired-but-unswept keys included).
    pub fn key_count(&self) -> usize {
        self.databases.iter().map(Database::len).sum()
    }

    /// Starts appending dirty commands to `log`.
    pub fn attach_replay_log(&mut self, log: ReplayLog) {
        debug!(path = %log.path().display(), "replay log attached");
        self.replay_log = Some(log);
    }

    pub fn has_replay_log(&self) -> bool {
        self.replay_log.is_some()
    }

    /// Executes one command frame for `client` and returns the reply.
    ///
    /// Errors become RESP error replies; nothing here fails the connection.
    pub fn execute(&mut self, client: &mut ClientState, args: &[Bytes]) -> EncodeData {
        match self.try_execute(client, args) {
            Ok(reply) => reply,
            Err(err) => err.into(),
        }
    }

    fn try_execute(
        &mut self,
        client: &mut ClientState,
        args: &[Bytes],
    ) -> Result<EncodeData, CommandError> {
        let name = args.first().ok_or(CommandError::EmptyCommand)?;
        let spec = self.commands.lookup(name).ok_or_else(|| {
            CommandError::UnknownCommand(String::from_utf8_lossy(name).into_owned())
        })?;
        if !spec.accepts(args.len()) {
            return Err(CommandError::WrongArity(spec.name));
        }

        let db_index = client.db;
        let dirty_before = self.dirty;
        let db_count = self.databases.len();
        let command_count = self.commands.len();
        let db = self
            .databases
            .get_mut(db_index)
            .ok_or(CommandError::DbIndexOutOfRange)?;

        let mut ctx = Context::new(db, &mut client.db, db_count, command_count, &mut self.dirty);
        let reply = dispatch(spec, &mut ctx, args)?;
        self.commands_processed += 1;

        if self.dirty != dirty_before && !client.replaying {
            match spec.kind {
                CommandKind::Expire | CommandKind::PExpire => {
                    let logged = self.absolute_expire(db_index, &args[1]);
                    self.append_to_log(db_index, &logged);
                }
                _ => self.append_to_log(db_index, args),
            }
        }
        Ok(reply)
    }

    /// Relative expiries are logged as the deadline they produced, or as a
    /// DEL when they removed the key.
    fn absolute_expire(&mut self, db_index: usize, key: &Bytes) -> Vec<Bytes> {
        let deadline = self
            .databases
            .get_mut(db_index)
            .and_then(|db| db.deadline(&Object::from(key)));
        match deadline {
            Some(at) => vec![
                Bytes::from_static(b"PEXPIREAT"),
                key.clone(),
                Bytes::from(at.to_string()),
            ],
            None => vec![Bytes::from_static(b"DEL"), key.clone()],
        }
    }

    fn append_to_log(&mut self, db: usize, args: &[Bytes]) {
        let Some(log) = self.replay_log.as_mut() else {
            return;
        };
        if let Err(e) = log.append(db, args) {
            error!(error = %e, db, "failed to append to replay log");
        }
    }

    /// Periodic maintenance: active expiry and incremental rehashing on
    /// every database.
    pub fn cron(&mut self) -> CronReport {
        let now = now_ms();
        let mut report = CronReport::default();

        for db in &mut self.databases {
            let expired = db.active_expire(now);
            if db.rehash(CRON_REHASH_STEPS) {
                report.rehashing += 1;
            }

            report.expired += expired;
            report.keys += db.len();
            report.volatile += db.volatile_len();

            if !db.is_empty() || expired > 0 {
                trace!(
                    db = db.id(),
                    keys = db.len(),
                    volatile = db.volatile_len(),
                    expired,
                    "cron pass"
                );
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object::Object;

    fn cmd(line: &str) -> Vec<Bytes> {
        line.split_whitespace()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        let mut server = Server::new(1);
        let mut client = ClientState::default();
        assert!(server.execute(&mut client, &[]).is_error());
    }

    #[test]
    fn test_dirty_counts_writes_only() {
        let mut server = Server::new(1);
        let mut client = ClientState::default();

        server.execute(&mut client, &cmd("GET k"));
        assert_eq!(server.dirty(), 0);

        server.execute(&mut client, &cmd("SET k v"));
        server.execute(&mut client, &cmd("RPUSH l a b"));
        assert_eq!(server.dirty(), 3);

        server.execute(&mut client, &cmd("DEL nope"));
        assert_eq!(server.dirty(), 3);
        assert_eq!(server.commands_processed(), 4);
    }

    #[test]
    fn test_cron_expires_and_reports() {
        let mut server = Server::new(2);
        let mut client = ClientState::default();
        server.execute(&mut client, &cmd("SET a 1"));
        server.execute(&mut client, &cmd("SET b 2"));

        let db = server.db_mut(0).unwrap();
        assert!(db.set_expire(&Object::from("a"), now_ms() - 1));

        let report = server.cron();
        assert_eq!(report.expired, 1);
        assert_eq!(report.keys, 1);
        assert_eq!(report.volatile, 0);
        assert_eq!(server.key_count(), 1);
    }

    #[test]
    fn test_lock_helper() {
        let shared = Server::new(1).into_shared();
        let mut client = ClientState::default();
        let reply = lock(&shared).execute(&mut client, &cmd("PING"));
        assert_eq!(reply, EncodeData::pong());
    }

    #[test]
    fn test_at_least_one_database() {
        assert_eq!(Server::new(0).db_count(), 1);
    }
}
