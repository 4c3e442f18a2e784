//! Command Replay Log
//!
//! Every command that changes the keyspace is appended to the log as a RESP
//! command frame. At startup the file is streamed back through a
//! [`Decoder`] and each frame is executed again by a replay client.
//!
//! ```text
//! *2\r\n$6\r\nSELECT\r\n$1\r\n0\r\n        <- written whenever the db changes
//! *3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n
//! ```
//!
//! A crash can leave a half-written frame at the end of the file. Loading
//! stops at that frame with a warning; everything before it is kept.

use crate::protocol::{CodecError, Decoder, EncodeData, Encoder};
use crate::server::{ClientState, Server};
use bytes::Bytes;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Largest single frame accepted while loading (64 MiB).
const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("replay log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("replay log is corrupt after {commands} commands: {source}")]
    Corrupt {
        commands: usize,
        #[source]
        source: CodecError,
    },

    #[error("replay log write failed: {0}")]
    Write(#[from] CodecError),
}

/// Append-only writer for dirty commands.
#[derive(Debug)]
pub struct ReplayLog {
    path: PathBuf,
    encoder: Encoder<File>,
    /// Database the last appended command ran against
    selected: Option<usize>,
    appended: u64,
}

impl ReplayLog {
    /// Opens (or creates) the log at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "replay log opened");

        Ok(Self {
            path,
            encoder: Encoder::new(file),
            selected: None,
            appended: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Commands appended since the log was opened.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Appends one command that ran against database `db`.
    pub fn append(&mut self, db: usize, args: &[Bytes]) -> Result<(), PersistenceError> {
        if self.selected != Some(db) {
            let select = EncodeData::command([
                Bytes::from_static(b"SELECT"),
                Bytes::from(db.to_string()),
            ]);
            self.encoder.encode(&select, false)?;
            self.selected = Some(db);
        }

        self.encoder
            .encode(&EncodeData::command(args.iter().cloned()), true)?;
        self.appended += 1;
        Ok(())
    }

    /// Re-executes every command in the log at `path` against `server`.
    ///
    /// # Returns
    ///
    /// The number of commands executed. A missing file counts as an empty
    /// log.
    pub fn load(path: impl AsRef<Path>, server: &mut Server) -> Result<usize, PersistenceError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no replay log to load");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut decoder = Decoder::with_capacity(file, MAX_FRAME_SIZE);
        let mut client = ClientState::replay();
        let mut commands = 0;

        loop {
            match decoder.decode_multi_bulks() {
                Ok(Some(args)) if args.is_empty() => continue,
                Ok(Some(args)) => {
                    let reply = server.execute(&mut client, &args);
                    if reply.is_error() {
                        warn!(
                            command = %String::from_utf8_lossy(&args[0]),
                            reply = %reply,
                            "replayed command failed"
                        );
                    }
                    commands += 1;
                }
                Ok(None) => break,
                Err(CodecError::UnexpectedEof) => {
                    warn!(
                        path = %path.display(),
                        commands,
                        "replay log ends with a truncated command; ignoring it"
                    );
                    break;
                }
                Err(source) => return Err(PersistenceError::Corrupt { commands, source }),
            }
        }

        info!(path = %path.display(), commands, "replay log loaded");
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn cmd(line: &str) -> Vec<Bytes> {
        line.split_whitespace()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempdir().unwrap();
        let mut server = Server::new(1);
        let loaded = ReplayLog::load(dir.path().join("absent.log"), &mut server).unwrap();
        assert_eq!(loaded, 0);
    }

    #[test]
    fn test_dirty_commands_survive_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.log");

        {
            let mut server = Server::new(4);
            server.attach_replay_log(ReplayLog::open(&path).unwrap());
            let mut client = ClientState::default();

            for line in [
                "SET k1 v1",
                "GET k1",
                "RPUSH list a b",
                "SELECT 2",
                "ZADD z 1 one 2 two",
                "SET other x",
                "DEL other",
            ] {
                server.execute(&mut client, &cmd(line));
            }
        }

        let mut server = Server::new(4);
        // SET, RPUSH, SELECT 0, SELECT 2, ZADD, SET, DEL
        assert_eq!(ReplayLog::load(&path, &mut server).unwrap(), 7);

        let mut client = ClientState::default();
        assert_eq!(
            server.execute(&mut client, &cmd("GET k1")),
            EncodeData::bulk("v1")
        );
        assert_eq!(
            server.execute(&mut client, &cmd("LLEN list")),
            EncodeData::integer(2)
        );
        assert_eq!(
            server.execute(&mut client, &cmd("ZSCORE z two")),
            EncodeData::null()
        );

        client.db = 2;
        assert_eq!(
            server.execute(&mut client, &cmd("ZSCORE z two")),
            EncodeData::bulk("2")
        );
        assert_eq!(
            server.execute(&mut client, &cmd("EXISTS other")),
            EncodeData::integer(0)
        );
    }

    #[test]
    fn test_expiry_deadlines_survive_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.log");

        {
            let mut server = Server::new(1);
            server.attach_replay_log(ReplayLog::open(&path).unwrap());
            let mut client = ClientState::default();
            for line in ["SET short v", "PEXPIRE short 100", "SET long v", "EXPIRE long 100"] {
                server.execute(&mut client, &cmd(line));
            }
        }

        let log = std::fs::read(&path).unwrap();
        let log = String::from_utf8_lossy(&log);
        assert!(log.contains("PEXPIREAT"));
        assert!(!log.contains("$7\r\nPEXPIRE\r\n"));
        assert!(!log.contains("$6\r\nEXPIRE\r\n"));

        std::thread::sleep(std::time::Duration::from_millis(300));

        let mut server = Server::new(1);
        ReplayLog::load(&path, &mut server).unwrap();
        let mut client = ClientState::default();

        // the deadline passed while the server was down
        assert_eq!(
            server.execute(&mut client, &cmd("EXISTS short")),
            EncodeData::integer(0)
        );
        let EncodeData::Integer(ms) = server.execute(&mut client, &cmd("PTTL long")) else {
            panic!("PTTL should reply with an integer");
        };
        assert!(ms > 0 && ms <= 99_700, "ttl restarted: {ms}");
    }

    #[test]
    fn test_expire_that_deletes_is_logged_as_del() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.log");

        {
            let mut server = Server::new(1);
            server.attach_replay_log(ReplayLog::open(&path).unwrap());
            let mut client = ClientState::default();
            server.execute(&mut client, &cmd("SET k v"));
            server.execute(&mut client, &cmd("EXPIRE k -1"));
        }

        let log = std::fs::read(&path).unwrap();
        assert!(String::from_utf8_lossy(&log).contains("$3\r\nDEL\r\n$1\r\nk\r\n"));

        let mut server = Server::new(1);
        // SELECT 0, SET, DEL
        assert_eq!(ReplayLog::load(&path, &mut server).unwrap(), 3);
    }

    #[test]
    fn test_replay_does_not_reappend() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.log");

        {
            let mut log = ReplayLog::open(&path).unwrap();
            log.append(0, &cmd("SET a 1")).unwrap();
            assert_eq!(log.appended(), 1);
        }
        let size_before = std::fs::metadata(&path).unwrap().len();

        let mut server = Server::new(1);
        server.attach_replay_log(ReplayLog::open(&path).unwrap());
        ReplayLog::load(&path, &mut server).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), size_before);
    }

    #[test]
    fn test_truncated_tail_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.log");

        {
            let mut log = ReplayLog::open(&path).unwrap();
            log.append(0, &cmd("SET a 1")).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nb").unwrap();
        drop(file);

        let mut server = Server::new(1);
        // SELECT 0 and SET a 1
        assert_eq!(ReplayLog::load(&path, &mut server).unwrap(), 2);

        let mut client = ClientState::default();
        assert_eq!(
            server.execute(&mut client, &cmd("EXISTS a b")),
            EncodeData::integer(1)
        );
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.log");
        std::fs::write(&path, b"+OK\r\n").unwrap();

        let mut server = Server::new(1);
        assert!(matches!(
            ReplayLog::load(&path, &mut server),
            Err(PersistenceError::Corrupt { commands: 0, .. })
        ));
    }
}
