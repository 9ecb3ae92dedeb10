//! In-memory media host for tests.
//!
//! [`FakeHost`] keeps a tiny filesystem (directories and files) and
//! interprets exactly the command lines built in `shell`, recording every
//! one of them. [`FakeConnector`] counts handshakes. Together they let tests
//! assert on network activity directly: how many handshakes, how many
//! commands, which ones.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::config::CoreConfig;
use super::context::RemoteStorage;
use super::directory::{HostRecord, StaticHostDirectory};
use super::error::RemoteError;
use super::session::Session;
use super::transport::{Connector, InputStream, Transport};
use super::types::{CommandOutput, ServerEndpoint};

#[derive(Default)]
struct Filesystem {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl Filesystem {
    fn add_dir(&mut self, path: &str) {
        let mut current = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current.push('/');
            current.push_str(component);
            self.dirs.insert(current.clone());
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path.trim_end_matches('/'))
    }
}

pub(crate) struct FakeHost {
    fs: Mutex<Filesystem>,
    commands: Mutex<Vec<String>>,
    scripted: Mutex<Vec<(String, CommandOutput)>>,
    transports: Mutex<Vec<Arc<FakeTransport>>>,
    exec_delay: Mutex<Duration>,
    ignore_mkdir: AtomicBool,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fs: Mutex::new(Filesystem::default()),
            commands: Mutex::new(Vec::new()),
            scripted: Mutex::new(Vec::new()),
            transports: Mutex::new(Vec::new()),
            exec_delay: Mutex::new(Duration::ZERO),
            ignore_mkdir: AtomicBool::new(false),
        })
    }

    pub fn add_dir(&self, path: &str) {
        self.fs.lock().unwrap().add_dir(path);
    }

    pub fn add_file(&self, path: &str, contents: &[u8]) {
        self.fs
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), contents.to_vec());
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.fs.lock().unwrap().is_dir(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().unwrap().files.get(path).cloned()
    }

    /// Every command whose text starts with `prefix` exits with `exit_code`.
    pub fn fail_on(&self, prefix: &str, exit_code: i32, stderr: &str) {
        self.script(prefix, String::new(), stderr.to_string(), exit_code);
    }

    /// Every command whose text starts with `prefix` prints `stdout`.
    pub fn respond_to(&self, prefix: &str, stdout: &str) {
        self.script(prefix, stdout.to_string(), String::new(), 0);
    }

    fn script(&self, prefix: &str, stdout: String, stderr: String, exit_code: i32) {
        self.scripted.lock().unwrap().push((
            prefix.to_string(),
            CommandOutput {
                stdout,
                stderr,
                exit_code,
            },
        ));
    }

    /// `mkdir` reports success without creating anything.
    pub fn ignore_mkdir(&self) {
        self.ignore_mkdir.store(true, Ordering::SeqCst);
    }

    pub fn set_exec_delay(&self, delay: Duration) {
        *self.exec_delay.lock().unwrap() = delay;
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn closed_transports(&self) -> usize {
        self.transports
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_closed())
            .count()
    }

    /// Simulate the network dropping every connection to this host without
    /// any notice reaching the client.
    pub fn kill_transports(&self) {
        for transport in self.transports.lock().unwrap().iter() {
            transport.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Simulate the host closing every connection; the client is notified.
    pub fn disconnect_transports(&self) {
        for transport in self.transports.lock().unwrap().iter() {
            transport.disconnect();
        }
    }

    /// Like [`FakeHost::disconnect_transports`] for the `index`-th transport
    /// ever opened.
    pub fn disconnect_transport(&self, index: usize) {
        self.transports.lock().unwrap()[index].disconnect();
    }

    pub fn transport(self: &Arc<Self>) -> Arc<FakeTransport> {
        let transport = Arc::new(FakeTransport {
            host: self.clone(),
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            lost: CancellationToken::new(),
        });
        self.transports.lock().unwrap().push(transport.clone());
        transport
    }

    /// A session bound to this host, outside of any pool.
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(&endpoint("10.0.0.5", 22), self.transport())
    }

    fn interpret(&self, command: &str, input: Option<Vec<u8>>) -> CommandOutput {
        self.commands.lock().unwrap().push(command.to_string());

        if let Some((_, output)) = self
            .scripted
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
        {
            return output.clone();
        }

        let args = quoted_args(command);
        let first = args.first().cloned().unwrap_or_default();
        let mut fs = self.fs.lock().unwrap();

        if command == "true" {
            ok("")
        } else if command == "false" {
            exit(1, "")
        } else if let Some(text) = command.strip_prefix("echo ") {
            ok(&format!("{}\n", text))
        } else if command.starts_with("test -d ") {
            ok(if fs.is_dir(&first) { "1\n" } else { "0\n" })
        } else if command.starts_with("test -e ") {
            let exists = fs.is_dir(&first) || fs.files.contains_key(&first);
            ok(if exists { "1\n" } else { "0\n" })
        } else if command.starts_with("mkdir -p ") {
            if !self.ignore_mkdir.load(Ordering::SeqCst) {
                for path in &args {
                    fs.add_dir(path);
                }
            }
            ok("")
        } else if command.starts_with("chown ") || command.starts_with("chmod ") {
            ok("")
        } else if command.starts_with("if [ -d ") {
            if fs.is_dir(&first) {
                let prefix = format!("{}/", first.trim_end_matches('/'));
                let (count, size) = fs
                    .files
                    .iter()
                    .filter(|(path, _)| path.starts_with(&prefix))
                    .fold((0u64, 0u64), |(n, s), (_, data)| (n + 1, s + data.len() as u64));
                ok(&format!("1\n{}\n{}\n", count, size))
            } else {
                ok("0\n")
            }
        } else if command.starts_with("ls -ld ") {
            if let Some(data) = fs.files.get(&first) {
                ok(&format!(
                    "-rw-r--r-- 1 streaming streaming {} Oct 19 12:00 {}\n",
                    data.len(),
                    first
                ))
            } else if fs.is_dir(&first) {
                ok(&format!("drwxr-xr-x 2 streaming streaming 4096 Oct 19 12:00 {}\n", first))
            } else {
                exit(2, &format!("ls: cannot access '{}': No such file or directory", first))
            }
        } else if command.starts_with("cat > ") {
            let parent_exists = super::shell::parent_dir(&first)
                .map(|parent| fs.is_dir(parent))
                .unwrap_or(false);
            if !parent_exists {
                return exit(1, "cat: No such file or directory");
            }
            fs.files.insert(first, input.unwrap_or_default());
            ok("")
        } else if command.starts_with("rm -f ") {
            fs.files.remove(&first);
            ok("")
        } else {
            exit(127, "sh: command not found")
        }
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

fn exit(exit_code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code,
    }
}

/// Contents of every single-quoted argument, undoing `shell::quote`.
fn quoted_args(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current: Option<String> = None;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                let buf = current.get_or_insert_with(String::new);
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    buf.push(inner);
                }
            }
            '\\' if current.is_some() && chars.peek() == Some(&'\'') => {
                chars.next();
                if let Some(buf) = current.as_mut() {
                    buf.push('\'');
                }
            }
            _ => {
                if let Some(done) = current.take() {
                    args.push(done);
                }
            }
        }
    }
    if let Some(done) = current {
        args.push(done);
    }
    args
}

pub(crate) struct FakeTransport {
    host: Arc<FakeHost>,
    alive: AtomicBool,
    closed: AtomicBool,
    lost: CancellationToken,
}

impl FakeTransport {
    fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.lost.cancel();
    }

    async fn delay(&self) -> Result<(), RemoteError> {
        let delay = *self.host.exec_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.is_alive() {
            Ok(())
        } else {
            Err(RemoteError::SessionLost("connection reset by peer".to_string()))
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        self.delay().await?;
        Ok(self.host.interpret(command, None))
    }

    async fn exec_with_input(
        &self,
        command: &str,
        mut input: InputStream,
    ) -> Result<CommandOutput, RemoteError> {
        self.delay().await?;
        let mut data = Vec::new();
        input
            .read_to_end(&mut data)
            .await
            .map_err(|e| RemoteError::ChannelError(e.to_string()))?;
        Ok(self.host.interpret(command, Some(data)))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.is_closed()
    }

    fn lost_signal(&self) -> CancellationToken {
        self.lost.clone()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lost.cancel();
    }
}

/// Connector that hands out [`FakeTransport`]s and counts handshakes.
pub(crate) struct FakeConnector {
    host: Arc<FakeHost>,
    handshakes: AtomicUsize,
    delay: Duration,
    failure: Mutex<Option<RemoteError>>,
}

impl FakeConnector {
    pub fn new(host: Arc<FakeHost>) -> Arc<Self> {
        Self::with_delay(host, Duration::from_millis(50))
    }

    pub fn with_delay(host: Arc<FakeHost>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            host,
            handshakes: AtomicUsize::new(0),
            delay,
            failure: Mutex::new(None),
        })
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, error: Option<RemoteError>) {
        *self.failure.lock().unwrap() = error;
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _endpoint: &ServerEndpoint) -> Result<Arc<dyn Transport>, RemoteError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(self.host.transport()),
        }
    }
}

pub(crate) fn endpoint(host: &str, port: u16) -> ServerEndpoint {
    HostRecord::new(0, host, "pw").with_port(port).endpoint()
}

/// Server 7 -> 10.0.0.5:22, server 8 -> same host, server 9 -> inactive.
pub(crate) fn directory() -> Arc<StaticHostDirectory> {
    Arc::new(StaticHostDirectory::new([
        HostRecord::new(7, "10.0.0.5", "pw"),
        HostRecord::new(8, "10.0.0.5", "pw"),
        HostRecord::new(9, "10.0.0.9", "pw").inactive(),
    ]))
}

/// A `RemoteStorage` wired to one fake host behind the fake directory.
pub(crate) fn storage() -> (RemoteStorage, Arc<FakeHost>, Arc<FakeConnector>) {
    let host = FakeHost::new();
    let connector = FakeConnector::new(host.clone());
    let storage = RemoteStorage::new(CoreConfig::default(), directory(), connector.clone());
    (storage, host, connector)
}

mod tests {
    use super::*;

    #[test]
    fn test_quoted_args_round_trip_shell_quote() {
        let command = format!(
            "mkdir -p {} {}",
            super::super::shell::quote("/a/b"),
            super::super::shell::quote("it's")
        );
        assert_eq!(quoted_args(&command), vec!["/a/b", "it's"]);
    }

    #[test]
    fn test_add_dir_creates_parents() {
        let host = FakeHost::new();
        host.add_dir("/home/streaming/alice/clips");
        assert!(host.is_dir("/home/streaming"));
        assert!(host.is_dir("/home/streaming/alice/clips"));
        assert!(!host.is_dir("/home/other"));
    }
}
