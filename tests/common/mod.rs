//! Common test utilities for bosun integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.config/bosun/` directory.

#![allow(dead_code)]

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use bosun::auth::AuthMethod;
use bosun::cache::{CacheKey, CredentialCache, FileCredentialCache};
pub use tempfile::TempDir;

/// An API address nothing listens on.
pub const DEAD_API: &str = "http://127.0.0.1:9";

/// A test environment with its own home and working directory.
///
/// The `bosun()` method returns a `Command` with a cleared environment and
/// `HOME` pointing at the temporary home, making tests parallel-safe.
pub struct TestEnv {
    pub home_dir: TempDir,
    pub work_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            home_dir: TempDir::new().unwrap(),
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Create an environment whose default profile holds `content`.
    pub fn with_default_profile(content: &str) -> Self {
        let env = Self::new();
        env.write_profile("default.yaml", content);
        env
    }

    /// Get a Command for the bosun binary with an isolated environment.
    pub fn bosun(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bosun"));
        cmd.env_clear();
        cmd.env("HOME", self.home_dir.path());
        cmd.current_dir(self.work_dir.path());
        cmd
    }

    /// `$HOME/.config/bosun`
    pub fn config_dir(&self) -> PathBuf {
        self.home_dir.path().join(".config").join("bosun")
    }

    /// Write a profile file into the per-user config directory.
    pub fn write_profile(&self, file_name: &str, content: &str) -> PathBuf {
        let dir = self.config_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Write a file into the working directory.
    pub fn write_file(&self, file_name: &str, content: &str) -> PathBuf {
        let path = self.work_dir.path().join(file_name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn cache(&self) -> FileCredentialCache {
        FileCredentialCache::in_config_dir(&self.config_dir())
    }

    /// Store a token the way a previous invocation would have.
    pub fn seed_token(&self, method: AuthMethod, target: &str, token: &str) -> PathBuf {
        let cache = self.cache();
        let key = CacheKey::new(method, target);
        cache.put(&key, token).unwrap();
        cache.path_for(&key)
    }

    pub fn cached_token(&self, method: AuthMethod, target: &str) -> Option<String> {
        self.cache()
            .get(&CacheKey::new(method, target))
            .unwrap()
            .map(|c| c.token)
    }

    pub fn home_path(&self) -> &Path {
        self.home_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A local API that answers requests in order with canned responses.
///
/// `join()` on the handle yields the raw text of every request received.
/// The server stops after the last response or after a few idle seconds.
pub fn serve(responses: &[(u16, &str)]) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    listener.set_nonblocking(true).unwrap();
    let responses: Vec<(u16, String)> = responses
        .iter()
        .map(|(status, body)| (*status, body.to_string()))
        .collect();

    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let deadline = Instant::now() + Duration::from_secs(10);
            let mut stream = loop {
                match listener.accept() {
                    Ok((stream, _)) => break stream,
                    Err(e) if e.kind() == ErrorKind::WouldBlock && Instant::now() < deadline => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => return requests,
                }
            };
            stream.set_nonblocking(false).unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

            requests.push(read_request(&mut stream));
            let response = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
        requests
    });
    (base, handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}
