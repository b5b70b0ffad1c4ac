// Each integration test compiles this module independently via `mod support;`,
// so items used by one test appear unused in others.
#![allow(unused)]

pub mod collector;

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Output of one relay run.
pub struct RelayRun {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Builder for a relay process pointed at a mock collector.
pub struct Relay {
    env: Vec<(String, String)>,
}

impl Relay {
    pub fn new(collector_port: u16) -> Self {
        Self {
            env: vec![
                ("HEC_RELAY_SERVER".into(), "127.0.0.1".into()),
                ("HEC_RELAY_PORT".into(), collector_port.to_string()),
                ("HEC_RELAY_TOKEN".into(), "integration-token".into()),
                ("HEC_RELAY_LOG_LEVEL".into(), "debug".into()),
            ],
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.retain(|(k, _)| k != key);
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn state_file(self, path: &Path) -> Self {
        self.env("HEC_RELAY_STATE_FILE", path.to_str().unwrap())
    }

    pub fn spawn(self) -> Child {
        Command::new(env!("CARGO_BIN_EXE_hec-relay"))
            .env_clear()
            .envs(self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn hec-relay")
    }

    /// Feed `input` on stdin, close it, and wait for the process to exit.
    pub async fn run(self, input: &str) -> RelayRun {
        let mut child = self.spawn();

        let mut stdin = child.stdin.take().unwrap();
        // The relay may exit before reading everything; a broken pipe is fine.
        let _ = stdin.write_all(input.as_bytes()).await;
        drop(stdin);

        wait(child, String::new()).await
    }

    /// Feed `input` on stdin and keep it open, wait until the relay has queued
    /// `events` events, then deliver `signal` and wait for the process to exit.
    pub async fn run_until_signal(self, input: &str, events: usize, signal: Signal) -> RelayRun {
        let mut child = self.spawn();
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(input.as_bytes()).await.unwrap();
        stdin.flush().await.unwrap();

        let mut stderr = BufReader::new(child.stderr.take().unwrap());
        let mut seen = String::new();
        let mut queued = 0;
        tokio::time::timeout(Duration::from_secs(10), async {
            let mut line = String::new();
            while queued < events {
                line.clear();
                let n = stderr.read_line(&mut line).await.unwrap();
                assert!(n > 0, "hec-relay exited early:\n{seen}");
                if line.contains("event queued") {
                    queued += 1;
                }
                seen.push_str(&line);
            }
        })
        .await
        .expect("hec-relay did not queue events in time");

        let pid = child.id().expect("hec-relay already exited");
        kill(Pid::from_raw(pid as i32), signal).unwrap();

        let mut rest = String::new();
        tokio::time::timeout(Duration::from_secs(10), stderr.read_to_string(&mut rest))
            .await
            .expect("hec-relay did not exit in time")
            .unwrap();
        seen.push_str(&rest);

        // Stdin stays open until the process is gone.
        let run = wait(child, seen).await;
        drop(stdin);
        run
    }
}

/// Wait for exit, appending any stderr not yet consumed to `stderr`.
async fn wait(child: Child, mut stderr: String) -> RelayRun {
    let output = tokio::time::timeout(Duration::from_secs(10), child.wait_with_output())
        .await
        .expect("hec-relay did not exit in time")
        .expect("failed to collect hec-relay output");

    stderr.push_str(&String::from_utf8_lossy(&output.stderr));
    RelayRun {
        status: output.status,
        stderr,
    }
}
