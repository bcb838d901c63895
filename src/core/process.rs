use crate::domain::model::ServerInstance;
use crate::utils::error::{Result, ServerSmithError};
use crate::utils::monitor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const STOPPED_MESSAGE: &str = "Server stopped.";

#[cfg(windows)]
const NEOFORGE_ARGS_FILE: &str = "win_args.txt";
#[cfg(not(windows))]
const NEOFORGE_ARGS_FILE: &str = "unix_args.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Jar file name relative to the instance directory.
    Jar(String),
    /// JVM argument file written by the NeoForge installer, relative path.
    ArgsFile(PathBuf),
}

/// Picks what to launch: `server.jar`, then any jar that looks like a server
/// or forge jar, then a NeoForge argument file.
pub fn resolve_launch_target(instance_dir: &Path) -> Result<LaunchTarget> {
    if instance_dir.join("server.jar").is_file() {
        return Ok(LaunchTarget::Jar("server.jar".to_string()));
    }

    let mut candidates: Vec<String> = std::fs::read_dir(instance_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| {
            name.ends_with(".jar")
                && (name.contains("server") || name.contains("forge") || name.contains("neoforge"))
        })
        .collect();
    candidates.sort();
    if let Some(jar) = candidates.into_iter().next() {
        return Ok(LaunchTarget::Jar(jar));
    }

    let neoforge_root = Path::new("libraries/net/neoforged/neoforge");
    if let Ok(versions) = std::fs::read_dir(instance_dir.join(neoforge_root)) {
        let mut args_files: Vec<PathBuf> = versions
            .filter_map(|entry| entry.ok())
            .map(|entry| neoforge_root.join(entry.file_name()).join(NEOFORGE_ARGS_FILE))
            .filter(|relative| instance_dir.join(relative).is_file())
            .collect();
        args_files.sort();
        if let Some(args_file) = args_files.pop() {
            return Ok(LaunchTarget::ArgsFile(args_file));
        }
    }

    Err(ServerSmithError::NoServerJar(instance_dir.to_path_buf()))
}

pub fn launch_args(min_memory_mb: u32, max_memory_mb: u32, target: &LaunchTarget) -> Vec<String> {
    let mut args = vec![
        format!("-Xms{}M", min_memory_mb),
        format!("-Xmx{}M", max_memory_mb),
    ];
    match target {
        LaunchTarget::Jar(jar) => {
            args.push("-jar".to_string());
            args.push(jar.clone());
        }
        LaunchTarget::ArgsFile(file) => args.push(format!("@{}", file.display())),
    }
    args.push("nogui".to_string());
    args
}

/// True when the instance's pid file names a live server process in the
/// instance directory, which covers servers started by another ServerSmith
/// invocation.
pub fn is_recorded_running(instance: &ServerInstance) -> bool {
    std::fs::read_to_string(instance.pid_file())
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
        .map(|pid| monitor::is_server_process(pid, &instance.location))
        .unwrap_or(false)
}

/// A started server: its pid, console output and exit code.
#[derive(Debug)]
pub struct ServerSession {
    pub pid: u32,
    pub logs: mpsc::UnboundedReceiver<String>,
    pub exit: oneshot::Receiver<Option<i32>>,
}

impl ServerSession {
    pub async fn next_line(&mut self) -> Option<String> {
        self.logs.recv().await
    }
}

struct RunningServer {
    pid: u32,
    commands: mpsc::UnboundedSender<String>,
    kill: Option<oneshot::Sender<()>>,
}

type ProcessTable = Arc<Mutex<HashMap<PathBuf, RunningServer>>>;

/// Tracks the server processes started from this process, keyed by
/// instance directory.
#[derive(Clone)]
pub struct ProcessSupervisor {
    java_binary: String,
    processes: ProcessTable,
}

impl ProcessSupervisor {
    pub fn new(java_binary: impl Into<String>) -> Self {
        Self {
            java_binary: java_binary.into(),
            processes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, RunningServer>> {
        self.processes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn start(&self, instance: &ServerInstance) -> Result<ServerSession> {
        let location = instance.location.clone();
        if self.is_running(&location) || is_recorded_running(instance) {
            return Err(ServerSmithError::AlreadyRunning(location));
        }

        let target = resolve_launch_target(&location)?;
        let args = launch_args(instance.min_memory, instance.max_memory, &target);
        tracing::info!(
            "Starting {} with {} {}",
            instance.name,
            self.java_binary,
            args.join(" ")
        );

        let mut command = Command::new(&self.java_binary);
        command
            .args(&args)
            .current_dir(&location)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group: a terminal Ctrl-C reaches us, not the JVM, and
        // is turned into a `stop` command.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| {
                ServerSmithError::process(format!("Failed to launch {}: {}", self.java_binary, e))
            })?;

        let pid = child.id().unwrap_or_default();
        write_pid_file(instance, pid);

        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let mut readers: Vec<JoinHandle<()>> = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, log_tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, log_tx.clone())));
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        if let Some(stdin) = child.stdin.take() {
            tokio::spawn(write_commands(stdin, command_rx, instance.name.clone()));
        }

        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel();

        self.table().insert(
            location.clone(),
            RunningServer {
                pid,
                commands: command_tx,
                kill: Some(kill_tx),
            },
        );

        let processes = Arc::clone(&self.processes);
        let pid_file = instance.pid_file();
        let name = instance.name.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = &mut kill_rx => {
                    tracing::warn!("Killing server {}", name);
                    if let Err(e) = child.start_kill() {
                        tracing::error!("Failed to kill {}: {}", name, e);
                    }
                    child.wait().await
                }
            };

            for reader in readers {
                let _ = reader.await;
            }

            processes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&location);
            let _ = std::fs::remove_file(&pid_file);

            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::error!("Failed to wait for {}: {}", name, e);
                    None
                }
            };
            tracing::info!("Server {} exited with {:?}", name, code);

            let _ = log_tx.send(STOPPED_MESSAGE.to_string());
            let _ = exit_tx.send(code);
        });

        Ok(ServerSession {
            pid,
            logs: log_rx,
            exit: exit_rx,
        })
    }

    /// Asks the server to shut down cleanly.
    pub fn stop(&self, location: &Path) -> Result<bool> {
        self.send_command(location, "stop")
    }

    pub fn send_command(&self, location: &Path, command: &str) -> Result<bool> {
        let table = self.table();
        let Some(server) = table.get(location) else {
            tracing::debug!("Ignoring command for stopped server {}", location.display());
            return Ok(false);
        };

        server
            .commands
            .send(command.to_string())
            .map_err(|_| ServerSmithError::process("Server console is closed"))?;
        Ok(true)
    }

    pub fn kill(&self, location: &Path) -> Result<bool> {
        let mut table = self.table();
        let Some(kill) = table.get_mut(location).and_then(|server| server.kill.take()) else {
            tracing::debug!("Nothing to kill at {}", location.display());
            return Ok(false);
        };

        kill.send(())
            .map_err(|_| ServerSmithError::process("Server already exited"))?;
        Ok(true)
    }

    pub fn is_running(&self, location: &Path) -> bool {
        self.table().contains_key(location)
    }

    pub fn pid(&self, location: &Path) -> Option<u32> {
        self.table().get(location).map(|server| server.pid)
    }

    pub fn running_count(&self) -> usize {
        self.table().len()
    }
}

fn write_pid_file(instance: &ServerInstance, pid: u32) {
    let pid_file = instance.pid_file();
    let result = pid_file
        .parent()
        .map(std::fs::create_dir_all)
        .unwrap_or(Ok(()))
        .and_then(|_| std::fs::write(&pid_file, pid.to_string()));
    if let Err(e) = result {
        tracing::warn!("Could not write pid file {}: {}", pid_file.display(), e);
    }
}

async fn forward_lines<R>(stream: R, log_tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            // Keep draining even when nobody listens, or the child blocks on a full pipe.
            Ok(Some(line)) => {
                let _ = log_tx.send(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading server output: {}", e);
                break;
            }
        }
    }
}

async fn write_commands(
    mut stdin: ChildStdin,
    mut commands: mpsc::UnboundedReceiver<String>,
    name: String,
) {
    while let Some(command) = commands.recv().await {
        let line = format!("{}\n", command);
        let result = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!("Error sending command to {}: {}", name, e);
            break;
        }
    }
}
