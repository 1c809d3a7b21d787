//! OS-level worker process with graceful and forced termination.

use crate::{CoreError, ExitOutcome, ProcessSpec, Result as CoreResult, TileProcess};

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::{Child, Command};

/// Wraps one spawned server process.
///
/// On Unix the process is started in its own session so terminate signals
/// reach the whole process group, including any helper children the game
/// server forks.
pub struct ProcessHandle {
    tile_id: String,
    child: Child,
    pid: Option<u32>,
    exit_code: Option<i32>,
    exited: bool,
}

impl ProcessHandle {
    pub fn start(tile_id: &str, spec: &ProcessSpec) -> CoreResult<Self> {
        if !spec.working_dir.is_dir() {
            return Err(CoreError::launch(
                tile_id,
                format!(
                    "working directory {} does not exist",
                    spec.working_dir.display()
                ),
                None,
            ));
        }

        if spec.is_path_like() && !spec.program.exists() {
            return Err(CoreError::launch(
                tile_id,
                format!("executable {} not found", spec.program.display()),
                None,
            ));
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        #[cfg(windows)]
        {
            use windows_sys::Win32::System::Threading::{
                CREATE_NEW_CONSOLE, CREATE_NEW_PROCESS_GROUP,
            };
            cmd.creation_flags(CREATE_NEW_CONSOLE | CREATE_NEW_PROCESS_GROUP);
        }

        let child = cmd.spawn().map_err(|e| {
            CoreError::launch(
                tile_id,
                format!("failed to spawn {}", spec.program.display()),
                Some(e),
            )
        })?;

        let pid = child.id();
        info!("Tile {tile_id} spawned with PID {pid:?}: {}", spec.command_line());

        Ok(Self {
            tile_id: tile_id.to_string(),
            child,
            pid,
            exit_code: None,
            exited: false,
        })
    }

    fn record_exit(&mut self, status: std::process::ExitStatus) {
        self.exited = true;
        self.exit_code = status.code();
        debug!("Tile {} process exited: {status}", self.tile_id);
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> CoreResult<()> {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        if let Some(pid) = self.pid {
            killpg(Pid::from_raw(pid as i32), signal)
                .map_err(|errno| CoreError::from(std::io::Error::from(errno)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl TileProcess for ProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Liveness probe for tile {} failed: {e}", self.tile_id);
                true
            }
        }
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn terminate(&mut self, graceful: bool) -> CoreResult<()> {
        if self.exited {
            return Ok(());
        }

        if graceful {
            #[cfg(unix)]
            {
                use nix::sys::signal::Signal;

                info!("Sending SIGTERM to tile {} (PID {:?})", self.tile_id, self.pid);
                return self.signal_group(Signal::SIGTERM);
            }

            #[cfg(windows)]
            {
                use windows_sys::Win32::System::Console::{
                    CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent,
                };

                if let Some(pid) = self.pid {
                    info!("Sending CTRL_BREAK to tile {} (PID {pid})", self.tile_id);
                    unsafe {
                        GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid);
                    }
                }
                return Ok(());
            }
        }

        info!("Force killing tile {} (PID {:?})", self.tile_id, self.pid);

        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            if let Err(e) = self.signal_group(Signal::SIGKILL) {
                debug!("Process group kill for tile {} failed: {e}", self.tile_id);
            }
        }

        self.child.start_kill()?;
        Ok(())
    }

    async fn wait_exit(&mut self, grace: Duration) -> CoreResult<ExitOutcome> {
        if self.exited {
            return Ok(ExitOutcome {
                code: self.exit_code,
                forced: false,
            });
        }

        let waited = tokio::time::timeout(grace, self.child.wait()).await;
        match waited {
            Ok(status) => {
                self.record_exit(status?);
                Ok(ExitOutcome {
                    code: self.exit_code,
                    forced: false,
                })
            }
            Err(_) => {
                warn!(
                    "Tile {} did not exit within {}s, escalating to kill",
                    self.tile_id,
                    grace.as_secs()
                );
                self.terminate(false)?;
                let status = self.child.wait().await?;
                self.record_exit(status);
                Ok(ExitOutcome {
                    code: self.exit_code,
                    forced: true,
                })
            }
        }
    }
}
