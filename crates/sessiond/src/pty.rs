//! PTY process management.

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, PtyPair, PtySize};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// Spawns a shell on a pseudo-terminal and owns its I/O ends. Output is
/// pumped off a reader thread into a channel the daemon takes with
/// [`PtyHandler::take_output`]. Dropping the handler kills and reaps
/// the child.
pub struct PtyHandler {
    pair: PtyPair,
    writer: Box<dyn Write + Send>,
    output_rx: Option<Receiver<Vec<u8>>>,
    exited: Arc<AtomicBool>,
    child: Box<dyn Child + Send + Sync>,
    _reader_thread: thread::JoinHandle<()>,
}

impl PtyHandler {
    /// Spawn a shell in `cwd` at the given size. `shell` overrides the
    /// `SHELL` environment variable; the final fallback is `/bin/sh`.
    pub fn spawn(shell: Option<&str>, cwd: Option<&Path>, rows: u16, cols: u16) -> Result<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let shell = shell
            .map(str::to_string)
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string());

        let mut cmd = CommandBuilder::new(&shell);
        cmd.env("TERM", "xterm-256color");
        if let Some(cwd) = cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .context("Failed to spawn shell")?;

        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")?;

        let mut reader = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")?;

        let (output_tx, output_rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>) = mpsc::channel();

        let exited = Arc::new(AtomicBool::new(false));
        let exited_clone = exited.clone();

        let reader_thread = thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        // EOF - process exited
                        exited_clone.store(true, Ordering::SeqCst);
                        break;
                    }
                    Ok(n) => {
                        if output_tx.send(buf[..n].to_vec()).is_err() {
                            break; // Channel closed
                        }
                    }
                    Err(_) => {
                        exited_clone.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            pair,
            writer,
            output_rx: Some(output_rx),
            exited,
            child,
            _reader_thread: reader_thread,
        })
    }

    /// Hand the output channel to whoever pumps this session. Each
    /// handler yields it exactly once.
    pub fn take_output(&mut self) -> Option<Receiver<Vec<u8>>> {
        self.output_rx.take()
    }

    /// Write input bytes to the PTY.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Whether the shell process has exited.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        self.pair
            .master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")?;
        Ok(())
    }
}

impl Drop for PtyHandler {
    fn drop(&mut self) {
        self.exited.store(true, Ordering::SeqCst);

        // ESRCH (no such process) is expected if already exited.
        if let Err(e) = self.child.kill() {
            tracing::debug!("Kill child process: {}", e);
        }

        // Reap to avoid a zombie.
        if let Err(e) = self.child.wait() {
            tracing::debug!("Wait for child process: {}", e);
        }
    }
}
