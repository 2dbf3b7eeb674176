//! Host primitives: the only side effects action handlers may reach.
//!
//! [`SystemHost`] backs them with desktop helpers (`xdg-open`, `xclip`),
//! falling back to a second helper on the alternate channel.
//! [`LogHost`] only records intent and is used for dry runs.

use std::io::ErrorKind;
use std::process::Stdio;

use super::handler::{ActionError, Channel};

/// Host operations available to action handlers.
pub trait HostPrimitives {
    fn open_url(&self, url: &str, channel: Channel) -> Result<(), ActionError>;
    fn copy_text(&self, text: &str, channel: Channel) -> Result<(), ActionError>;
    fn close_tab(&self, channel: Channel) -> Result<(), ActionError>;
}

/// Receives transient failure notices for the user.
pub trait Notifier {
    fn notify(&self, path: &str, message: &str);
}

/// Notifier that reports through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, path: &str, message: &str) {
        tracing::warn!(path, error = message, "gesture action failed");
        eprintln!("touchpathd: {path}: {message}");
    }
}

/// Host that performs nothing and logs each request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl HostPrimitives for LogHost {
    fn open_url(&self, url: &str, channel: Channel) -> Result<(), ActionError> {
        tracing::info!(url, ?channel, "open url");
        Ok(())
    }

    fn copy_text(&self, text: &str, channel: Channel) -> Result<(), ActionError> {
        tracing::info!(bytes = text.len(), ?channel, "copy text");
        Ok(())
    }

    fn close_tab(&self, channel: Channel) -> Result<(), ActionError> {
        tracing::info!(?channel, "close tab");
        Ok(())
    }
}

/// Host backed by desktop helper processes.
///
/// Processes are spawned and left to finish on their own; failures
/// after spawn are logged, not reported back to the dispatcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    fn opener(channel: Channel) -> (&'static str, &'static [&'static str]) {
        match channel {
            Channel::Primary => ("xdg-open", &[]),
            Channel::Alternate => ("gio", &["open"]),
        }
    }

    fn clipboard(channel: Channel) -> (&'static str, &'static [&'static str]) {
        match channel {
            Channel::Primary => ("xclip", &["-selection", "clipboard"]),
            Channel::Alternate => ("wl-copy", &[]),
        }
    }
}

/// Map a spawn failure to an action error. Permission problems mean
/// the helper is not allowed here, which the alternate channel may fix.
fn spawn_error(program: &str, e: std::io::Error) -> ActionError {
    match e.kind() {
        ErrorKind::PermissionDenied | ErrorKind::NotFound => {
            ActionError::Restricted(format!("{program}: {e}"))
        }
        _ => ActionError::Failed(format!("{program}: {e}")),
    }
}

impl HostPrimitives for SystemHost {
    fn open_url(&self, url: &str, channel: Channel) -> Result<(), ActionError> {
        let (program, args) = Self::opener(channel);
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::warn!(program, %status, "opener exited with failure");
                }
                Err(e) => tracing::warn!(program, error = %e, "opener wait failed"),
                Ok(_) => {}
            }
        });
        Ok(())
    }

    fn copy_text(&self, text: &str, channel: Channel) -> Result<(), ActionError> {
        use tokio::io::AsyncWriteExt;

        let (program, args) = Self::clipboard(channel);
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        let content = text.as_bytes().to_vec();
        tokio::spawn(async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(&content).await {
                    tracing::warn!(program, error = %e, "clipboard write failed");
                }
                // Dropping stdin closes the pipe so the helper can exit.
            }
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::warn!(program, %status, "clipboard helper exited with failure");
                }
                Err(e) => tracing::warn!(program, error = %e, "clipboard wait failed"),
                Ok(_) => {}
            }
        });
        Ok(())
    }

    fn close_tab(&self, _channel: Channel) -> Result<(), ActionError> {
        Err(ActionError::Failed(
            "no browser tab is attached to this session".into(),
        ))
    }
}
