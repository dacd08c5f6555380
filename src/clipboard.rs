//! System clipboard access through the platform's copy tool

use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Copy tools tried in order: Wayland, X11, macOS
const COPY_TOOLS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard", "-i"]),
    ("pbcopy", &[]),
];

/// Put `text` on the clipboard. Returns the tool that took it.
pub async fn copy(text: &str) -> io::Result<&'static str> {
    copy_with(COPY_TOOLS, text).await
}

async fn copy_with(
    tools: &[(&'static str, &[&str])],
    text: &str,
) -> io::Result<&'static str> {
    for &(program, args) in tools {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(io::Error::other(format!("{program} exited with {status}")));
        }
        tracing::debug!(program, bytes = text.len(), "Copied to clipboard");
        return Ok(program);
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "no clipboard tool found (install wl-copy, xclip or pbcopy)",
    ))
}
