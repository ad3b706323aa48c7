//! Outbound delivery. Actual mail transport is somebody else's job: the
//! spool mailer leaves one json file per message for a mail agent to pick
//! up, the log mailer just reports what would have been sent.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::message::Notification;
use crate::error::{Error, Result};

pub trait Mailer {
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

pub struct LogMailer;

impl Mailer for LogMailer {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification"
        );
        debug!(body = %notification.render_text());
        Ok(())
    }
}

/// Spooled messages with the same name get a numeric suffix up to this.
const MAX_SPOOL_SUFFIX: u32 = 1000;

pub struct SpoolMailer {
    dir: PathBuf,
}

impl SpoolMailer {
    /// The directory is created on first delivery, so a broken spool only
    /// fails deliveries.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SpoolMailer { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_stem(notification: &Notification) -> String {
        let recipient: String = notification
            .recipient
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!(
            "{}-{}-{}-{recipient}",
            notification.created_at.timestamp_millis(),
            notification.snapshot_id,
            notification.alert.label(),
        )
    }

    /// Open a file that did not exist before. Recipients that sanitize to
    /// the same name get `-1`, `-2`, ... appended.
    fn create_unique(&self, stem: &str) -> io::Result<(PathBuf, File)> {
        for n in 0..=MAX_SPOOL_SUFFIX {
            let name = if n == 0 { format!("{stem}.json") } else { format!("{stem}-{n}.json") };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("more than {MAX_SPOOL_SUFFIX} spooled files named {stem}"),
        ))
    }

    fn spool(&self, notification: &Notification) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(notification)?;

        let (path, mut file) = self.create_unique(&Self::file_stem(notification))?;
        file.write_all(&json)?;
        Ok(path)
    }
}

impl Mailer for SpoolMailer {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        let path = self.spool(notification).map_err(|e| Error::Delivery {
            recipient: notification.recipient.clone(),
            message: format!("cannot spool to {}: {e}", self.dir.display()),
        })?;

        debug!(path = %path.display(), "notification spooled");
        Ok(())
    }
}
