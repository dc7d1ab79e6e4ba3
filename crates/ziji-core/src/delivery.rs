//! Deliver a segmented reply: prose inline, code blocks as uploaded files.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    domain::{Mention, Recipient, UserId},
    errors::Error,
    messaging::port::MessagingPort,
    segment::{split_response, Segment},
    Result,
};

/// A file that exists only for one upload.
///
/// The file is removed when the guard drops, whichever way the delivery ends.
#[derive(Debug)]
pub struct TransientArtifact {
    path: PathBuf,
}

impl TransientArtifact {
    pub async fn create(path: PathBuf, content: &str) -> Result<Self> {
        // Guard first so a half-written file is removed too.
        let artifact = Self { path };
        tokio::fs::write(&artifact.path, content).await?;
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), "failed to remove artifact: {e}"),
        }
    }
}

/// `code_{user}_{language}.txt`, with the language reduced to file-name safe chars.
pub fn artifact_file_name(user: UserId, language: &str) -> String {
    let lang: String = language
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("code_{}_{lang}.txt", user.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub texts_sent: usize,
    pub files_uploaded: usize,
}

pub struct Delivery {
    messenger: Arc<dyn MessagingPort>,
    artifact_dir: PathBuf,
}

impl Delivery {
    pub fn new(messenger: Arc<dyn MessagingPort>, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            messenger,
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub async fn deliver_reply(&self, recipient: &Recipient, reply: &str) -> Result<DeliveryReport> {
        self.deliver(recipient, &split_response(reply)).await
    }

    /// Deliver `segments` in order.
    ///
    /// On failure the recipient gets a short notice and the remaining
    /// segments are skipped.
    pub async fn deliver(
        &self,
        recipient: &Recipient,
        segments: &[Segment],
    ) -> Result<DeliveryReport> {
        let mention = recipient.mention();
        let has_code = segments.iter().any(Segment::is_code);
        let result = if has_code {
            self.deliver_mixed(recipient, segments, mention.as_ref())
                .await
        } else {
            self.deliver_plain(recipient, segments, mention.as_ref())
                .await
        };

        let e = match result {
            Ok(report) => return Ok(report),
            Err(e) => e,
        };
        tracing::warn!(chat_id = recipient.chat_id.0, "delivery failed: {e}");
        let notice = if has_code {
            format!("File delivery failed: {e}")
        } else {
            format!("Reply delivery failed: {e}")
        };
        if let Err(send_err) = self
            .messenger
            .send_text(recipient.chat_id, &notice, None)
            .await
        {
            tracing::warn!("failed to report delivery failure: {send_err}");
        }
        Err(Error::Delivery(e.to_string()))
    }

    async fn deliver_plain(
        &self,
        recipient: &Recipient,
        segments: &[Segment],
        mention: Option<&Mention>,
    ) -> Result<DeliveryReport> {
        let text = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t.as_str()),
                Segment::Code { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut report = DeliveryReport::default();
        if text.is_empty() {
            return Ok(report);
        }
        self.messenger
            .send_text(recipient.chat_id, &text, mention)
            .await?;
        report.texts_sent = 1;
        Ok(report)
    }

    async fn deliver_mixed(
        &self,
        recipient: &Recipient,
        segments: &[Segment],
        mention: Option<&Mention>,
    ) -> Result<DeliveryReport> {
        tokio::fs::create_dir_all(&self.artifact_dir).await?;

        let mut report = DeliveryReport::default();
        for segment in segments {
            match segment {
                Segment::Text(text) => {
                    self.messenger
                        .send_text(recipient.chat_id, text, mention)
                        .await?;
                    report.texts_sent += 1;
                }
                Segment::Code { language, content } => {
                    // Same-language blocks reuse the name; each is uploaded
                    // and removed before the next one is written.
                    let path = self
                        .artifact_dir
                        .join(artifact_file_name(recipient.user_id, language));
                    let artifact = TransientArtifact::create(path, content).await?;
                    self.messenger
                        .upload_file(recipient.chat_id, artifact.path())
                        .await?;
                    drop(artifact);
                    report.files_uploaded += 1;
                }
            }
        }
        Ok(report)
    }
}
