/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_mentions: bool,
    pub supports_file_upload: bool,
    pub max_message_len: usize,
}
