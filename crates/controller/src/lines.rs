/// Longest line kept. Anything longer is discarded up to its terminator.
pub const MAX_LINE_LEN: usize = 1024;

/// Splits a byte stream into `\n`-terminated lines.
///
/// A trailing `\r` is dropped and invalid UTF-8 is replaced. Partial lines
/// are kept until the next chunk completes them. An oversized line is
/// dropped whole, including the bytes after the limit.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            if self.discarding {
                if byte == b'\n' {
                    self.discarding = false;
                }
                continue;
            }

            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.pending);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                lines.push(String::from_utf8_lossy(&line).into_owned());
            } else if self.pending.len() < MAX_LINE_LEN {
                self.pending.push(byte);
            } else {
                tracing::debug!(len = self.pending.len(), "Discarding oversized inbound line");
                self.pending.clear();
                self.discarding = true;
            }
        }

        lines
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.discarding = false;
    }
}
