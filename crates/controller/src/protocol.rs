use crate::error::ProtocolError;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// Outbound commands understood by the conveyor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolCommand {
    Pass,
    Reject,
    StartConveyor,
    StopConveyor,
    Ping,
}

impl ProtocolCommand {
    pub const ALL: [ProtocolCommand; 5] = [
        ProtocolCommand::Pass,
        ProtocolCommand::Reject,
        ProtocolCommand::StartConveyor,
        ProtocolCommand::StopConveyor,
        ProtocolCommand::Ping,
    ];
}

impl fmt::Display for ProtocolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolCommand::Pass => "pass",
            ProtocolCommand::Reject => "reject",
            ProtocolCommand::StartConveyor => "start-conveyor",
            ProtocolCommand::StopConveyor => "stop-conveyor",
            ProtocolCommand::Ping => "ping",
        };
        f.write_str(name)
    }
}

/// A parsed inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage<'a> {
    DetectionSignal,
    Status(&'a str),
    Diagnostic { prefix: &'a str, text: &'a str },
    Unrecognized,
}

/// Wire spelling of every token. Must match the controller firmware.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolTokens {
    pub pass: String,
    pub reject: String,
    pub start_conveyor: String,
    pub stop_conveyor: String,
    pub ping: String,
    pub detection: String,
    pub status_prefix: String,
    pub diagnostic_prefixes: Vec<String>,
}

impl Default for ProtocolTokens {
    fn default() -> Self {
        Self {
            pass: "PASS".to_string(),
            reject: "REJECT".to_string(),
            start_conveyor: "START".to_string(),
            stop_conveyor: "STOP".to_string(),
            ping: "PING".to_string(),
            detection: "DETECTED".to_string(),
            status_prefix: "STATUS:".to_string(),
            diagnostic_prefixes: ["DEBUG:", "INFO:", "WARN:", "ERROR:"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ProtocolTokens {
    pub fn outbound(&self, command: ProtocolCommand) -> &str {
        match command {
            ProtocolCommand::Pass => &self.pass,
            ProtocolCommand::Reject => &self.reject,
            ProtocolCommand::StartConveyor => &self.start_conveyor,
            ProtocolCommand::StopConveyor => &self.stop_conveyor,
            ProtocolCommand::Ping => &self.ping,
        }
    }

    /// Token followed by the line terminator, ready to write.
    pub fn frame(&self, command: ProtocolCommand) -> Vec<u8> {
        let token = self.outbound(command);
        let mut bytes = Vec::with_capacity(token.len() + 1);
        bytes.extend_from_slice(token.as_bytes());
        bytes.push(b'\n');
        bytes
    }

    /// Classify one inbound line (without its terminator).
    ///
    /// Only a trailing `\r` is stripped; the detection token must match the
    /// rest of the line byte for byte.
    pub fn parse<'a>(&self, line: &'a str) -> InboundMessage<'a> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line == self.detection {
            return InboundMessage::DetectionSignal;
        }

        if !self.status_prefix.is_empty()
            && let Some(rest) = line.strip_prefix(self.status_prefix.as_str())
        {
            return InboundMessage::Status(rest.trim());
        }

        for prefix in &self.diagnostic_prefixes {
            if let Some(rest) = line.strip_prefix(prefix.as_str()) {
                let len = prefix.len();
                return InboundMessage::Diagnostic {
                    prefix: &line[..len],
                    text: rest.trim(),
                };
            }
        }

        InboundMessage::Unrecognized
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        let named = [
            ("pass", &self.pass),
            ("reject", &self.reject),
            ("start_conveyor", &self.start_conveyor),
            ("stop_conveyor", &self.stop_conveyor),
            ("ping", &self.ping),
            ("detection", &self.detection),
        ];

        for (name, token) in named {
            if token.trim().is_empty() {
                return Err(ProtocolError::EmptyToken(name));
            }
            if token.contains(['\n', '\r']) {
                return Err(ProtocolError::LineBreak(name));
            }
        }

        let mut seen = HashSet::new();
        for command in ProtocolCommand::ALL {
            let token = self.outbound(command);
            if !seen.insert(token) {
                return Err(ProtocolError::Duplicate(token.to_string()));
            }
        }

        Ok(())
    }
}

/// Log a diagnostic line at the level its prefix names.
pub(crate) fn log_diagnostic(prefix: &str, text: &str) {
    let level = prefix.trim_end_matches(':').to_ascii_uppercase();
    match level.as_str() {
        "DEBUG" => tracing::debug!(peer = true, "{}", text),
        "WARN" | "WARNING" => tracing::warn!(peer = true, "{}", text),
        "ERROR" => tracing::error!(peer = true, "{}", text),
        _ => tracing::info!(peer = true, prefix, "{}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_commands_with_newline() {
        let tokens = ProtocolTokens::default();
        assert_eq!(tokens.frame(ProtocolCommand::Pass), b"PASS\n");
        assert_eq!(tokens.frame(ProtocolCommand::Reject), b"REJECT\n");
        assert_eq!(tokens.frame(ProtocolCommand::StartConveyor), b"START\n");
    }

    #[test]
    fn detection_must_match_exactly() {
        let tokens = ProtocolTokens::default();
        assert_eq!(tokens.parse("DETECTED"), InboundMessage::DetectionSignal);
        assert_eq!(tokens.parse("DETECTED\r"), InboundMessage::DetectionSignal);
        assert_eq!(tokens.parse("DETECTED!"), InboundMessage::Unrecognized);
        assert_eq!(tokens.parse("detected"), InboundMessage::Unrecognized);
        assert_eq!(tokens.parse(" DETECTED"), InboundMessage::Unrecognized);
        assert_eq!(tokens.parse("DETECTED "), InboundMessage::Unrecognized);
        assert_eq!(tokens.parse("\tDETECTED\r"), InboundMessage::Unrecognized);
    }

    #[test]
    fn status_and_diagnostics() {
        let tokens = ProtocolTokens::default();
        assert_eq!(
            tokens.parse("STATUS: conveyor running"),
            InboundMessage::Status("conveyor running")
        );
        assert_eq!(
            tokens.parse("WARN: servo slow"),
            InboundMessage::Diagnostic {
                prefix: "WARN:",
                text: "servo slow"
            }
        );
        assert_eq!(tokens.parse("garbage \u{fffd}"), InboundMessage::Unrecognized);
        assert_eq!(tokens.parse(""), InboundMessage::Unrecognized);
    }

    #[test]
    fn custom_tokens() {
        let tokens = ProtocolTokens {
            detection: "D".to_string(),
            pass: "OK".to_string(),
            reject: "NG".to_string(),
            ..Default::default()
        };
        assert_eq!(tokens.parse("D"), InboundMessage::DetectionSignal);
        assert_eq!(tokens.frame(ProtocolCommand::Reject), b"NG\n");
        assert!(tokens.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_tokens() {
        let empty = ProtocolTokens {
            ping: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(empty.validate(), Err(ProtocolError::EmptyToken("ping")));

        let dup = ProtocolTokens {
            reject: "PASS".to_string(),
            ..Default::default()
        };
        assert_eq!(dup.validate(), Err(ProtocolError::Duplicate("PASS".to_string())));

        let newline = ProtocolTokens {
            pass: "PA\nSS".to_string(),
            ..Default::default()
        };
        assert_eq!(newline.validate(), Err(ProtocolError::LineBreak("pass")));
    }
}
