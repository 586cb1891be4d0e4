//! Line-oriented relay protocol.
//!
//! Every frame on the wire is one newline-terminated UTF-8 line. A client
//! sends one command per line:
//!
//! ```text
//! list                      -> "1 2 3"
//! Forward <id> <message>    -> "Message forwarded to client <id>"  (target gets "<sender>: <message>")
//! history <id>              -> "History with client <id>:", one line per record, then an empty line
//! exit                      -> "Goodbye", then the server closes the connection
//! <anything else>           -> "server had received your msg"
//! ```
//!
//! A forward pushes `"<sender>: <message>"` to its target at any time, so a
//! `history` block opens with its own header line. A client waiting for the
//! block can tell pushed lines apart from the records that follow it.
//!
//! Commands are matched case-sensitively on the raw line. Parse failures are
//! reported as [`CommandError`], whose `Display` text is the exact reply sent
//! back to the issuing client.

use thiserror::Error;

use crate::identity::{ClientId, TargetId};

/// Reply to `exit`.
pub const GOODBYE: &str = "Goodbye";

/// Reply to any text that is not a recognised command.
pub const RECEIPT: &str = "server had received your msg";

/// Sent to every connected client when the operator interrupts the server.
pub const SHUTDOWN_FAREWELL: &str = "Server is shutting down. Goodbye!";

/// Default maximum length of a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024;

/// Greeting sent to a client right after it has been assigned `id`.
pub fn greeting(id: ClientId) -> String {
    format!("Your ID is {id}")
}

/// Acknowledgement sent to the sender of a successful forward.
pub fn forward_ack(target: ClientId) -> String {
    format!("Message forwarded to client {target}")
}

/// First line of a successful `history` reply.
pub fn history_header(target: ClientId) -> String {
    format!("History with client {target}:")
}

/// History record for `message` sent by `sender`; also the exact line pushed
/// to the forward target.
pub fn format_record(sender: ClientId, message: &str) -> String {
    format!("{sender}: {message}")
}

/// Render `ids` as the `list` reply.
pub fn format_id_list(ids: &[ClientId]) -> String {
    ids.iter()
        .map(ClientId::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recoverable command failures.
///
/// None of these tear down the session; the text is replied to the client and
/// the read loop continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid command format. Use: Forward <ID> <message>")]
    InvalidForwardFormat,

    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("Client {0} not found.")]
    ClientNotFound(TargetId),

    #[error("Invalid command format. Use: history <ID>")]
    InvalidHistoryFormat,

    #[error("Current and target client are the same.")]
    SameClient,

    #[error("History with client {0} not found.")]
    HistoryNotFound(TargetId),

    /// The target was registered but writing to its connection failed.
    #[error("An error occurred: failed to deliver message to client {0}")]
    DeliveryFailed(ClientId),
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `list`
    List,
    /// `Forward <target> <message>`
    Forward { target: TargetId, message: String },
    /// `history <target>`
    History { target: TargetId },
    /// `exit`
    Exit,
    /// Free text that matched no command.
    Message(String),
    /// An empty line. Ignored by the session.
    Empty,
}

impl Command {
    /// Decode one inbound line.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] when a `Forward` or `history` line is
    /// malformed. Anything else always decodes.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        match line {
            "" => Ok(Command::Empty),
            "exit" => Ok(Command::Exit),
            "list" => Ok(Command::List),
            _ if line.starts_with("Forward") => parse_forward(line),
            _ if line.starts_with("history") => parse_history(line),
            _ => Ok(Command::Message(line.to_string())),
        }
    }
}

/// `Forward <id> <message>`: split on single spaces at most twice so the
/// message keeps its own spaces.
fn parse_forward(line: &str) -> Result<Command, CommandError> {
    let mut parts = line.splitn(3, ' ');
    let _verb = parts.next();
    let (Some(target), Some(message)) = (parts.next(), parts.next()) else {
        return Err(CommandError::InvalidForwardFormat);
    };

    let target: TargetId = target
        .parse()
        .map_err(|_| CommandError::InvalidForwardFormat)?;

    if message.trim().is_empty() {
        return Err(CommandError::EmptyMessage);
    }

    Ok(Command::Forward {
        target,
        message: message.to_string(),
    })
}

fn parse_history(line: &str) -> Result<Command, CommandError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [_verb, target] = parts.as_slice() else {
        return Err(CommandError::InvalidHistoryFormat);
    };

    let target: TargetId = target
        .parse()
        .map_err(|_| CommandError::InvalidHistoryFormat)?;

    Ok(Command::History { target })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ClientId {
        ClientId::new(raw)
    }

    fn target(text: &str) -> TargetId {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("list"), Ok(Command::List));
        assert_eq!(Command::parse("exit"), Ok(Command::Exit));
        assert_eq!(Command::parse(""), Ok(Command::Empty));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            Command::parse("LIST"),
            Ok(Command::Message("LIST".to_string()))
        );
        assert_eq!(
            Command::parse("Exit"),
            Ok(Command::Message("Exit".to_string()))
        );
        // Lower-case forward is just chat text.
        assert_eq!(
            Command::parse("forward 2 hi"),
            Ok(Command::Message("forward 2 hi".to_string()))
        );
    }

    #[test]
    fn test_parse_plain_message() {
        assert_eq!(
            Command::parse("hello there"),
            Ok(Command::Message("hello there".to_string()))
        );
    }

    #[test]
    fn test_parse_forward_keeps_spaces_in_message() {
        assert_eq!(
            Command::parse("Forward 2 hello  big world "),
            Ok(Command::Forward {
                target: target("2"),
                message: "hello  big world ".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_forward_missing_message_is_format_error() {
        assert_eq!(
            Command::parse("Forward 2"),
            Err(CommandError::InvalidForwardFormat)
        );
        assert_eq!(
            Command::parse("Forward"),
            Err(CommandError::InvalidForwardFormat)
        );
    }

    #[test]
    fn test_parse_forward_non_integer_target() {
        assert_eq!(
            Command::parse("Forward bob hi"),
            Err(CommandError::InvalidForwardFormat)
        );
        assert_eq!(
            Command::parse("Forward 2.5 hi"),
            Err(CommandError::InvalidForwardFormat)
        );
        // Double space leaves an empty target token.
        assert_eq!(
            Command::parse("Forward  2 hi"),
            Err(CommandError::InvalidForwardFormat)
        );
    }

    #[test]
    fn test_parse_forward_keeps_unassignable_integers() {
        // Negative and oversized ids are well formed; they just never match.
        assert_eq!(
            Command::parse("Forward -3 hi"),
            Ok(Command::Forward {
                target: target("-3"),
                message: "hi".to_string(),
            })
        );
        let Ok(Command::Forward { target: huge, .. }) =
            Command::parse("Forward 99999999999999999999 hi")
        else {
            panic!("oversized id should parse as a forward");
        };
        assert_eq!(huge.client(), None);
        assert_eq!(
            CommandError::ClientNotFound(huge).to_string(),
            "Client 99999999999999999999 not found."
        );
    }

    #[test]
    fn test_parse_forward_empty_message() {
        assert_eq!(
            Command::parse("Forward 2 "),
            Err(CommandError::EmptyMessage)
        );
        assert_eq!(
            Command::parse("Forward 2    "),
            Err(CommandError::EmptyMessage)
        );
    }

    #[test]
    fn test_parse_history() {
        assert_eq!(
            Command::parse("history 4"),
            Ok(Command::History { target: target("4") })
        );
        assert_eq!(
            Command::parse("history   4  "),
            Ok(Command::History { target: target("4") })
        );
        assert_eq!(
            Command::parse("history -1"),
            Ok(Command::History { target: target("-1") })
        );
    }

    #[test]
    fn test_parse_history_bad_format() {
        assert_eq!(
            Command::parse("history"),
            Err(CommandError::InvalidHistoryFormat)
        );
        assert_eq!(
            Command::parse("history 1 2"),
            Err(CommandError::InvalidHistoryFormat)
        );
        assert_eq!(
            Command::parse("history x"),
            Err(CommandError::InvalidHistoryFormat)
        );
    }

    #[test]
    fn test_error_text_matches_wire_replies() {
        assert_eq!(
            CommandError::ClientNotFound(id(9).into()).to_string(),
            "Client 9 not found."
        );
        assert_eq!(
            CommandError::HistoryNotFound(target("-1")).to_string(),
            "History with client -1 not found."
        );
        assert_eq!(
            CommandError::SameClient.to_string(),
            "Current and target client are the same."
        );
    }

    #[test]
    fn test_reply_helpers() {
        assert_eq!(greeting(id(1)), "Your ID is 1");
        assert_eq!(history_header(id(2)), "History with client 2:");
        assert_eq!(forward_ack(id(2)), "Message forwarded to client 2");
        assert_eq!(format_record(id(1), "hello"), "1: hello");
        assert_eq!(format_id_list(&[id(1), id(3), id(10)]), "1 3 10");
        assert_eq!(format_id_list(&[]), "");
    }
}
