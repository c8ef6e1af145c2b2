//! Typed Interaction Actions
//!
//! Custom ids are encoded as `"<prefix>:<verb>[:<args>...]"`. Instead of
//! splitting the string wherever a handler happens to need a piece, the
//! router decodes the whole id into an [`Action`] once at its boundary, and
//! every malformed encoding becomes a uniform decode error.

use thiserror::Error;

use crate::domain::EntityKind;

// == Decode Error ==
#[derive(Debug, Error, PartialEq)]
pub enum ActionDecodeError {
    #[error("empty custom id")]
    Empty,

    #[error("unknown action prefix: {0}")]
    UnknownPrefix(String),

    #[error("custom id {0:?} is missing a verb")]
    MissingVerb(String),
}

// == Action ==
/// A decoded UI action: which manager it targets, what it asks for, and any
/// trailing arguments (usually the entity id).
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: EntityKind,
    pub verb: String,
    pub args: Vec<String>,
}

impl Action {
    /// Decodes a custom id.
    pub fn decode(custom_id: &str) -> Result<Self, ActionDecodeError> {
        if custom_id.is_empty() {
            return Err(ActionDecodeError::Empty);
        }

        let mut parts = custom_id.split(':');
        let prefix = parts.next().unwrap_or_default();
        let kind: EntityKind = prefix
            .parse()
            .map_err(|_| ActionDecodeError::UnknownPrefix(prefix.to_string()))?;

        let verb = parts
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ActionDecodeError::MissingVerb(custom_id.to_string()))?
            .to_string();

        let args = parts.map(str::to_string).collect();

        Ok(Self { kind, verb, args })
    }

    /// Encodes the action back into a custom id. Inverse of [`decode`](Self::decode).
    pub fn encode(&self) -> String {
        let mut id = format!("{}:{}", self.kind, self.verb);
        for arg in &self.args {
            id.push(':');
            id.push_str(arg);
        }
        id
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_id() {
        let action = Action::decode("giveaway:cancel:e42").unwrap();
        assert_eq!(action.kind, EntityKind::Giveaway);
        assert_eq!(action.verb, "cancel");
        assert_eq!(action.args, vec!["e42"]);
    }

    #[test]
    fn test_decode_multiple_args() {
        let action = Action::decode("poll:vote:p1:option2").unwrap();
        assert_eq!(action.args, vec!["p1", "option2"]);
    }

    #[test]
    fn test_decode_no_args() {
        let action = Action::decode("ticket:close").unwrap();
        assert_eq!(action.kind, EntityKind::Ticket);
        assert_eq!(action.verb, "close");
        assert!(action.args.is_empty());
    }

    #[test]
    fn test_decode_unknown_prefix() {
        assert_eq!(
            Action::decode("raffle:enter:r1"),
            Err(ActionDecodeError::UnknownPrefix("raffle".to_string()))
        );
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(Action::decode(""), Err(ActionDecodeError::Empty));
    }

    #[test]
    fn test_decode_missing_verb() {
        assert!(matches!(
            Action::decode("poll"),
            Err(ActionDecodeError::MissingVerb(_))
        ));
        assert!(matches!(
            Action::decode("poll:"),
            Err(ActionDecodeError::MissingVerb(_))
        ));
    }

    #[test]
    fn test_encode_roundtrip() {
        let action = Action {
            kind: EntityKind::Quarantine,
            verb: "release".to_string(),
            args: vec!["user9".to_string()],
        };
        assert_eq!(action.encode(), "quarantine:release:user9");
        assert_eq!(Action::decode(&action.encode()).unwrap(), action);
    }
}
