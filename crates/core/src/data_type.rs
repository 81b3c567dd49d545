//! The five dataset channels and the MongoDB collections backing them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A dataset channel. Each maps to exactly one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Email,
    Ticket,
    Chat,
    Voice,
    SocialMedia,
}

impl DataType {
    /// Every data type, in reporting order.
    pub const ALL: [DataType; 5] = [
        DataType::Email,
        DataType::Ticket,
        DataType::Chat,
        DataType::Voice,
        DataType::SocialMedia,
    ];

    /// Short name used on the command line and in log file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Email => "email",
            DataType::Ticket => "ticket",
            DataType::Chat => "chat",
            DataType::Voice => "voice",
            DataType::SocialMedia => "socialmedia",
        }
    }

    /// MongoDB collection holding this data type.
    pub fn collection(&self) -> &'static str {
        match self {
            DataType::Email => "emailmessages",
            DataType::Ticket => "tickets",
            DataType::Chat => "chat-chunks",
            DataType::Voice => "voice",
            DataType::SocialMedia => "socialmedia",
        }
    }

    /// Human-readable label used inside prompts.
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Email => "customer email",
            DataType::Ticket => "support ticket",
            DataType::Chat => "live chat conversation",
            DataType::Voice => "voice call transcript",
            DataType::SocialMedia => "social media post",
        }
    }

    /// Fields carrying the record's actual content.
    pub fn content_fields(&self) -> &'static [&'static str] {
        match self {
            DataType::Email => &["subject", "body"],
            DataType::Ticket => &["title", "description"],
            DataType::Chat => &["conversation"],
            DataType::Voice => &["transcript"],
            DataType::SocialMedia => &["platform", "text"],
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        let singular = normalized.strip_suffix('s').unwrap_or(&normalized);

        match singular {
            "email" | "emailmessage" => Ok(DataType::Email),
            "ticket" => Ok(DataType::Ticket),
            "chat" | "chatchunk" => Ok(DataType::Chat),
            "voice" | "call" => Ok(DataType::Voice),
            "socialmedia" | "social" | "socialmediapost" => Ok(DataType::SocialMedia),
            _ => Err(CoreError::Validation(format!(
                "Unknown data type '{s}'. Expected one of: email, ticket, chat, voice, socialmedia"
            ))),
        }
    }
}
