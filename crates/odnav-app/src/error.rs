// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Failures the browser recovers from locally. None of them ends the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowseError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid record text: {0}")]
    Format(String),
    #[error("no key determined for record")]
    KeyResolution,
    #[error("{0}")]
    Precondition(String),
}

impl BrowseError {
    pub fn transport(error: &anyhow::Error) -> Self {
        Self::Transport(format!("{error:#}"))
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}
