// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Returns the current value and advances `self` to the next one.
            pub fn bump(&mut self) -> Self {
                let current = *self;
                self.0 = self.0.wrapping_add(1);
                current
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

// Identity of a column for routing async completions. Never reused within a session.
opaque_id!(ColumnId);
// One per dispatched structural request.
opaque_id!(Ticket);
// Orders preview requests; only the latest may overwrite the preview.
opaque_id!(PreviewSerial);
