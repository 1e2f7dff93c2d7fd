// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod column;
pub mod editor;
pub mod error;
pub mod ids;
pub mod layout;
pub mod log;
pub mod metadata;
pub mod preview;
pub mod record;
pub mod remote;
pub mod state;

pub use column::*;
pub use editor::*;
pub use error::*;
pub use ids::*;
pub use log::*;
pub use preview::{PreviewPlan, PreviewState};
pub use record::Record;
pub use remote::*;
pub use state::*;
