//! Ingress protocol: [`Submission`] and its [`Op`] variants.

use serde::{Deserialize, Serialize};

use crate::items::TurnContextPatch;

/// One item of user-supplied turn input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Text { text: String },
    Context { path: String },
}

/// The operation carried by a [`Submission`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    UserInput { items: Vec<InputItem> },
    Interrupt,
    Configure { patch: TurnContextPatch },
    ListTools,
    CompactNow,
}

/// `{id, op}` — a single unit of ingress work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub op: Op,
}
