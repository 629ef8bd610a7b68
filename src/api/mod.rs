//! Task-tracking API: wire types and the authenticated HTTP client.

pub(crate) mod client;
pub(crate) mod types;

pub(crate) use client::{ApiError, QuestApi, Session};
pub(crate) use types::{Task, TaskKind, UserProfile};
