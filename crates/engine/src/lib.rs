//! # Hitch Engine
//!
//! Everything between a parsed hook document and a run outcome:
//!
//! - **Git**: cloning hook repositories and reading the working tree
//! - **Cache**: checkouts of hook repositories keyed by URL and revision
//! - **Resolver**: repository entries to runnable hook definitions
//! - **Identify / Selector**: file tags and per-hook file selection
//! - **Hooks**: builtin checks, process execution and the parallel runner

pub mod cache;
pub mod git;
pub mod hooks;
pub mod identify;
pub mod resolver;
pub mod selector;
pub mod worktree;

pub use hitch_core::{Error, Result};

pub use cache::RepoCache;
pub use git::{Git2Provider, GitProvider};
pub use hooks::{CancelFlag, HookDefinition, HookReport, HookRunner, HookStatus, RunReport};
pub use resolver::{Resolution, Resolver};
pub use selector::{CandidateSet, GlobalFilter};
