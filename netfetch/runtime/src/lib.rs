#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netfetch_core as core;
pub use netfetch_k8s_api as k8s;
pub use netfetch_k8s_cluster as cluster;

mod args;
mod dashboard;
mod prompt;
mod report;

pub use self::{args::Args, dashboard::Dashboard, prompt::TerminalPrompt};
