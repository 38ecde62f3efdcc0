pub mod anchor;
pub mod app;
pub mod config;
pub mod git;
pub mod github;
pub mod pipeline;
pub mod watch;
