//! Custodia: credential and session lifecycle management.
//!
//! Accounts live behind the [`directory::UserDirectory`] trait; sessions are
//! stateless JWT pairs from [`token::TokenService`]; the lifecycle flows in
//! [`flows`] tie them together and the [`api`] module serves them over HTTP.

pub mod api;
pub mod cli;
pub mod config;
pub mod directory;
pub mod email;
pub mod error;
pub mod flows;
pub mod guards;
pub mod oauth;
pub mod password;
pub mod ratelimit;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
