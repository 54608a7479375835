//! CLI command implementations

pub(crate) mod common;
pub(crate) mod history;
pub(crate) mod migrate;
pub(crate) mod query;
pub(crate) mod serve;
pub(crate) mod status;
