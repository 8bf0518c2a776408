mod common;
mod committer;
mod queries;
