pub mod application;
pub mod aws;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod kube;
