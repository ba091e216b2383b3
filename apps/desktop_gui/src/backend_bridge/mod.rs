//! Backend bridge: command queue types and the worker thread that runs the dashboard.

pub mod commands;
pub mod runtime;
