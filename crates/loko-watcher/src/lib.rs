//! Loko Watcher — notify-backed file watching for the project tree

pub mod watcher;

pub use watcher::NotifyWatcher;
