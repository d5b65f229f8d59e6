pub mod config_io;
pub mod editor;
pub mod recovery;
pub mod store;
pub mod watcher;
