pub mod app;
pub mod capture;
pub mod input;
pub mod render;
pub mod theme;

pub use app::run;
