pub mod backend;
pub mod config;
pub mod convert;
pub mod credential;
pub mod deconvert;
pub mod error;
pub mod identity;
pub mod io;
pub mod lifecycle;
pub mod lookup;
pub mod model;
pub mod onboarding;
pub mod paths;
pub mod store;
pub mod studio;
pub mod types;

pub use backend::Backend;
pub use error::{Result, StudioError};
pub use studio::Studio;
