pub(crate) mod types;

mod parsing;
mod secret;
mod settings;

pub(crate) use types::Settings;
