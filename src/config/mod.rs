mod settings;

pub use settings::{Command, Config, Settings, StreamSettings, WebSettings};
