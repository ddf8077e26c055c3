pub mod toml_config;

pub use toml_config::{
    DeductionConfig, LevelCapConfig, LevelUpConfig, LevelsConfig, LogFormat, LoggingConfig,
    MissingRecordPolicy, MultiplierConfig,
};
