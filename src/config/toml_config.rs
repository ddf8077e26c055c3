use crate::core::level_table::{LevelTable, ThresholdMode};
use crate::core::multiplier::PolicyKind;
use crate::domain::model::LevelDefinition;
use crate::utils::error::{LevelUpError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_positive_number,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelUpConfig {
    #[serde(default)]
    pub levels: LevelsConfig,
    #[serde(default)]
    pub multiplier: MultiplierConfig,
    pub level_cap: Option<LevelCapConfig>,
    #[serde(default)]
    pub deduction: DeductionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelsConfig {
    #[serde(default)]
    pub mode: ThresholdMode,
    #[serde(default)]
    pub definitions: Vec<LevelDefinition>,
    /// 選用的 CSV (level,next_level_experience)，會先於 `definitions` 載入
    pub csv_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiplierConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 啟用的 policy 名稱，可指向 `policies` 或程式註冊的 policy
    pub policy: Option<String>,
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyKind>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelCapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub level: u32,
    /// 達到上限等級後是否繼續累積點數
    #[serde(default = "default_true")]
    pub points_continue: bool,
}

/// 沒有經驗紀錄時 `deduct_points` 的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRecordPolicy {
    #[default]
    Ignore,
    Error,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeductionConfig {
    #[serde(default)]
    pub missing_record: MissingRecordPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_true() -> bool {
    true
}

impl LevelUpConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LevelUpError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| LevelUpError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${LEVEL_CAP})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// 建立等級表：先讀 CSV，再套用 TOML 中的定義
    pub fn level_table(&self) -> Result<LevelTable> {
        let mut table = match &self.levels.csv_path {
            Some(path) => LevelTable::from_csv_path(self.levels.mode, path)?,
            None => LevelTable::new(self.levels.mode),
        };
        table.add_many(self.levels.definitions.iter().copied())?;
        table.validate()?;
        Ok(table)
    }

    /// 只有啟用時才回傳等級上限
    pub fn active_level_cap(&self) -> Option<LevelCapConfig> {
        self.level_cap.filter(|cap| cap.enabled)
    }

    pub fn validate_config(&self) -> Result<()> {
        for definition in &self.levels.definitions {
            validate_positive_number("levels.definitions.level", definition.level, 1)?;
        }

        if let Some(path) = &self.levels.csv_path {
            validate_path("levels.csv_path", path)?;
            validate_file_extension("levels.csv_path", path, &["csv"])?;
        }

        for (name, kind) in &self.multiplier.policies {
            validate_non_empty_string("multiplier.policies", name)?;
            kind.validate(name)?;
        }

        if self.multiplier.enabled {
            // 選取器可以指向程式註冊的 policy，這裡只檢查存在與否
            let selector = crate::utils::validation::validate_required_field(
                "multiplier.policy",
                &self.multiplier.policy,
            )?;
            validate_non_empty_string("multiplier.policy", selector)?;
        }

        if let Some(cap) = self.active_level_cap() {
            validate_positive_number("level_cap.level", cap.level, 1)?;
        }

        if let Some(filter) = &self.logging.filter {
            validate_non_empty_string("logging.filter", filter)?;
        }

        Ok(())
    }
}

impl Validate for LevelUpConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
