use crate::importer::{ImportMode, ImportOptions};
use crate::tracker::OutputMode;
use config::{Config, ConfigBuilder, ConfigError, Environment, File as ConfigFile, FileFormat};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "UPLOAD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub import_mode: ImportMode,
    pub preview: bool,
    pub allow_category_creation: bool,
    pub allow_deletes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortname_template: Option<String>,
    pub output: OutputMode,
    pub delimiter: String,
    pub enrol_plugins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let options = ImportOptions::default();
        Self {
            database_path: "course_upload.db".to_string(),
            import_mode: options.mode,
            preview: options.preview,
            allow_category_creation: options.allow_category_creation,
            allow_deletes: options.allow_deletes,
            shortname_template: None,
            output: OutputMode::default(),
            delimiter: ",".to_string(),
            enrol_plugins: options.enrol_plugins,
        }
    }
}

impl AppConfig {
    /// `Config.toml` in the working directory (optional), overlaid by
    /// `UPLOAD_*` environment variables.
    pub fn load() -> Result<AppConfig, ConfigError> {
        let builder = Config::builder().add_source(ConfigFile::with_name("Config").required(false));
        Self::build(builder)
    }

    pub fn from_toml_str(contents: &str) -> Result<AppConfig, ConfigError> {
        let builder = Config::builder().add_source(ConfigFile::from_str(contents, FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("enrol_plugins"),
            )
            .build()?
            .try_deserialize::<AppConfig>()
    }

    /// The CSV delimiter as a single byte.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ if self.delimiter == "\\t" || self.delimiter == "tab" => Ok(b'\t'),
            _ => Err(ConfigError::Message(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            ))),
        }
    }

    pub fn import_options(&self) -> Result<ImportOptions, ConfigError> {
        Ok(ImportOptions {
            mode: self.import_mode,
            preview: self.preview,
            allow_category_creation: self.allow_category_creation,
            allow_deletes: self.allow_deletes,
            shortname_template: self
                .shortname_template
                .clone()
                .filter(|t| !t.is_empty()),
            enrol_plugins: self.enrol_plugins.clone(),
            delimiter: self.delimiter_byte()?,
        })
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
