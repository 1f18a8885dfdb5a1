use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value {0}; set it in .env or the environment")]
    Missing(&'static str),
}

/// Everything read from the environment, captured once at startup. Each flow
/// asks for its own typed slice and only then learns whether a value is
/// missing, so an unconfigured mailer does not break the transcript browser.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    db_host: Option<String>,
    db_user: Option<String>,
    db_password: Option<String>,
    db_database: Option<String>,
    email_address: Option<String>,
    email_password: Option<String>,
    sheets_api_key: Option<String>,
    sheets_spreadsheet_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}/{}",
            self.user, self.password, self.host, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub api_key: String,
    pub spreadsheet_id: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            db_host: read_var("DB_HOST"),
            db_user: read_var("DB_USER"),
            db_password: read_var("DB_PASSWORD"),
            db_database: read_var("DB_DATABASE"),
            email_address: read_var("EMAIL_ADDRESS"),
            email_password: read_var("EMAIL_PASSWORD"),
            sheets_api_key: read_var("SHEETS_API_KEY"),
            sheets_spreadsheet_id: read_var("SHEETS_SPREADSHEET_ID"),
        }
    }

    pub fn database(&self) -> Result<DbConfig, ConfigError> {
        Ok(DbConfig {
            host: require(&self.db_host, "DB_HOST")?,
            user: require(&self.db_user, "DB_USER")?,
            password: require(&self.db_password, "DB_PASSWORD")?,
            database: require(&self.db_database, "DB_DATABASE")?,
        })
    }

    pub fn mail(&self) -> Result<MailConfig, ConfigError> {
        Ok(MailConfig {
            sender: require(&self.email_address, "EMAIL_ADDRESS")?,
            password: require(&self.email_password, "EMAIL_PASSWORD")?,
        })
    }

    pub fn sheets(&self) -> Result<SheetConfig, ConfigError> {
        Ok(SheetConfig {
            api_key: require(&self.sheets_api_key, "SHEETS_API_KEY")?,
            spreadsheet_id: require(&self.sheets_spreadsheet_id, "SHEETS_SPREADSHEET_ID")?,
        })
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn require(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value.clone().ok_or(ConfigError::Missing(name))
}
