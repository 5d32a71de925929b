use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Huddle real-time chat server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "huddle-server", version, about = "Huddle real-time chat server")]
pub struct Config {
    /// HTTP/WebSocket listen port
    #[arg(long, env = "HUDDLE_PORT", default_value = "4000")]
    pub port: u16,

    /// Interface address to bind
    #[arg(long, env = "HUDDLE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to a TOML config file
    #[arg(long, default_value = "./huddle.toml")]
    pub config: String,

    /// Emit JSON log lines instead of pretty output
    #[arg(long, env = "HUDDLE_JSON_LOGS")]
    pub json_logs: bool,

    /// Print a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Directory for the database and signing secret
    #[arg(long, env = "HUDDLE_DATA_DIR", default_value = "./data")]
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            bind_address: "0.0.0.0".to_string(),
            config: "./huddle.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    /// Layered settings, lowest precedence first: built-in defaults, the
    /// TOML file, `HUDDLE_*` environment variables, CLI flags.
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("HUDDLE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Commented template for `--generate-config`.
pub fn generate_config_template() -> String {
    r#"# Huddle server configuration.
# Read from ./huddle.toml by default; point elsewhere with --config <path>.
# Every setting here can also be supplied as an environment variable
# (HUDDLE_PORT, HUDDLE_DATA_DIR, ...) or a CLI flag (--port, ...).

# HTTP/WebSocket listen port
# port = 4000

# Interface address to bind; 0.0.0.0 listens on all interfaces
# bind_address = "0.0.0.0"

# Emit JSON log lines (for container deployments)
# json_logs = false

# Directory holding the SQLite database and the JWT signing secret
# data_dir = "./data"
"#
    .to_string()
}
