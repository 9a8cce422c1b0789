//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# codepair configuration
# Only override what you want to change -- missing fields use defaults.

[server]
# api_base_url = "http://localhost:8000"
# ws_base_url = "ws://localhost:8000"

[sync]
# debounce_ms = 300                 # 0-10000
# reconnect_base_delay_ms = 1000    # 1-60000
# reconnect_max_delay_ms = 30000    # >= base, <= 600000
# max_reconnect_attempts = 5        # 0-100

[session]
# expiration_hours = 24             # 1-720

[relay]
# host = "0.0.0.0"
# port = 8000
# channel_capacity = 256

[logging]
level = "info"                      # trace | debug | info | warn | error
"##
    .to_string()
}
