pub fn default_service_name() -> String {
    "rangedesk".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_bounded_capacity() -> usize {
    60
}

pub fn default_decimation_ms() -> u64 {
    100
}

pub fn default_depth_levels() -> usize {
    20
}

pub fn default_recent_trades() -> usize {
    20
}

pub fn default_fee_cents() -> f64 {
    2.0
}

pub fn default_band_half_width() -> f64 {
    5.0
}

pub fn default_band_floor() -> f64 {
    0.0
}

pub fn default_band_ceiling() -> f64 {
    100.0
}

pub fn default_band_history_capacity() -> usize {
    100
}

pub fn default_volatility_history_capacity() -> usize {
    600
}

pub fn default_reconnect_delay_ms() -> u64 {
    1000
}

pub fn default_max_reconnect_attempts() -> u32 {
    5
}

pub fn default_channel_capacity() -> usize {
    1024
}

pub fn default_metrics_port() -> u16 {
    9464
}
