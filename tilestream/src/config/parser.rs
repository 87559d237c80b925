//! INI parsing logic for converting `Ini` → `MapConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::{ConfigError, MapConfig};

/// Parse an `Ini` object into a `MapConfig`.
///
/// Starts from `MapConfig::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<MapConfig, ConfigError> {
    let mut config = MapConfig::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = non_empty(section, "url") {
            config.server_url = v.to_string();
        }
        if let Some(v) = non_empty(section, "format") {
            config.image_format = v.to_lowercase();
        }
        if let Some(v) = non_empty(section, "user_agent") {
            config.user_agent = v.to_string();
        }
        if let Some(v) = parse_value(section, "server", "timeout", "expected seconds")? {
            config.request_timeout_secs = v;
        }
    }

    // [map] section
    if let Some(section) = ini.section(Some("map")) {
        if let Some(v) = parse_value(section, "map", "min_zoom", "expected an integer")? {
            config.min_zoom = v;
        }
        if let Some(v) = parse_value(section, "map", "max_zoom", "expected an integer")? {
            config.max_zoom = v;
        }
        if let Some(v) = parse_value(section, "map", "zoom", "expected an integer")? {
            config.zoom = v;
        }
        if let Some(v) = parse_value(section, "map", "width", "expected pixels")? {
            config.map_size.width = v;
        }
        if let Some(v) = parse_value(section, "map", "height", "expected pixels")? {
            config.map_size.height = v;
        }
        if let Some(v) = parse_value(section, "map", "latitude", "expected degrees")? {
            config.center.0 = v;
        }
        if let Some(v) = parse_value(section, "map", "longitude", "expected degrees")? {
            config.center.1 = v;
        }
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = parse_value(section, "tiles", "size", "expected pixels")? {
            config.tile_size = v;
        }
        if let Some(v) = parse_value(section, "tiles", "cache_size", "expected a tile count")? {
            config.cache_size = v;
        }
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(v) = non_empty(section, key) else {
        return Ok(None);
    };
    v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
        section: section_name.to_string(),
        key: key.to_string(),
        value: v.to_string(),
        reason: reason.to_string(),
    })
}
