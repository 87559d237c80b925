//! Command-line arguments and how they overlay the configuration.

use std::path::PathBuf;

use clap::Parser;
use tilestream::config::MapConfig;
use tilestream::gpu::SurfaceSize;

/// Stream slippy-map tiles and render the view to a PNG.
#[derive(Debug, Parser)]
#[command(name = "tilestream", version, about)]
pub struct Args {
    /// Map tile server URL with trailing /
    #[arg(short = 's', long, value_name = "URL")]
    pub server_url: Option<String>,

    /// Map tile image format (e.g. png)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub image_format: Option<String>,

    /// Map minimum zoom level
    #[arg(long, value_name = "ZOOM")]
    pub min_zoom: Option<i32>,

    /// Map maximum zoom level
    #[arg(long, value_name = "ZOOM")]
    pub max_zoom: Option<i32>,

    /// Map tile size in pixels (e.g. 256)
    #[arg(short = 't', long, value_name = "SIZE")]
    pub tile_size: Option<u32>,

    /// Map tile cache size in tiles (e.g. 512)
    #[arg(short = 'c', long, value_name = "TILES")]
    pub cache_size: Option<usize>,

    /// Configuration file [default: ~/.tilestream/config.ini]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Starting zoom level
    #[arg(long, value_name = "ZOOM")]
    pub zoom: Option<i32>,

    /// Map centre as LAT,LON
    #[arg(long, value_name = "LAT,LON", value_parser = parse_center, allow_hyphen_values = true)]
    pub center: Option<(f64, f64)>,

    /// Viewport size as WIDTHxHEIGHT
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub size: Option<SurfaceSize>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Drag the map by DX,DY pixels after loading (repeatable)
    #[arg(long, value_name = "DX,DY", value_parser = parse_pan, allow_hyphen_values = true)]
    pub pan: Vec<(i32, i32)>,

    /// Where to save the rendered view
    #[arg(short = 'o', long, value_name = "PNG", default_value = "map.png")]
    pub output: PathBuf,

    /// Give up waiting for tiles after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub wait: u64,
}

impl Args {
    /// Overlay the command-line options onto `config`.
    pub fn apply(&self, config: &mut MapConfig) {
        if let Some(v) = &self.server_url {
            config.server_url = v.clone();
        }
        if let Some(v) = &self.image_format {
            config.image_format = v.to_lowercase();
        }
        if let Some(v) = self.min_zoom {
            config.min_zoom = v;
        }
        if let Some(v) = self.max_zoom {
            config.max_zoom = v;
        }
        if let Some(v) = self.tile_size {
            config.tile_size = v;
        }
        if let Some(v) = self.cache_size {
            config.cache_size = v;
        }
        if let Some(v) = self.zoom {
            config.zoom = v;
        }
        if let Some(v) = self.center {
            config.center = v;
        }
        if let Some(v) = self.size {
            config.map_size = v;
        }
        if let Some(v) = self.timeout {
            config.request_timeout_secs = v;
        }
    }
}

fn parse_pair<T: std::str::FromStr>(s: &str, sep: char, what: &str) -> Result<(T, T), String> {
    let (a, b) = s
        .split_once(sep)
        .ok_or_else(|| format!("expected {}", what))?;
    let a = a.trim().parse().map_err(|_| format!("expected {}", what))?;
    let b = b.trim().parse().map_err(|_| format!("expected {}", what))?;
    Ok((a, b))
}

fn parse_center(s: &str) -> Result<(f64, f64), String> {
    parse_pair(s, ',', "LAT,LON")
}

fn parse_size(s: &str) -> Result<SurfaceSize, String> {
    let (width, height) = parse_pair(&s.to_lowercase(), 'x', "WIDTHxHEIGHT")?;
    Ok(SurfaceSize::new(width, height))
}

fn parse_pan(s: &str) -> Result<(i32, i32), String> {
    parse_pair(s, ',', "DX,DY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_center() {
        assert_eq!(parse_center("51.5,-0.12"), Ok((51.5, -0.12)));
        assert_eq!(parse_center(" 10 , 20 "), Ok((10.0, 20.0)));
        assert!(parse_center("51.5").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480"), Ok(SurfaceSize::new(640, 480)));
        assert_eq!(parse_size("640X480"), Ok(SurfaceSize::new(640, 480)));
        assert!(parse_size("640-480").is_err());
        assert!(parse_size("-1x480").is_err());
    }

    #[test]
    fn test_parse_pan() {
        assert_eq!(parse_pan("-100,25"), Ok((-100, 25)));
        assert!(parse_pan("left").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "tilestream",
            "-s",
            "http://tiles.example.com/",
            "-f",
            "JPG",
            "--max-zoom",
            "12",
            "-t",
            "512",
            "-c",
            "32",
            "--center",
            "-33.86,151.2",
            "--size",
            "800x600",
            "--pan",
            "10,0",
            "--pan",
            "-5,-5",
        ]);
        let mut config = MapConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server_url, "http://tiles.example.com/");
        assert_eq!(config.image_format, "jpg");
        assert_eq!(config.max_zoom, 12);
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.cache_size, 32);
        assert_eq!(config.center, (-33.86, 151.2));
        assert_eq!(config.map_size, SurfaceSize::new(800, 600));
        assert_eq!(args.pan, vec![(10, 0), (-5, -5)]);
        assert_eq!(args.output, PathBuf::from("map.png"));
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let args = Args::parse_from(["tilestream"]);
        let mut config = MapConfig::default();
        args.apply(&mut config);
        assert_eq!(config, MapConfig::default());
    }
}
