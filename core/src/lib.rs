use std::{path::PathBuf, time::Duration};

use errors::DirectoryError;

pub mod config;
pub mod errors;
pub mod logger;
pub mod playback;
pub mod state;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

/// Format a duration as `HH:MM:SS.ss`.
#[must_use]
pub fn format_duration(duration: &Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = duration.as_secs_f64() % 60.0;

    format!("{hours:02}:{minutes:02}:{seconds:05.2}")
}

/// Get the config directory for cadence.
///
/// | Platform | Value                                                                 |
/// | -------- | --------------------------------------------------------------------- |
/// | Linux    | `$XDG_CONFIG_HOME/cadence` or `$HOME/.config/cadence`                 |
/// | macOS    | `$HOME/Library/Application Support/com.cadence.cadence`               |
/// | Windows  | `{FOLDERID_RoamingAppData}\cadence\cadence\config`                    |
///
/// # Errors
///
/// Returns [`DirectoryError::Config`] if no home directory can be found.
pub fn get_config_dir() -> Result<PathBuf, DirectoryError> {
    directories::ProjectDirs::from("com", "cadence", "cadence")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(DirectoryError::Config)
}

/// Get the data directory for cadence, where the offline audio cache lives by default.
///
/// # Errors
///
/// Returns [`DirectoryError::Data`] if no home directory can be found.
pub fn get_data_dir() -> Result<PathBuf, DirectoryError> {
    directories::ProjectDirs::from("com", "cadence", "cadence")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(DirectoryError::Data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_str_eq;
    use rstest::rstest;

    #[rstest]
    #[case::zero(Duration::from_secs(0), "00:00:00.00")]
    #[case::sub_second(Duration::from_millis(100), "00:00:00.10")]
    #[case::minutes(Duration::from_secs(61), "00:01:01.00")]
    #[case::hours(Duration::from_secs(3600 + 120 + 5), "01:02:05.00")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_str_eq!(format_duration(&duration), expected);
    }
}
