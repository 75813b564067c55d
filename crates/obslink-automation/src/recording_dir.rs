//! 녹화 디렉토리 정책.
//!
//! 지역 이름이 있으면 하위 디렉토리로 붙이거나(`include_territory`),
//! 파일명 형식 뒤에 접미사로 붙인다(`zone_as_suffix`).

use obslink_core::config::RecordingConfig;
use std::path::Path;

/// 녹화 시작 전에 원격에 설정할 값
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingTarget {
    /// 녹화 디렉토리. 비어 있으면 원격 설정을 건드리지 않는다.
    pub directory: String,
    pub filename_format: String,
}

/// 설정과 현재 지역으로 녹화 대상 계산
pub fn recording_target(config: &RecordingConfig, territory: Option<&str>) -> RecordingTarget {
    let mut target = RecordingTarget {
        directory: config.record_dir.clone(),
        filename_format: config.filename_format.clone(),
    };

    let zone = territory
        .filter(|_| config.include_territory)
        .map(sanitize)
        .filter(|zone| !zone.is_empty());
    let Some(zone) = zone else {
        return target;
    };

    if config.zone_as_suffix {
        target.filename_format = format!("{} {}", config.filename_format, zone);
    } else if !config.record_dir.is_empty() {
        target.directory = Path::new(&config.record_dir)
            .join(zone)
            .to_string_lossy()
            .into_owned();
    }
    target
}

/// 경로에 쓸 수 없는 문자를 `_`로 바꾸고 양끝 공백과 마침표를 제거
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(record_dir: &str) -> RecordingConfig {
        RecordingConfig {
            record_dir: record_dir.to_string(),
            ..RecordingConfig::default()
        }
    }

    #[test]
    fn territory_becomes_subdirectory() {
        let target = recording_target(&config("/videos"), Some("The Aetherfont"));
        assert_eq!(
            Path::new(&target.directory),
            Path::new("/videos").join("The Aetherfont")
        );
        assert_eq!(target.filename_format, "%CCYY-%MM-%DD %hh-%mm-%ss");
    }

    #[test]
    fn territory_as_suffix_keeps_directory() {
        let mut cfg = config("/videos");
        cfg.zone_as_suffix = true;
        let target = recording_target(&cfg, Some("Eden's Promise: Eternity"));
        assert_eq!(target.directory, "/videos");
        assert_eq!(
            target.filename_format,
            "%CCYY-%MM-%DD %hh-%mm-%ss Eden's Promise_ Eternity"
        );
    }

    #[test]
    fn no_territory_or_disabled() {
        let target = recording_target(&config("/videos"), None);
        assert_eq!(target.directory, "/videos");

        let mut cfg = config("/videos");
        cfg.include_territory = false;
        let target = recording_target(&cfg, Some("Limsa Lominsa"));
        assert_eq!(target.directory, "/videos");
    }

    #[test]
    fn empty_record_dir_is_left_alone() {
        let target = recording_target(&config(""), Some("Limsa Lominsa"));
        assert!(target.directory.is_empty());
    }

    #[test]
    fn sanitize_strips_path_characters() {
        assert_eq!(sanitize("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize("  Ul'dah. "), "Ul'dah");
        assert_eq!(sanitize("..."), "");
    }
}
