use medley::config::parse_toml_config;
use medley::source::Source;

#[test]
fn qobuz_credentials_require_both_fields() {
    let cfg = parse_toml_config(
        r#"
[qobuz]
email_or_userid = "user@example.com"
password_or_token = "secret"
"#,
    )
    .unwrap();
    let q = cfg.qobuz.ready().expect("qobuz should be configured");
    assert_eq!(q.email_or_userid, "user@example.com");
    assert_eq!(q.password_or_token, "secret");
    assert!(q.app_id.is_none());
}

#[test]
fn qobuz_missing_password_is_unconfigured() {
    let cfg = parse_toml_config(
        r#"
[qobuz]
email_or_userid = "user@example.com"
"#,
    )
    .unwrap();
    assert!(cfg.qobuz.is_none());
}

#[test]
fn empty_config_has_no_credentials_configured() {
    let cfg = parse_toml_config("").unwrap();
    assert!(cfg.qobuz.is_none());
    assert!(cfg.tidal.is_none());
    assert!(cfg.deezer.is_none());
    assert!(cfg.soundcloud.is_none());
}

#[test]
fn downloads_defaults_clamp_max_connections_to_at_least_one() {
    let cfg = parse_toml_config(
        r#"
[downloads]
max_connections = 0
"#,
    )
    .unwrap();
    assert_eq!(cfg.downloads.max_connections, 1);
}

#[test]
fn database_paths_default_under_config_dir_when_unset() {
    let cfg = parse_toml_config("").unwrap();
    assert!(cfg.database.downloads_enabled);
    assert!(cfg.database.downloads_path.ends_with("downloads.db"));
    assert!(cfg.database.failed_downloads_path.ends_with("failed_downloads.db"));
}

#[test]
fn conversion_defaults_to_disabled_flac() {
    let cfg = parse_toml_config("").unwrap();
    assert!(!cfg.conversion.enabled);
    assert_eq!(cfg.conversion.codec, "flac");
    assert_eq!(cfg.conversion.sampling_rate, 44100);
    assert_eq!(cfg.conversion.bit_depth, 16);
}

#[test]
fn lastfm_sources_parse_from_strings() {
    let cfg = parse_toml_config(
        r#"
[lastfm]
source = "qobuz"
fallback_source = "tidal"
"#,
    )
    .unwrap();
    assert_eq!(cfg.lastfm.source, Some(Source::Qobuz));
    assert_eq!(cfg.lastfm.fallback_source, Some(Source::Tidal));
}

#[test]
fn lastfm_unknown_source_name_is_dropped_not_fatal() {
    let cfg = parse_toml_config(
        r#"
[lastfm]
source = "not-a-real-source"
"#,
    )
    .unwrap();
    assert_eq!(cfg.lastfm.source, None);
}

#[test]
fn soundcloud_app_version_defaults_when_client_id_present() {
    let cfg = parse_toml_config(
        r#"
[soundcloud]
client_id = "abc123"
"#,
    )
    .unwrap();
    let s = cfg.soundcloud.ready().expect("soundcloud should be configured");
    assert_eq!(s.client_id, "abc123");
    assert_eq!(s.app_version, "0");
}
