//! ログ初期化
//!
//! 進捗表示は標準出力（println!）、診断ログは tracing で標準エラーへ出す。
//! RUST_LOG が設定されていればそれを優先する。

use tracing_subscriber::EnvFilter;

/// 既定のフィルタ
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "preventivo_rust=debug,preventivo_common=debug,warn"
    } else {
        "warn"
    }
}

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // テストなどで二重初期化された場合は無視
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "warn");
        assert!(default_filter(true).contains("preventivo_rust=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
