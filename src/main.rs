use clap::Parser;
use regie_enroll::adapters::roster_csv::export_roster;
use regie_enroll::utils::error::ErrorSeverity;
use regie_enroll::utils::{logger, validation::Validate};
use regie_enroll::{
    BatchRunner, CliConfig, EnrollError, RegistrationModifier, RegistrationService, TomlConfig,
};
use std::path::Path;
use std::sync::Arc;

/// 有學生在換課時失去註冊
const EXIT_LOST_ENROLLMENT: i32 = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting regie-enroll");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(concurrent) = args.concurrent {
        config.run.concurrent = concurrent;
        tracing::info!("🔧 Concurrent mode overridden to: {}", concurrent);
    }
    if let Some(path) = &args.roster_output {
        config.run.roster_output = Some(path.clone());
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!(
        "✅ Configuration loaded: {} courses, {} sections, {} students, {} requests",
        config.courses.len(),
        config.sections.len(),
        config.students.len(),
        config.requests.len()
    );

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No requests will be executed");
        for (index, request) in config.requests.iter().enumerate() {
            println!("{:>3}: {}", index, serde_json::to_string(request)?);
        }
        return Ok(());
    }

    match run(&config).await {
        Ok(lost) if lost > 0 => {
            eprintln!("⚠️ {} swap(s) left a student without either section", lost);
            std::process::exit(EXIT_LOST_ENROLLMENT);
        }
        Ok(_) => {
            println!("✅ All requests processed");
        }
        Err(e) => {
            tracing::error!(
                "❌ Enrollment run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            if e.is_retryable() {
                tracing::warn!("🔁 The failure is transient; re-running the batch may succeed");
            }
            eprintln!("❌ {}", e.user_friendly_message());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

/// 執行請求腳本，回傳失去註冊的換課數
async fn run(config: &TomlConfig) -> Result<usize, EnrollError> {
    let store = Arc::new(config.build_store().await?);
    let service = RegistrationService::new(Arc::clone(&store), &config.settings);
    let runner = BatchRunner::new(RegistrationModifier::new(service), config.is_concurrent());

    let report = runner.run(config.requests.clone()).await?;
    for result in &report.results {
        println!("{}", serde_json::to_string(result)?);
    }

    if let Some(path) = config.roster_output() {
        let rows = export_roster(store.as_ref(), Path::new(path)).await?;
        tracing::info!("📁 Roster ({} rows) saved to: {}", rows, path);
    }

    Ok(report.lost_enrollments().len())
}
