use clap::Parser;
use std::path::{Path, PathBuf};
use thermal_review::{cli, config, error, image_payload, persistence, review};
use thermal_review::analyzer::{self, AnalysisRequest, Analyzer, HttpAnalyzer};
use cli::{Cli, Commands};
use config::Config;
use error::{Result, ReviewError};
use thermal_review_common::{validate_threshold, AnalysisOutcome, ReviewSession};

const FAILURE_PREFIX: &str = "❌ ";

fn init_logging(verbose: bool, config: &Config) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[tokio::main]
async fn main() {
    // 失敗時は Display 形式のメッセージを stderr の最終行に出す
    if let Err(e) = run().await {
        eprintln!("{}{}", FAILURE_PREFIX, e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Analyze { input, baseline, maintenance, inspection_id, threshold, output } => {
            println!("🌡 thermal-review - アノマリ解析\n");
            let threshold = threshold.unwrap_or(config.default_threshold);
            let analyzer = HttpAnalyzer::from_config(&config)?;
            println!("  サーバー: {}", analyzer.url());

            match input {
                Some(input) => {
                    analyze_record(&analyzer, &input, baseline, maintenance, threshold, output.as_deref())
                        .await?;
                }
                None => {
                    analyze_pair(&analyzer, &inspection_id, baseline, maintenance, threshold, output.as_deref())
                        .await?;
                }
            }
            println!("\n✅ 解析完了");
        }

        Commands::Review { input, output } => {
            review::run_interactive_review(&input, output.as_deref())?;
        }

        Commands::Show { input } => {
            let inspection = persistence::load_inspection(&input)?;
            let session = ReviewSession::from_inspection(inspection);
            review::print_log(&session);
        }

        Commands::Migrate { input, output, dry_run } => {
            println!("🔧 thermal-review - レコード正規化\n");
            let inspection = persistence::load_inspection(&input)?;
            let json = serde_json::to_string_pretty(&inspection)?;
            if dry_run {
                println!("{}", json);
                println!("\n(ドライラン: 書き込みは行いません)");
            } else {
                let target = output.unwrap_or(input);
                persistence::save_inspection(&target, &inspection)?;
                println!("✔ 正規化して保存: {}", target.display());
            }
        }

        Commands::Save { input, file } => {
            println!("💾 thermal-review - 注釈保存\n");
            let inspection = persistence::load_inspection(&input)?;
            let request = ReviewSession::from_inspection(inspection).save_request();
            let saved = match file {
                Some(path) => {
                    let sink = persistence::FileAnnotationSink::new(&path);
                    persistence::save_best_effort(&sink, &request).await
                }
                None => {
                    let sink = persistence::HttpAnnotationSink::from_config(&config)?;
                    persistence::save_best_effort(&sink, &request).await
                }
            };
            if saved {
                println!("✔ {}件の注釈を保存しました", request.anomalies.len());
            } else if request.anomalies.is_empty() {
                println!("保存する注釈がありません");
            } else {
                println!("⚠ 保存できませんでした（ログを確認してください）");
            }
        }

        Commands::Config { set_server_url, show } => {
            let mut config = config;

            if let Some(url) = set_server_url {
                config.set_server_url(url)?;
                println!("✔ サーバーURLを設定しました");
            }

            if show {
                println!("設定:");
                println!("  サーバー: {}", config.server_url());
                println!("  解析エンドポイント: {}", config.analyze_url());
                println!("  保存エンドポイント: {}", config.save_url());
                println!("  しきい値: {}", config.default_threshold);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  ログレベル: {}", config.log_level);
            }
        }
    }

    Ok(())
}

/// 検査レコードの画像で解析し、結果をレコードに書き戻す
async fn analyze_record(
    analyzer: &HttpAnalyzer,
    input: &Path,
    baseline: Option<PathBuf>,
    maintenance: Option<PathBuf>,
    threshold: f32,
    output: Option<&Path>,
) -> Result<()> {
    let inspection = persistence::load_inspection(input)?;
    let base_dir = input.parent().unwrap_or(Path::new("."));
    let mut session = ReviewSession::from_inspection(inspection);

    if let Some(path) = baseline {
        let weather = session.inspection().baseline_weather;
        session.attach_baseline(image_payload::command_line_image_ref(&path)?, &now_stamp(), weather);
    }
    if let Some(path) = maintenance {
        let weather = session.inspection().maintenance_weather;
        session.attach_maintenance(image_payload::command_line_image_ref(&path)?, &now_stamp(), weather);
    }
    session
        .set_threshold(threshold)
        .map_err(|_| ReviewError::InvalidThreshold(threshold))?;

    println!("[1/2] 解析中... (検査 {}, しきい値 {:.2})", session.inspection_id(), threshold);
    let result = analyzer::run_analysis(&mut session, analyzer, analyzer.client(), base_dir).await;

    // 失敗時も進捗（Failed）は記録する
    println!("[2/2] 結果を保存中...");
    let target = output.unwrap_or(input);
    persistence::save_inspection(target, &session.to_inspection())?;
    println!("✔ 結果を保存: {}", target.display());

    match result? {
        AnalysisOutcome::Applied(count) => println!("✔ {}件のアノマリを検出", count),
        AnalysisOutcome::Discarded => println!("結果は破棄されました"),
    }
    Ok(())
}

/// 画像ペアだけで解析し、レスポンスJSONを出力
async fn analyze_pair(
    analyzer: &HttpAnalyzer,
    inspection_id: &str,
    baseline: Option<PathBuf>,
    maintenance: Option<PathBuf>,
    threshold: f32,
    output: Option<&Path>,
) -> Result<()> {
    let baseline = baseline.ok_or_else(|| ReviewError::MissingInput("--baseline".into()))?;
    let maintenance = maintenance.ok_or_else(|| ReviewError::MissingInput("--maintenance".into()))?;
    validate_threshold(threshold).map_err(|_| ReviewError::InvalidThreshold(threshold))?;

    println!("[1/3] 画像を読み込み中...");
    let baseline = image_payload::read_image_file(&baseline).await?;
    let maintenance = image_payload::read_image_file(&maintenance).await?;
    println!(
        "✔ {} ({}x{}) / {} ({}x{})\n",
        baseline.file_name,
        baseline.natural.width,
        baseline.natural.height,
        maintenance.file_name,
        maintenance.natural.width,
        maintenance.natural.height
    );

    println!("[2/3] 解析中...");
    let request = AnalysisRequest {
        inspection_id: inspection_id.to_string(),
        baseline,
        maintenance,
        threshold,
    };
    let response = analyzer.analyze(&request).await?;
    println!("✔ {}件のアノマリを検出\n", response.anomalies.len());

    println!("[3/3] 出力中...");
    let json = serde_json::to_string_pretty(&response)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("✔ 結果を保存: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
