//! 対話式レビュー（ターミナル版）
//!
//! 解析ログを表示しながら削除・復元・コメント・分類・手動追加を行い、
//! 検査レコードJSONに書き戻す。

use crate::error::{Result, ReviewError};
use crate::image_payload::{decode_data_url, resolve_image_ref, ImageRef};
use crate::persistence::{load_inspection, save_inspection};
use dialoguer::{Confirm, Input, Select};
use std::path::Path;
use thermal_review_common::{
    log_rows, LogRow, Rect, ReviewSession, Size, MANUAL_CLASSIFICATIONS,
};

/// 対話アクション（番号は解析ログの行番号、復元は削除済み一覧の番号）
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewAction {
    /// 一覧を再表示
    List,
    /// 削除
    Delete(usize),
    /// 削除済みを復元
    Restore(usize),
    /// コメントを設定
    Comment(usize, String),
    /// 分類を選択（手動分のみ）
    Classify(usize),
    /// 手動で矩形を追加
    Add(Rect),
    /// 注釈をすべて消去
    Clear,
    /// レビュー完了
    Complete,
    /// 保存して終了
    Quit,
}

pub const HELP: &str =
    "操作: [l]一覧 [d N]削除 [r N]復元 [c N 文]コメント [k N]分類 [a x y w h]追加 [clear]全消去 [done]完了 [q]保存終了";

/// 入力行をアクションに変換
pub fn parse_review_action(input: &str) -> std::result::Result<ReviewAction, String> {
    let trimmed = input.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (trimmed, ""),
    };

    let number = |s: &str| -> std::result::Result<usize, String> {
        s.parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("番号を指定してください: '{}'", s))
    };

    match head {
        "" | "l" => Ok(ReviewAction::List),
        "d" => Ok(ReviewAction::Delete(number(rest)?)),
        "r" => Ok(ReviewAction::Restore(number(rest)?)),
        "k" => Ok(ReviewAction::Classify(number(rest)?)),
        "c" => {
            let (n, text) = match rest.split_once(char::is_whitespace) {
                Some((n, t)) => (n, t.trim()),
                None => (rest, ""),
            };
            Ok(ReviewAction::Comment(number(n)?, text.to_string()))
        }
        "a" => {
            let values: Vec<f32> = rest
                .split_whitespace()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| "a x y w h の形式で数値を指定してください".to_string())?;
            match values.as_slice() {
                [x, y, w, h] => Ok(ReviewAction::Add(Rect::new(*x, *y, *w, *h))),
                _ => Err("a x y w h の形式で数値を指定してください".to_string()),
            }
        }
        "clear" => Ok(ReviewAction::Clear),
        "done" => Ok(ReviewAction::Complete),
        "q" | "Q" => Ok(ReviewAction::Quit),
        other => Err(format!("不明な操作: {}", other)),
    }
}

/// 画像参照から自然サイズを取得（取得できなければ未確定）
pub fn natural_size_of(reference: &str, base_dir: &Path) -> Size {
    let size = match resolve_image_ref(reference, base_dir) {
        ImageRef::File(path) => image::image_dimensions(&path)
            .map(|(w, h)| Size::new(w as f32, h as f32))
            .ok(),
        ImageRef::DataUrl(url) => decode_data_url(&url).map(|p| p.natural).ok(),
        ImageRef::Remote(_) => None,
    };
    size.unwrap_or_else(Size::unknown)
}

pub fn print_log(session: &ReviewSession) {
    let progress = session.progress();
    println!("検査 {} [{}]", session.inspection_id(), session.status().label());
    for (label, status) in progress.stages() {
        println!("  {:<22} {}", label, status.label());
    }
    println!();

    let rows = log_rows(session.store());
    if rows.is_empty() {
        println!("  (アノマリなし)");
    }
    for row in &rows {
        print_row(row);
    }

    let deleted: Vec<_> = session.store().deleted().collect();
    if !deleted.is_empty() {
        println!("\n削除済み:");
        for (i, a) in deleted.iter().enumerate() {
            println!("  r{} {} ({})", i + 1, a.id, a.source.label());
        }
    }
    println!();
}

fn print_row(row: &LogRow) {
    println!(
        "  #{:<3} {:<6} {:<18} {:<20} {}",
        row.number, row.origin, row.badge, row.classification, row.details()
    );
    if !row.comment.is_empty() {
        for line in row.comment.lines() {
            println!("        💬 {}", line);
        }
    }
}

fn row_id(session: &ReviewSession, number: usize) -> Result<String> {
    log_rows(session.store())
        .into_iter()
        .find(|r| r.number == number)
        .map(|r| r.id)
        .ok_or_else(|| ReviewError::MissingInput(format!("#{} は存在しません", number)))
}

/// 1アクションを適用。終了なら `false`。
fn apply_action(session: &mut ReviewSession, action: ReviewAction) -> Result<bool> {
    match action {
        ReviewAction::List => print_log(session),
        ReviewAction::Delete(n) => {
            let id = row_id(session, n)?;
            let is_ai = session.store().get(&id).map(|a| a.is_ai()).unwrap_or(false);
            let reason = if is_ai {
                let reason: String = Input::new()
                    .with_prompt("削除理由")
                    .allow_empty(true)
                    .interact_text()?;
                Some(reason)
            } else {
                None
            };
            session.delete(&id, reason.as_deref())?;
            println!("  → #{} を削除しました", n);
        }
        ReviewAction::Restore(n) => {
            let id = session
                .store()
                .deleted()
                .nth(n - 1)
                .map(|a| a.id.clone())
                .ok_or_else(|| ReviewError::MissingInput(format!("削除済み r{} は存在しません", n)))?;
            session.restore(&id)?;
            println!("  → {} を復元しました", id);
        }
        ReviewAction::Comment(n, text) => {
            let id = row_id(session, n)?;
            session.set_comment(&id, &text)?;
            println!("  → #{} のコメントを更新しました", n);
        }
        ReviewAction::Classify(n) => {
            let id = row_id(session, n)?;
            let selection = Select::new()
                .with_prompt("分類")
                .items(MANUAL_CLASSIFICATIONS)
                .default(0)
                .interact()?;
            session.set_classification(&id, Some(MANUAL_CLASSIFICATIONS[selection]))?;
            println!("  → #{} を {} に分類しました", n, MANUAL_CLASSIFICATIONS[selection]);
        }
        ReviewAction::Add(rect) => {
            let id = session.add_manual(rect)?;
            println!("  → {} を追加しました", id);
        }
        ReviewAction::Clear => {
            let confirmed = Confirm::new()
                .with_prompt("すべての注釈を消去しますか？")
                .default(false)
                .interact()?;
            if confirmed {
                session.clear_annotations();
                println!("  → 注釈を消去しました");
            }
        }
        ReviewAction::Complete => {
            let today = chrono::Local::now().format("%Y-%m-%d").to_string();
            session.complete_review(&today)?;
            println!("✔ レビュー完了 ({})", today);
        }
        ReviewAction::Quit => return Ok(false),
    }
    Ok(true)
}

/// 対話式レビュー
pub fn run_interactive_review(input_path: &Path, output_path: Option<&Path>) -> Result<()> {
    let inspection = load_inspection(input_path)?;
    let base_dir = input_path.parent().unwrap_or(Path::new("."));
    let mut session = ReviewSession::from_inspection(inspection);
    if let Some(reference) = session.maintenance_image().map(str::to_string) {
        session.set_maintenance_size(natural_size_of(&reference, base_dir));
    }

    println!("🔎 thermal-review - 対話レビュー\n");
    println!("---");
    println!("{}", HELP);
    println!("---\n");
    print_log(&session);

    loop {
        let input: String = Input::new()
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()?;

        match parse_review_action(&input) {
            Ok(action) => match apply_action(&mut session, action) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => println!("  ⚠ {}", e),
            },
            Err(message) => {
                println!("  ⚠ {}", message);
                println!("  {}", HELP);
            }
        }
    }

    session.close();
    let output = output_path.unwrap_or(input_path);
    save_inspection(output, &session.to_inspection())?;
    println!("\n✓ 保存しました: {}", output.display());

    Ok(())
}
