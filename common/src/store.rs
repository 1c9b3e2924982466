//! 異常領域ストア
//!
//! 1検査分のアノマリを挿入順で保持する。すべての操作は新しいストアを返し、
//! 元のストアは変更しない（失敗時は呼び出し側の状態がそのまま残る）。
//!
//! 削除は論理削除。`deleted` フラグを立てるだけで監査用に保持し続ける。

use crate::anomaly::{
    Anomaly, AnomalySource, MIN_MANUAL_SIZE, UNKNOWN_CLASSIFICATION,
};
use crate::error::{Error, Result};
use crate::geometry::{Rect, Size};
use crate::parser::RawAnomaly;

const USER_ID_PREFIX: &str = "user_";
const LOCAL_AI_ID_PREFIX: &str = "ai_local_";

/// AIアノマリ削除時にコメントへ追記する監査文
pub fn deletion_note(reason: &str) -> String {
    format!("Deleted by user. Reason: {}", reason.trim())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnomalyStore {
    items: Vec<Anomaly>,
    next_local_id: u64,
}

impl AnomalyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みレコードから復元
    pub fn from_anomalies(items: Vec<Anomaly>) -> Self {
        Self { items, next_local_id: 0 }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 削除済みを含む全件（挿入順）
    pub fn all(&self) -> &[Anomaly] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Anomaly> {
        self.items
    }

    pub fn get(&self, id: &str) -> Option<&Anomaly> {
        self.items.iter().find(|a| a.id == id)
    }

    /// 表示対象（未削除のみ、挿入順を維持）
    pub fn visible(&self) -> impl Iterator<Item = &Anomaly> {
        self.items.iter().filter(|a| !a.deleted)
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    /// 論理削除済み
    pub fn deleted(&self) -> impl Iterator<Item = &Anomaly> {
        self.items.iter().filter(|a| a.deleted)
    }

    /// 手動描画の矩形を追加
    ///
    /// `bounds` は保守画像の自然サイズ。矩形は画像内に切り詰めてから
    /// 最小サイズ判定を行う。戻り値は新しいストアと採番したID。
    pub fn add_manual(&self, rect: Rect, bounds: Size) -> Result<(Self, String)> {
        let rect = if bounds.is_known() { rect.clamp_to(bounds) } else { rect };
        if !bounds.is_known()
            || !rect.is_finite()
            || rect.w < MIN_MANUAL_SIZE
            || rect.h < MIN_MANUAL_SIZE
        {
            return Err(Error::InvalidManualRect {
                width: rect.w,
                height: rect.h,
                min: MIN_MANUAL_SIZE,
            });
        }

        let mut next = self.clone();
        let id = next.fresh_id(USER_ID_PREFIX);
        next.items.push(Anomaly {
            id: id.clone(),
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            confidence: None,
            classification: None,
            severity: None,
            comment: String::new(),
            source: AnomalySource::User,
            deleted: false,
        });
        log::debug!("manual anomaly {} added at {:?}", id, rect);
        Ok((next, id))
    }

    /// AI解析結果で AI 由来の集合を丸ごと置き換える（手動分は残す）
    pub fn apply_ai_result(&self, raw: Vec<RawAnomaly>) -> Self {
        let mut next = self.clone();
        next.items.retain(|a| a.source != AnomalySource::Ai);

        for r in raw {
            let id = match r.id {
                Some(id) if next.get(&id).is_none() => id,
                _ => next.fresh_id(LOCAL_AI_ID_PREFIX),
            };
            next.items.push(Anomaly {
                id,
                x: r.x,
                y: r.y,
                w: r.w,
                h: r.h,
                confidence: r.confidence,
                classification: Some(
                    r.classification
                        .filter(|c| !c.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_CLASSIFICATION.to_string()),
                ),
                severity: r.severity,
                comment: r.comment.unwrap_or_default(),
                source: AnomalySource::Ai,
                deleted: false,
            });
        }

        log::debug!(
            "applied AI result: {} anomalies ({} total)",
            next.items.iter().filter(|a| a.is_ai()).count(),
            next.items.len()
        );
        next
    }

    /// 画像サイズが分かっていれば座標を画像内に切り詰めてから反映する
    pub fn apply_ai_result_within(&self, raw: Vec<RawAnomaly>, bounds: Size) -> Self {
        if !bounds.is_known() {
            return self.apply_ai_result(raw);
        }
        let clamped = raw
            .into_iter()
            .map(|r| {
                let rect = Rect::new(r.x, r.y, r.w, r.h).clamp_to(bounds);
                if rect != Rect::new(r.x, r.y, r.w, r.h) {
                    log::debug!("AI anomaly {:?} clamped to image bounds", r.id);
                }
                RawAnomaly { x: rect.x, y: rect.y, w: rect.w, h: rect.h, ..r }
            })
            .collect();
        self.apply_ai_result(clamped)
    }

    pub fn set_comment(&self, id: &str, text: &str) -> Result<Self> {
        self.update(id, |a| {
            a.comment = text.to_string();
            Ok(())
        })
    }

    /// 分類の変更。AI由来を読み取り専用にするかは呼び出し側の方針。
    pub fn set_classification(&self, id: &str, value: Option<&str>) -> Result<Self> {
        self.update(id, |a| {
            a.classification = value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            Ok(())
        })
    }

    /// 論理削除
    ///
    /// AI由来は理由必須。理由はコメントに追記される（既存コメントは残る）。
    /// 手動分は理由を無視する。
    pub fn delete(&self, id: &str, reason: Option<&str>) -> Result<Self> {
        self.update(id, |a| {
            if a.is_ai() {
                let reason = reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| Error::DeletionReasonRequired(a.id.clone()))?;
                let note = deletion_note(reason);
                a.comment = if a.comment.trim().is_empty() {
                    note
                } else {
                    format!("{}\n{}", a.comment, note)
                };
            }
            a.deleted = true;
            log::debug!("anomaly {} deleted", a.id);
            Ok(())
        })
    }

    /// 復元（コメントは消さない）
    pub fn restore(&self, id: &str) -> Result<Self> {
        self.update(id, |a| {
            a.deleted = false;
            Ok(())
        })
    }

    /// 全消去（物理削除。呼び出し側で確認すること）
    pub fn clear(&self) -> Self {
        Self {
            items: Vec::new(),
            next_local_id: self.next_local_id,
        }
    }

    fn update<F>(&self, id: &str, f: F) -> Result<Self>
    where
        F: FnOnce(&mut Anomaly) -> Result<()>,
    {
        let mut next = self.clone();
        let target = next
            .items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::UnknownAnomaly(id.to_string()))?;
        f(target)?;
        Ok(next)
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_local_id += 1;
            let candidate = format!("{}{}", prefix, self.next_local_id);
            if self.get(&candidate).is_none() {
                return candidate;
            }
        }
    }
}
