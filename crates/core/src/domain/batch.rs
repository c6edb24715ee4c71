use serde::{Deserialize, Serialize};

/// ジョブ状態（相互排他。表示と実行可能アクションを決める）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

/// パイプラインで処理される1冊分のジョブ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub title: String,
    /// 安定識別子。欠落時は `BatchDocument::normalize` がタイトルから導出する
    #[serde(default)]
    pub slug: String,
    pub author: String,
    pub status: JobStatus,
    /// 未開始なら None または 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<u32>,
    /// 例: "1-8"（参考情報のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases_completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    /// status == completed のときのみ値を持つ
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<String>,
    /// status == failed のときのみ値を持つ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<String>,
}

impl BatchJob {
    pub fn new(title: impl Into<String>, author: impl Into<String>, status: JobStatus) -> Self {
        let title = title.into();
        Self {
            slug: derive_slug(&title),
            title,
            author: author.into(),
            status,
            current_phase: None,
            phases_completed: None,
            next_action: None,
            score: None,
            started_at: None,
            completed_at: None,
            paused_at: None,
            last_error: None,
            output_files: Vec::new(),
        }
    }

    /// 現在フェーズ（未開始は 0）
    pub fn phase(&self) -> u32 {
        self.current_phase.unwrap_or(0)
    }
}

/// 状態別の集計値。サーバーが供給する独立フィールドとして扱う
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub in_progress: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
}

impl BatchSummary {
    /// ジョブ一覧から集計し直す
    pub fn tally(jobs: &[BatchJob]) -> Self {
        let mut summary = Self {
            total: jobs.len() as u32,
            ..Self::default()
        };
        for job in jobs {
            match job.status {
                JobStatus::Pending => summary.pending += 1,
                JobStatus::InProgress => summary.in_progress += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// total == pending + in_progress + completed + failed か
    pub fn is_consistent(&self) -> bool {
        let sum = u64::from(self.pending)
            + u64::from(self.in_progress)
            + u64::from(self.completed)
            + u64::from(self.failed);
        u64::from(self.total) == sum
    }

    pub fn count(&self, status: JobStatus) -> u32 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::InProgress => self.in_progress,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub pipeline_version: String,
}

/// 取得対象のルートドキュメント。フェッチ成功のたびに丸ごと置き換える
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDocument {
    #[serde(default)]
    pub books: Vec<BatchJob>,
    #[serde(default)]
    pub summary: BatchSummary,
    #[serde(default)]
    pub metadata: BatchMetadata,
    #[serde(default)]
    pub sync_timestamp: String,
}

impl BatchDocument {
    /// slug が欠けたジョブにタイトル由来の slug を補う
    pub fn normalize(mut self) -> Self {
        for job in &mut self.books {
            if job.slug.trim().is_empty() {
                job.slug = derive_slug(&job.title);
            }
        }
        self
    }

    pub fn find(&self, slug: &str) -> Option<&BatchJob> {
        self.books.iter().find(|job| job.slug == slug)
    }
}

/// タイトルから slug を導出する（小文字英数字以外の連続は `_` 1文字に畳む）
pub fn derive_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// 追加リクエスト（入力は検証済み）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewJob {
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl NewJob {
    pub fn new(
        title: &str,
        author: &str,
        slug: Option<&str>,
    ) -> Result<Self, super::error::AppError> {
        let title = title.trim();
        let author = author.trim();
        if title.is_empty() || author.is_empty() {
            return Err(super::error::AppError::invalid_input(
                "Preencha título e autor.",
            ));
        }
        let slug = slug
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Self {
            title: title.to_string(),
            author: author.to_string(),
            slug,
        })
    }
}
