use crate::{AssemblyError, Result, SectionDescriptor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One block of the per-section skeleton.
///
/// Text fields are templates: `{title}`, `{folder_id}`, `{query_condition}`
/// and `{base_label}` are replaced with the descriptor's values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutStep {
    PageBreak,
    Heading { level: u8, text: String },
    Paragraph { text: String },
    /// 0-based index into the section's sorted image set.
    Image { slot: usize },
}

/// The ordered skeleton appended once per section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLayout {
    pub steps: Vec<LayoutStep>,
}

fn heading(level: u8, text: &str) -> LayoutStep {
    LayoutStep::Heading { level, text: text.to_string() }
}

fn paragraph(text: &str) -> LayoutStep {
    LayoutStep::Paragraph { text: text.to_string() }
}

fn image(slot: usize) -> LayoutStep {
    LayoutStep::Image { slot }
}

impl SectionLayout {
    /// Query / approve / return walkthrough with eleven screenshot slots.
    pub fn builtin() -> Self {
        use LayoutStep::PageBreak;

        let steps = vec![
            PageBreak,
            heading(2, "{title}，功能代碼:{folder_id}"),
            paragraph("在左側的功能選單中，點選「開關帳及TMP資料查詢放行」，接著點選「IFRS15查詢及放行」，最後再點選「{title}」，即可開啟視窗。"),
            image(0),
            // 查詢
            heading(3, "查詢功能"),
            heading(4, "查詢所有資料"),
            paragraph("不輸入查詢條件，直接點擊查詢按鈕即可查詢所有資料。"),
            image(1),
            heading(4, "查詢特定資料"),
            paragraph("查詢條件為：{query_condition}"),
            paragraph("先輸入查詢條件，再點擊查詢按鈕即可查詢特定資料。"),
            image(2),
            PageBreak,
            heading(4, "查詢結果"),
            image(3),
            // 核可
            heading(3, "核可功能"),
            paragraph("若要執行核可功能，需先點擊查詢，確認有資料且資料無誤後再點擊核可按鈕。"),
            heading(4, "已查詢且有資料，點擊核可按鈕"),
            image(4),
            PageBreak,
            paragraph("跳出確認訊息。"),
            image(5),
            paragraph("點擊確認，完成核可後顯示核可者、核可時間"),
            image(6),
            PageBreak,
            heading(4, "未查詢或無資料，點擊核可按鈕"),
            paragraph("若未查詢或無資料就直接點擊核可按鈕，將會跳出警告。"),
            image(7),
            // 退回
            heading(3, "退回"),
            paragraph("若已完成核可要執行退回功能，可直接點擊退回按鈕。"),
            image(8),
            PageBreak,
            paragraph("跳出確認訊息。"),
            image(9),
            paragraph("點擊確認，退回後不再顯示核可者、核可時間"),
            image(10),
        ];

        Self { steps }
    }

    /// Load a replacement skeleton, e.g. a translated one.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_err = |message: String| AssemblyError::Config {
            path: path.to_path_buf(),
            message,
        };

        let raw = fs::read_to_string(path)?;
        let layout: SectionLayout = serde_json::from_str(&raw).map_err(|e| config_err(e.to_string()))?;

        if let Some(level) = layout.steps.iter().find_map(|step| match step {
            LayoutStep::Heading { level, .. } if !(1..=9).contains(level) => Some(*level),
            _ => None,
        }) {
            return Err(config_err(format!("heading level {} is outside 1..=9", level)));
        }
        Ok(layout)
    }

    pub fn image_slots(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, LayoutStep::Image { .. }))
            .count()
    }

    pub fn page_breaks(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, LayoutStep::PageBreak))
            .count()
    }
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Substitute descriptor fields into a layout text template.
pub fn render_template(template: &str, section: &SectionDescriptor) -> String {
    template
        .replace("{title}", &section.title)
        .replace("{folder_id}", &section.folder_id)
        .replace("{query_condition}", &section.query_condition)
        .replace("{base_label}", &section.base_label)
}
