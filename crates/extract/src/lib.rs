pub mod config;
pub mod error;
pub mod llm;
pub mod normalizer;
pub mod schema;
pub mod session;

pub use config::AnalyzerConfig;
pub use error::AnalyzeError;
pub use llm::AnalyzerClient;
pub use normalizer::{TaskNormalizer, build_display_view, infer_priority, resolve_field};
pub use schema::{AnalysisResult, ApiResponse, DisplayField, DisplayView, TaskGroup, TaskRecord};
pub use session::{Resolution, Session, SessionError, SubmissionState, Ticket};

use tokio_util::sync::CancellationToken;

/// One completed submission: the service envelope and what to show for it.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub response: ApiResponse,
    pub view: DisplayView,
}

impl Analysis {
    /// Pretty-printed payload, only when there is nothing structured to show.
    pub fn raw_payload(&self) -> Option<String> {
        match self.view {
            DisplayView::None => serde_json::to_string_pretty(&self.response.payload).ok(),
            _ => None,
        }
    }
}

pub struct TaskAnalyzer {
    client: AnalyzerClient,
    normalizer: TaskNormalizer,
    temperature: f64,
}

impl TaskAnalyzer {
    pub fn new(client: AnalyzerClient, temperature: f64) -> Self {
        Self {
            client,
            normalizer: TaskNormalizer::new(),
            temperature,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> error::Result<Self> {
        Ok(Self::new(AnalyzerClient::new(config)?, config.temperature))
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    /// Send `text` for analysis and shape the result for display
    pub async fn analyze_text(&self, text: &str) -> error::Result<Analysis> {
        self.analyze_text_with_cancel(text, &CancellationToken::new())
            .await
    }

    pub async fn analyze_text_with_cancel(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> error::Result<Analysis> {
        let response = self
            .client
            .analyze_with_cancel(text, self.temperature, cancel)
            .await?;

        let result = response.analysis();
        let view = self.normalizer.build_display_view(result.as_ref(), text);

        Ok(Analysis { response, view })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn analyzer_for(url: String) -> TaskAnalyzer {
        let config = AnalyzerConfig {
            base_url: url,
            ..AnalyzerConfig::default()
        };
        TaskAnalyzer::from_config(&config).unwrap()
    }

    fn field(label: &str, value: &str) -> DisplayField {
        DisplayField {
            label: label.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_single_task() {
        let input =
            "Tôi muốn giao cho ông A làm việc với Hóc Môn và báo cáo lại cho tôi vào ngày 05/07";
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/analyze")
            .match_body(Matcher::Json(json!({"Input": input, "Temperature": 0.9})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "data": {
                        "Nội dung": "giao việc",
                        "Người thực hiện": "ông A",
                        "Thời hạn": "05/07"
                    },
                    "rawContent": "..."
                })
                .to_string(),
            )
            .create_async()
            .await;

        let analysis = analyzer_for(server.url()).analyze_text(input).await.unwrap();
        m.assert_async().await;

        assert_eq!(
            analysis.view,
            DisplayView::Single(vec![
                field("Công việc", "giao việc"),
                field("Người xử lý", "ông A"),
                field("Hạn xử lý", "05/07"),
                field("Phối hợp", normalizer::FALLBACK_PLACEHOLDER),
                field("Ưu tiên", "bình thường"),
            ])
        );
        assert_eq!(analysis.raw_payload(), None);
    }

    #[tokio::test]
    async fn test_end_to_end_multi_task() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/analyze")
            .with_status(200)
            .with_body(r#"{"data":{"tasks":[{"Task":"a","Priority":"cao"},{"Task":"b"}]}}"#)
            .create_async()
            .await;

        let analysis = analyzer_for(server.url())
            .analyze_text("hai việc")
            .await
            .unwrap();

        let DisplayView::Multi(groups) = analysis.view else {
            panic!("expected multi view");
        };
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].fields[0], field("Công việc", "a"));
        assert_eq!(groups[0].fields[4], field("Ưu tiên", "cao"));
        assert_eq!(groups[1].fields[0], field("Công việc", "b"));
        assert_eq!(groups[1].fields[4], field("Ưu tiên", "bình thường"));
    }

    #[tokio::test]
    async fn test_null_data_falls_back_to_raw_payload() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/analyze")
            .with_status(200)
            .with_body(r#"{"success":false,"data":null,"rawContent":"không đọc được"}"#)
            .create_async()
            .await;

        let analysis = analyzer_for(server.url()).analyze_text("x").await.unwrap();

        assert_eq!(analysis.view, DisplayView::None);
        let raw = analysis.raw_payload().unwrap();
        assert!(raw.contains("không đọc được"));
    }
}
