use std::sync::Arc;

use nutri_core::{CookMethod, HabitEdit, RecognitionResult};
use nutri_store::DeviceStore;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::local_hour;

#[derive(Clone)]
pub struct NutriServer {
    state: Arc<Mutex<DeviceStore>>,
    tool_router: ToolRouter<Self>,
}

impl NutriServer {
    pub fn new(store: DeviceStore) -> Self {
        Self {
            state: Arc::new(Mutex::new(store)),
            tool_router: Self::tool_router(),
        }
    }
}

fn json_result(value: &serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )]))
}

fn store_error(e: nutri_store::StoreError) -> McpError {
    tracing::error!("store failure: {e}");
    McpError::internal_error(e.to_string(), None)
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct AnalyzeRequest {
    /// Recognition payload: food, ingredients [{name, grams}], calories,
    /// protein_g, fat_g, carbs_g
    recognition: serde_json::Value,
    /// Hour of day the meal is eaten (0-23). Defaults to the current local hour.
    hour: Option<u32>,
    /// Append the meal to the log (default true)
    save: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RecordEditRequest {
    /// Ingredient name as the recognizer reported it
    original_name: String,
    /// What the user renamed it to
    corrected_name: Option<String>,
    /// Portion the user corrected it to, in grams
    corrected_grams: Option<f64>,
    /// steam, stirFry, deepFry or braise
    cook_method: Option<String>,
}

#[tool_router]
impl NutriServer {
    #[tool(
        description = "Analyze a recognized meal. Applies the device's learned corrections, classifies each ingredient, judges the eating order, projects a 4-hour energy curve, computes performance, battery and match scores, and returns advisory keys with parameters. Saves the meal to the log unless save=false."
    )]
    async fn nutri_analyze(
        &self,
        Parameters(req): Parameters<AnalyzeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let recognition: RecognitionResult = serde_json::from_value(req.recognition)
            .map_err(|e| McpError::invalid_params(format!("invalid recognition: {e}"), None))?;
        let hour = req.hour.unwrap_or_else(local_hour);
        if hour > 23 {
            return Err(McpError::invalid_params(
                format!("hour must be 0-23, got {hour}"),
                None,
            ));
        }

        let store = self.state.lock().await;
        let outcome = store
            .log_meal(&recognition, hour, req.save.unwrap_or(true))
            .map_err(store_error)?;

        let value = serde_json::to_value(&outcome)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json_result(&value)
    }

    #[tool(
        description = "Record that the user corrected a recognized ingredient. After the same ingredient has been corrected three times the correction is applied automatically to future meals."
    )]
    async fn nutri_record_edit(
        &self,
        Parameters(req): Parameters<RecordEditRequest>,
    ) -> Result<CallToolResult, McpError> {
        if req.original_name.trim().is_empty() {
            return Err(McpError::invalid_params(
                "original_name must not be empty",
                None,
            ));
        }
        let mut edit = HabitEdit::new(&req.original_name);
        if let Some(name) = &req.corrected_name {
            edit = edit.rename(name);
        }
        if let Some(grams) = req.corrected_grams {
            edit = edit.grams(grams);
        }
        if let Some(method) = &req.cook_method {
            let method = CookMethod::parse(method).ok_or_else(|| {
                McpError::invalid_params(format!("unknown cook method '{method}'"), None)
            })?;
            edit = edit.cook(method);
        }

        let store = self.state.lock().await;
        let pattern = store.record_edit(&edit).map_err(store_error)?;
        let value = serde_json::to_value(&pattern)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json_result(&value)
    }

    #[tool(description = "List the correction habits learned for this device.")]
    async fn nutri_habits(&self) -> Result<CallToolResult, McpError> {
        let store = self.state.lock().await;
        let patterns = store.patterns().map_err(store_error)?;
        let auto = patterns.iter().filter(|p| p.auto_apply).count();
        json_result(&serde_json::json!({
            "device": store.device_id(),
            "auto_apply": auto,
            "patterns": patterns,
        }))
    }

    #[tool(description = "Cumulative health score and level from the device's meal log.")]
    async fn nutri_health(&self) -> Result<CallToolResult, McpError> {
        let store = self.state.lock().await;
        let health = store.health().map_err(store_error)?;
        let value = serde_json::to_value(health)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json_result(&value)
    }
}

#[tool_handler]
impl ServerHandler for NutriServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Meal scoring and eating-order advice for one device.\n\n\
                 1. After a photo is recognized, call nutri_analyze with the recognition payload. \
                    Present the advisory keys with their params; `trusted` means every item was \
                    corrected from learned habits and the review step can be skipped.\n\
                 2. When the user fixes an ingredient name, portion or cooking method, call \
                    nutri_record_edit with the original recognized name.\n\
                 3. nutri_habits lists learned corrections; nutri_health summarizes the meal log."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
