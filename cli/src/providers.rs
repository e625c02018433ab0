//! HTTP clients for the nutrition providers.
//!
//! Response parsing lives in `thali_core::providers`; these types only move
//! bytes. Each client blocks on the runtime handle it was built with, so
//! `fetch` must be called from a blocking thread, never from async code.

use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::time::Duration;

use thali_core::providers::{
    NutritionProvider, ProviderChain, ProviderResult, calorieninjas, gemini, openfoodfacts, usda,
};

use crate::config::Config;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

struct Http {
    client: reqwest::Client,
    rt: tokio::runtime::Handle,
    timeout: Duration,
}

impl Http {
    fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "thali/{} (food log)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .context("Failed to build HTTP client")?;
        let rt = tokio::runtime::Handle::try_current()
            .context("Nutrition providers need a tokio runtime")?;
        Ok(Self {
            client,
            rt,
            timeout,
        })
    }

    /// Drive `fut` to completion, failing once the provider timeout expires.
    fn block_on<T>(&self, provider: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.timeout;
        self.rt.block_on(async move {
            tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| anyhow!("{provider} timed out after {}s", timeout.as_secs()))?
        })
    }
}

pub struct GeminiClient {
    http: Http,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Http::new(timeout)?,
            api_key,
        })
    }

    pub async fn fetch_async(&self, food: &str) -> Result<Option<ProviderResult>> {
        let key = self.api_key.as_deref().context("Gemini API key is not set")?;
        let resp: gemini::GenerateResponse = self
            .http
            .client
            .post(gemini::GENERATE_URL)
            .query(&[("key", key)])
            .json(&gemini::request_for(food))
            .send()
            .await
            .context("Failed to reach Gemini API")?
            .error_for_status()
            .context("Gemini API returned an error")?
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        Ok(gemini::parse_reply(resp.text()))
    }
}

impl NutritionProvider for GeminiClient {
    fn name(&self) -> &str {
        gemini::SOURCE
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn fetch(&self, food: &str) -> Result<Option<ProviderResult>> {
        self.http.block_on(gemini::SOURCE, self.fetch_async(food))
    }
}

pub struct UsdaClient {
    http: Http,
    api_key: Option<String>,
}

impl UsdaClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Http::new(timeout)?,
            api_key,
        })
    }

    pub async fn fetch_async(&self, food: &str) -> Result<Option<ProviderResult>> {
        let key = self.api_key.as_deref().context("USDA API key is not set")?;
        let resp: usda::SearchResponse = self
            .http
            .client
            .get(usda::SEARCH_URL)
            .query(&usda::search_params(food, key))
            .send()
            .await
            .context("Failed to reach USDA FoodData Central")?
            .error_for_status()
            .context("USDA FoodData Central returned an error")?
            .json()
            .await
            .context("Failed to parse USDA search response")?;
        Ok(usda::normalize_search(&resp, food))
    }
}

impl NutritionProvider for UsdaClient {
    fn name(&self) -> &str {
        usda::SOURCE
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn fetch(&self, food: &str) -> Result<Option<ProviderResult>> {
        self.http.block_on(usda::SOURCE, self.fetch_async(food))
    }
}

pub struct CalorieNinjasClient {
    http: Http,
    api_key: Option<String>,
}

impl CalorieNinjasClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Http::new(timeout)?,
            api_key,
        })
    }

    pub async fn fetch_async(&self, food: &str) -> Result<Option<ProviderResult>> {
        let key = self
            .api_key
            .as_deref()
            .context("CalorieNinjas API key is not set")?;
        let resp: calorieninjas::NutritionResponse = self
            .http
            .client
            .get(calorieninjas::NUTRITION_URL)
            .header("X-Api-Key", key)
            .query(&[("query", calorieninjas::query_for(food))])
            .send()
            .await
            .context("Failed to reach CalorieNinjas API")?
            .error_for_status()
            .context("CalorieNinjas API returned an error")?
            .json()
            .await
            .context("Failed to parse CalorieNinjas response")?;
        Ok(calorieninjas::normalize_response(&resp))
    }
}

impl NutritionProvider for CalorieNinjasClient {
    fn name(&self) -> &str {
        calorieninjas::SOURCE
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn fetch(&self, food: &str) -> Result<Option<ProviderResult>> {
        self.http
            .block_on(calorieninjas::SOURCE, self.fetch_async(food))
    }
}

pub struct OpenFoodFactsClient {
    http: Http,
}

impl OpenFoodFactsClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Http::new(timeout)?,
        })
    }

    pub async fn fetch_async(&self, food: &str) -> Result<Option<ProviderResult>> {
        let resp: openfoodfacts::SearchResponse = self
            .http
            .client
            .get(openfoodfacts::SEARCH_URL)
            .query(&openfoodfacts::search_params(food))
            .send()
            .await
            .context("Failed to reach OpenFoodFacts API")?
            .error_for_status()
            .context("OpenFoodFacts API returned an error")?
            .json()
            .await
            .context("Failed to parse OpenFoodFacts search response")?;
        Ok(openfoodfacts::normalize_search(&resp))
    }
}

impl NutritionProvider for OpenFoodFactsClient {
    fn name(&self) -> &str {
        openfoodfacts::SOURCE
    }

    fn fetch(&self, food: &str) -> Result<Option<ProviderResult>> {
        self.http
            .block_on(openfoodfacts::SOURCE, self.fetch_async(food))
    }
}

/// Provider chain in the configured order. Must run inside a tokio runtime.
pub fn build_chain(config: &Config) -> Result<ProviderChain> {
    let timeout = config.provider_timeout;
    let mut providers: Vec<Box<dyn NutritionProvider>> = Vec::new();
    for name in &config.providers {
        let provider: Box<dyn NutritionProvider> = match name.as_str() {
            gemini::SOURCE => Box::new(GeminiClient::new(config.gemini_key.clone(), timeout)?),
            usda::SOURCE => Box::new(UsdaClient::new(config.usda_key.clone(), timeout)?),
            calorieninjas::SOURCE => Box::new(CalorieNinjasClient::new(
                config.calorieninjas_key.clone(),
                timeout,
            )?),
            openfoodfacts::SOURCE => Box::new(OpenFoodFactsClient::new(timeout)?),
            other => return Err(anyhow!("Unknown nutrition provider '{other}'")),
        };
        providers.push(provider);
    }
    Ok(ProviderChain::new(providers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(providers: &[&str]) -> Config {
        Config {
            db_path: PathBuf::from(":memory:"),
            dataset_path: PathBuf::from("data/foods.json"),
            user_id: "local".into(),
            providers: providers.iter().map(ToString::to_string).collect(),
            provider_timeout: Duration::from_secs(2),
            gemini_key: None,
            usda_key: Some("usda-key".into()),
            calorieninjas_key: None,
        }
    }

    #[tokio::test]
    async fn test_build_chain_keeps_configured_order() {
        let chain = build_chain(&config(&["openfoodfacts", "usda", "gemini"])).unwrap();
        let names: Vec<&str> = chain.names().collect();
        assert_eq!(names, ["openfoodfacts", "usda", "gemini"]);
    }

    #[tokio::test]
    async fn test_build_chain_empty() {
        assert!(build_chain(&config(&[])).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        assert!(build_chain(&config(&["nutritionix"])).is_err());
    }

    #[tokio::test]
    async fn test_configured_follows_keys() {
        let timeout = Duration::from_secs(1);
        assert!(!GeminiClient::new(None, timeout).unwrap().is_configured());
        assert!(GeminiClient::new(Some("k".into()), timeout).unwrap().is_configured());
        assert!(UsdaClient::new(Some("k".into()), timeout).unwrap().is_configured());
        assert!(!CalorieNinjasClient::new(None, timeout).unwrap().is_configured());
        assert!(OpenFoodFactsClient::new(timeout).unwrap().is_configured());
    }

    #[test]
    fn test_client_needs_runtime() {
        assert!(OpenFoodFactsClient::new(Duration::from_secs(1)).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_from_blocking_thread_times_out() {
        let http = Http::new(Duration::from_millis(50)).unwrap();
        let err = tokio::task::spawn_blocking(move || {
            http.block_on("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await
        .unwrap()
        .unwrap_err();
        assert!(err.to_string().contains("slow timed out"));
    }

    // --- Integration tests (hit real provider APIs) ---

    #[tokio::test]
    #[ignore = "hits OpenFoodFacts API"]
    async fn test_openfoodfacts_banana() {
        let client = OpenFoodFactsClient::new(Duration::from_secs(15)).unwrap();
        let result = client.fetch_async("banana").await.unwrap();
        let result = result.expect("banana should exist in OpenFoodFacts");
        assert_eq!(result.source, "openfoodfacts");
        assert!(result.macros.calories > 0.0);
    }

    #[tokio::test]
    #[ignore = "hits USDA FoodData Central API"]
    async fn test_usda_rice() {
        let key = std::env::var("USDA_FDC_API_KEY").expect("USDA_FDC_API_KEY not set");
        let client = UsdaClient::new(Some(key), Duration::from_secs(15)).unwrap();
        let result = client.fetch_async("white rice").await.unwrap().unwrap();
        assert_eq!(result.source, "usda");
        assert!(result.macros.carbs > 10.0);
    }

    #[tokio::test]
    #[ignore = "hits CalorieNinjas API"]
    async fn test_calorieninjas_apple() {
        let key = std::env::var("CALORIE_NINJAS_KEY").expect("CALORIE_NINJAS_KEY not set");
        let client = CalorieNinjasClient::new(Some(key), Duration::from_secs(15)).unwrap();
        let result = client.fetch_async("apple").await.unwrap().unwrap();
        assert_eq!(result.source, "calorieninjas");
    }

    #[tokio::test]
    #[ignore = "hits Gemini API"]
    async fn test_gemini_poha() {
        let key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY not set");
        let client = GeminiClient::new(Some(key), Duration::from_secs(15)).unwrap();
        let result = client.fetch_async("poha").await.unwrap().unwrap();
        assert_eq!(result.source, "gemini");
        assert!(result.macros.calories > 0.0);
    }
}
