use crate::api::{Model, ModelsResponse};
use crate::core::error::StoreError;
use crate::utils::url::{endpoint_url, MODELS_ENDPOINT};

/// GET the public model catalog.
///
/// The catalog endpoint does not require a key, so no Authorization header
/// is sent; `app_title` is forwarded as `X-Title` for attribution.
pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    app_title: &str,
) -> Result<ModelsResponse, StoreError> {
    let models_url = endpoint_url(base_url, MODELS_ENDPOINT);
    let response = client
        .get(models_url)
        .header("X-Title", app_title)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(StoreError::Http { status, body });
    }

    let body = response.text().await?;
    serde_json::from_str::<ModelsResponse>(&body)
        .map_err(|err| StoreError::invalid_response(format!("model catalog: {err}")))
}

pub fn find_by_id<'a>(models: &'a [Model], id: &str) -> Option<&'a Model> {
    models.iter().find(|model| model.id == id)
}

/// Case-insensitive match on the display name (name, or id when unnamed).
pub fn find_by_name<'a>(models: &'a [Model], name: &str) -> Option<&'a Model> {
    let wanted = name.to_lowercase();
    models
        .iter()
        .find(|model| model.display_name().to_lowercase() == wanted)
}

pub fn display_names(models: &[Model]) -> Vec<String> {
    models
        .iter()
        .map(|model| model.display_name().to_string())
        .collect()
}

/// Models whose id or display name contains `needle`, ignoring case.
/// An empty needle keeps everything.
pub fn filter_models<'a>(models: &'a [Model], needle: &str) -> Vec<&'a Model> {
    let needle = needle.trim().to_lowercase();
    models
        .iter()
        .filter(|model| {
            needle.is_empty()
                || model.id.to_lowercase().contains(&needle)
                || model.display_name().to_lowercase().contains(&needle)
        })
        .collect()
}
